//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types, colors and transforms
//! - Frame clock
//! - Logging utilities

pub mod math;
pub mod time;
pub mod logging;
