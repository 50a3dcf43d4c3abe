//! # Core Engine Module
//!
//! Shared configuration types used by the engine and its applications.

pub mod config;

pub use config::{
    Config, ConfigError, EngineConfig, RendererConfig, ScriptingConfig, TimeConfig, WindowConfig,
};
