//! Component model
//!
//! Scene objects carry a [`ComponentRegistry`] holding at most one
//! [`Component`] per concrete type.

pub mod component;

pub use component::{AsAny, Component, ComponentError, ComponentOwner, ComponentRegistry};
