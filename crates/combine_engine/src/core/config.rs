//! # Engine Configuration
//!
//! Serializable settings for every engine subsystem. Applications load an
//! [`EngineConfig`] from TOML or RON through the [`Config`] trait and hand it
//! to [`crate::Engine::new`].
//!
//! ## Configuration Categories
//!
//! - **Window**: title, size and the initial presentation flags
//! - **Time**: time scale and an optional fixed timestep
//! - **Scripting**: init script and which adapters to register
//! - **Renderer**: frame limit for headless runs and default shader files

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// # Window Configuration
///
/// Passed to the render backend's `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Enable vertical sync
    pub vsync: bool,
    /// Start in wireframe mode
    pub wireframe: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Combine Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            wireframe: false,
        }
    }
}

/// # Time Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Initial time scale
    pub time_scale: f32,
    /// Advance the clock by this many seconds per frame instead of reading
    /// the wall clock
    pub fixed_timestep: Option<f32>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            fixed_timestep: None,
        }
    }
}

/// # Scripting Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    /// Script executed after engine initialization, if it exists
    pub init_script: Option<String>,
    /// Adapter names to register (`"lua"`, `"rhai"`)
    pub adapters: Vec<String>,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            init_script: Some("scripts/init.lua".to_string()),
            adapters: vec!["lua".to_string(), "rhai".to_string()],
        }
    }
}

impl ScriptingConfig {
    /// Whether the named adapter should be registered
    pub fn is_enabled(&self, adapter: &str) -> bool {
        self.adapters.iter().any(|name| name.eq_ignore_ascii_case(adapter))
    }
}

/// # Renderer Configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Report the output surface closed after this many frames
    pub max_frames: Option<u64>,
    /// Vertex shader replacing the built-in default program
    pub vertex_shader: Option<String>,
    /// Fragment shader replacing the built-in default program
    pub fragment_shader: Option<String>,
}

/// # Complete Engine Configuration
///
/// Top-level configuration consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Clock settings
    pub time: TimeConfig,
    /// Script settings
    pub scripting: ScriptingConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            time: TimeConfig::default(),
            scripting: ScriptingConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    /// Use a fixed timestep instead of the wall clock
    pub fn with_fixed_timestep(mut self, seconds: f32) -> Self {
        self.time.fixed_timestep = Some(seconds);
        self
    }

    /// Stop after a number of frames
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.renderer.max_frames = Some(frames);
        self
    }

    /// Set or clear the init script
    pub fn with_init_script(mut self, path: Option<String>) -> Self {
        self.scripting.init_script = path;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err("Window size must be non-zero".to_string());
        }
        if self.time.time_scale < 0.0 {
            return Err("Time scale cannot be negative".to_string());
        }
        if matches!(self.time.fixed_timestep, Some(step) if step <= 0.0) {
            return Err("Fixed timestep must be positive".to_string());
        }
        Ok(())
    }
}

impl Config for EngineConfig {}
