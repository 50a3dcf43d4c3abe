//! # Scripting
//!
//! Embedded-language adapters driving the live scene.
//!
//! ## Architecture
//!
//! - [`bindings`] defines the script API once: a table of native functions
//!   plus member access for scene, camera, entity, transform, vector, color
//!   and light references. Adapters project it into their language.
//! - [`ScriptAdapter`] is what each language implements.
//! - [`ScriptDispatcher`] owns the loaded adapters and routes script files
//!   to them by extension. Scripts reach it again through `require`, so a
//!   Lua script may load a Rhai script and the other way round.
//!
//! Entity references held by scripts keep their object alive. Transform,
//! vector and color references do not: they name a field of a parent and
//! fail with [`BindingError::StaleReference`] once the parent is gone.

pub mod bindings;
pub mod callbacks;
pub mod context;
#[cfg(feature = "lua")]
pub mod lua_adapter;
#[cfg(feature = "rhai")]
pub mod rhai_adapter;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

pub use bindings::{BindingError, NativeFunction, NativeRef, ScriptValue};
pub use callbacks::CallbackList;
pub use context::{EngineSignals, RenderRequest, ScriptContext};
#[cfg(feature = "lua")]
pub use lua_adapter::LuaAdapter;
#[cfg(feature = "rhai")]
pub use rhai_adapter::RhaiAdapter;

/// Scripting errors
#[derive(Error, Debug)]
pub enum ScriptError {
    /// No loaded adapter claims the file's extension
    #[error("No script adapter for '{0}'")]
    NoAdapter(String),

    /// The adapter was used before `initialize` or after `shutdown`
    #[error("Script adapter '{0}' is not initialized")]
    NotInitialized(String),

    /// A script file could not be read
    #[error("Failed to read script {path}: {source}")]
    Io {
        /// File that failed to open
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The source did not parse
    #[error("Syntax error in {origin}: {message}")]
    Syntax {
        /// Script path or chunk name
        origin: String,
        /// Parser message
        message: String,
    },

    /// Execution raised an error
    #[error("Runtime error in {origin}: {message}")]
    Runtime {
        /// Script path or chunk name
        origin: String,
        /// Error raised by the script or the runtime
        message: String,
    },

    /// API registration failed
    #[error("Failed to register script API: {0}")]
    Setup(String),

    /// A native binding rejected its arguments
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Result type for scripting operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// An embedded-language runtime
///
/// Methods take `&self`: scripts re-enter their adapter through `require`
/// while it is executing, so adapters keep their state behind interior
/// mutability and never hold a borrow across script execution.
pub trait ScriptAdapter {
    /// Short name, e.g. `lua`
    fn name(&self) -> &str;

    /// File extension claimed by this adapter, including the leading dot
    fn extension(&self) -> &str;

    /// Create the language runtime
    fn initialize(&self) -> ScriptResult<()>;

    /// Expose the script API over `context`
    fn register_api(&self, context: &ScriptContext) -> ScriptResult<()>;

    /// Run a script file
    fn execute_file(&self, path: &Path) -> ScriptResult<()>;

    /// Run a snippet of source
    fn execute_string(&self, code: &str) -> ScriptResult<()>;

    /// Run update callbacks, then late-update callbacks
    fn update(&self, delta_time: f32);

    /// Drop callbacks and the runtime
    fn shutdown(&self);

    /// Number of registered update and late-update callbacks
    fn callback_count(&self) -> usize {
        0
    }
}

/// Loaded adapters, routed by file extension
#[derive(Default)]
pub struct ScriptDispatcher {
    adapters: RefCell<Vec<Rc<dyn ScriptAdapter>>>,
}

impl ScriptDispatcher {
    /// Create a dispatcher with no adapters
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an adapter; it must already be initialized
    pub fn add(&self, adapter: Rc<dyn ScriptAdapter>) {
        log::info!(
            "Script adapter '{}' handles {}",
            adapter.name(),
            adapter.extension()
        );
        self.adapters.borrow_mut().push(adapter);
    }

    /// Number of loaded adapters
    pub fn len(&self) -> usize {
        self.adapters.borrow().len()
    }

    /// Whether no adapter is loaded
    pub fn is_empty(&self) -> bool {
        self.adapters.borrow().is_empty()
    }

    /// First adapter claiming `extension`; the leading dot is optional
    pub fn adapter_for(&self, extension: &str) -> Option<Rc<dyn ScriptAdapter>> {
        let wanted = extension.trim_start_matches('.');
        self.adapters
            .borrow()
            .iter()
            .find(|adapter| {
                adapter
                    .extension()
                    .trim_start_matches('.')
                    .eq_ignore_ascii_case(wanted)
            })
            .cloned()
    }

    /// Adapter for a file path, by its extension
    pub fn adapter_for_path(&self, path: &Path) -> Option<Rc<dyn ScriptAdapter>> {
        let extension = path.extension()?.to_str()?;
        self.adapter_for(extension)
    }

    /// Run a file with the adapter claiming its extension
    pub fn execute_file(&self, path: &Path) -> ScriptResult<()> {
        let adapter = self.adapter_for_path(path).ok_or_else(|| {
            ScriptError::NoAdapter(
                path.extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_else(|| path.display().to_string()),
            )
        })?;
        log::debug!("Executing {} with '{}'", path.display(), adapter.name());
        adapter.execute_file(path)
    }

    /// Run source with the adapter for `extension`, or the first adapter
    /// when no extension is given
    pub fn execute_string(&self, code: &str, extension: Option<&str>) -> ScriptResult<()> {
        let adapter = match extension.filter(|ext| !ext.is_empty()) {
            Some(ext) => self.adapter_for(ext),
            None => self.adapters.borrow().first().cloned(),
        }
        .ok_or_else(|| ScriptError::NoAdapter(extension.unwrap_or_default().to_string()))?;
        adapter.execute_string(code)
    }

    /// Run every adapter's callbacks, in load order
    pub fn update(&self, delta_time: f32) {
        for adapter in self.snapshot() {
            adapter.update(delta_time);
        }
    }

    /// Shut every adapter down and forget them
    pub fn shutdown(&self) {
        let adapters = std::mem::take(&mut *self.adapters.borrow_mut());
        for adapter in adapters {
            adapter.shutdown();
            log::info!("Script adapter '{}' shut down", adapter.name());
        }
    }

    fn snapshot(&self) -> Vec<Rc<dyn ScriptAdapter>> {
        self.adapters.borrow().clone()
    }
}

impl std::fmt::Debug for ScriptDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .adapters
            .borrow()
            .iter()
            .map(|adapter| format!("{} ({})", adapter.name(), adapter.extension()))
            .collect();
        f.debug_struct("ScriptDispatcher")
            .field("adapters", &names)
            .finish()
    }
}
