//! Combine runner
//!
//! Loads an engine configuration, registers the script adapters, runs the
//! init script and drives the frame loop on the headless backend until a
//! script calls `quit()` or the configured frame limit is reached.
//!
//! Usage: `combine [config.toml|config.ron]`

use combine_engine::config::{Config, ConfigError};
use combine_engine::core::EngineConfig;
use combine_engine::foundation::logging;
use combine_engine::{Engine, EngineError};
use thiserror::Error;

const DEFAULT_CONFIG: &str = "combine.toml";

#[derive(Error, Debug)]
enum AppError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(path),
        None => EngineConfig::load_or_default(DEFAULT_CONFIG),
    }
}

fn run(config: EngineConfig) -> Result<(), AppError> {
    let mut engine = Engine::headless(config);
    engine.install_default_adapters()?;
    engine.initialize()?;

    if !engine.run_init_script() {
        log::warn!("Init script did not run; starting with an empty scene");
    }

    let result = engine.run();
    log::info!(
        "Ran {} frames, {} objects in scene",
        engine.clock().frame_count(),
        engine.scene().len()
    );
    engine.shutdown();
    Ok(result?)
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("{}", AppError::from(e));
            std::process::exit(1);
        }
    };
    logging::init(&config.log_level);
    log::info!("Starting Combine");

    if let Err(e) = run(config) {
        log::error!("Application error: {}", e);
        std::process::exit(1);
    }
    log::info!("Combine finished successfully");
}
