pub mod api;
pub mod clinician;
pub mod config;
pub mod core_state;
pub mod db;
pub mod intake_session;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Startup failed: {0}")]
    Core(#[from] core_state::CoreError),

    #[error("Runtime error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the service and block until it shuts down.
///
/// The tokio runtime is built here rather than via `#[tokio::main]`: the
/// blocking HTTP clients inside `CoreState` must be created and dropped
/// outside any async context.
pub fn run() -> Result<(), RunError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        generation_model = %config.generation_model,
        embedding_backend = ?config.embedding_backend,
        embedding_dim = config.embedding_dim,
        "Configuration loaded"
    );

    let core = Arc::new(core_state::CoreState::from_config(&config)?);

    let runtime = tokio::runtime::Runtime::new()?;
    let served = runtime.block_on(api::serve(Arc::clone(&core), config.bind_addr));
    drop(runtime);

    drop(core);
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(served?)
}
