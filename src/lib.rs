pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::api::{ApiContext, ServerError};
use crate::config::AppConfig;
use crate::db::SqliteAssessmentStore;
use crate::pipeline::generation::{OllamaGenerator, OrchestratorConfig, SituationOrchestrator};

/// Start the service: tracing, config, store, generator, then serve until Ctrl-C.
pub async fn run() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    let store = SqliteAssessmentStore::open(&config.db_path)?;
    tracing::info!(db_path = %config.db_path.display(), "Assessment store ready");

    let generator = OllamaGenerator::new(&config.ollama_url, &config.model);
    let orchestrator = SituationOrchestrator::new(
        Arc::new(generator),
        OrchestratorConfig {
            max_generation_attempts: config.max_generation_attempts,
            call_timeout: config.call_timeout,
            ..OrchestratorConfig::default()
        },
    );
    tracing::info!(
        ollama_url = %config.ollama_url,
        model = %config.model,
        "Generation backend configured"
    );

    let ctx = ApiContext::new(Arc::new(orchestrator), Arc::new(store));
    api::serve_until_ctrl_c(ctx, config.bind_addr).await
}
