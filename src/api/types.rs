//! Shared types for the HTTP API layer.

use std::sync::Arc;

use serde::Serialize;

use crate::db::AssessmentStore;
use crate::models::{AssessmentPayload, GenerationMetadata};
use crate::pipeline::generation::{GenerationOutcome, SituationOrchestrator};
use crate::pipeline::retry::RetryConfig;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub orchestrator: Arc<SituationOrchestrator>,
    pub store: Arc<dyn AssessmentStore>,
    /// Retry policy for store calls made by handlers.
    pub storage_retry: RetryConfig,
}

impl ApiContext {
    pub fn new(orchestrator: Arc<SituationOrchestrator>, store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            orchestrator,
            store,
            storage_retry: RetryConfig::STORAGE,
        }
    }
}

/// Client payload: the narrative fields at top level plus `debug`.
#[derive(Debug, Clone, Serialize)]
pub struct SituationResponse {
    #[serde(flatten)]
    pub payload: AssessmentPayload,
    pub debug: GenerationMetadata,
}

impl SituationResponse {
    /// For payloads with no run record attached.
    pub fn without_metadata(payload: AssessmentPayload) -> Self {
        Self {
            payload,
            debug: GenerationMetadata::unknown_stub(),
        }
    }
}

impl From<GenerationOutcome> for SituationResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            payload: outcome.payload,
            debug: outcome.metadata,
        }
    }
}
