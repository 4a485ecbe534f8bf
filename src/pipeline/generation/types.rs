use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::GenerationError;
use crate::models::{AssessmentPayload, GenerationContext, GenerationMetadata};

/// Backend that turns an assessment context into raw narrative text.
///
/// Implementations make exactly one backend call per `generate` and do not
/// retry on their own; retries belong to the orchestrator.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Model identifier recorded on every attempt.
    fn model(&self) -> &str;

    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError>;
}

/// Result of one orchestrated run. Always carries displayable content.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub payload: AssessmentPayload,
    pub metadata: GenerationMetadata,
}

const MAX_ASSESSMENT_ID_LEN: usize = 64;

static ASSESSMENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex")
});

/// Assessment ids are path segments and storage keys: ASCII alphanumeric
/// first, then alphanumerics, `_` or `-`, at most 64 characters.
pub fn validate_assessment_id(id: &str) -> Result<(), GenerationError> {
    if id.len() > MAX_ASSESSMENT_ID_LEN || !ASSESSMENT_ID_RE.is_match(id) {
        return Err(GenerationError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}
