use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompt::{build_situation_prompt, SITUATION_SYSTEM_PROMPT};
use super::types::NarrativeGenerator;
use super::GenerationError;
use crate::models::GenerationContext;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Narrative generator backed by a local Ollama instance.
///
/// The HTTP client carries no timeout of its own; the orchestrator bounds
/// every call.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn default_local() -> Self {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl NarrativeGenerator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_situation_prompt(context);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: SITUATION_SYSTEM_PROMPT,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GenerationError::Connection(self.base_url.clone())
                } else {
                    // Non-connect transport failures still read as network errors
                    GenerationError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PillarScores, ProfileSignals};

    #[test]
    fn trims_trailing_slash() {
        let generator = OllamaGenerator::new("http://localhost:11434/", "m");
        assert_eq!(generator.base_url(), "http://localhost:11434");
    }

    #[test]
    fn default_local_uses_standard_port() {
        let generator = OllamaGenerator::default_local();
        assert_eq!(generator.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(generator.model(), DEFAULT_MODEL);
    }

    #[test]
    fn request_body_disables_streaming() {
        let body = GenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: "json",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
    }

    #[tokio::test]
    async fn unreachable_backend_is_connection_error() {
        // Port 9 (discard) is closed on test hosts
        let generator = OllamaGenerator::new("http://127.0.0.1:9", "m");
        let ctx = GenerationContext {
            assessment_id: "a-1".into(),
            scores: PillarScores {
                vision: 50,
                execution: 50,
                people: 50,
                resilience: 50,
            },
            profile: ProfileSignals::default(),
        };
        let err = generator.generate(&ctx).await.unwrap_err();
        // An HTTP proxy in the environment turns this into a gateway error
        assert!(
            matches!(
                err,
                GenerationError::Connection(_)
                    | GenerationError::HttpClient(_)
                    | GenerationError::Backend { .. }
            ),
            "{err:?}"
        );
    }
}
