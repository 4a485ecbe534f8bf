use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use super::parser::parse_situation_response;
use super::templates::select_fallback;
use super::types::{validate_assessment_id, GenerationOutcome, NarrativeGenerator};
use super::GenerationError;
use crate::models::{
    AssessmentPayload, FailureReason, GenerationAttempt, GenerationContext, GenerationMetadata,
    GenerationSource, SituationAssessment,
};
use crate::pipeline::retry::{execute_with_retry_observed, RetryConfig};
use crate::pipeline::safety::{sanitize_structured, validate_assessment};

/// Logical attempts per run; transport retries inside each are extra.
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: u32 = 2;

/// Upper bound on a single backend call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub max_generation_attempts: u32,
    pub call_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryConfig::EXTERNAL_API,
        }
    }
}

/// Run-level state machine.
#[derive(Debug)]
enum RunState {
    Attempting(u32),
    Retrying(u32),
    Succeeded {
        assessment: SituationAssessment,
        attempt_number: u32,
    },
    Exhausted,
}

/// How one logical attempt ended.
enum AttemptOutcome {
    Accepted {
        assessment: SituationAssessment,
        attempt_number: u32,
    },
    /// Output arrived but failed parsing or policy; a fresh attempt may help.
    Rejected,
    /// The executor gave up on the backend call.
    TransportFailed,
}

/// Produces a situation assessment for an assessment context, always
/// ending with displayable content: model output when it passes policy,
/// a pre-vetted template otherwise.
pub struct SituationOrchestrator {
    generator: Arc<dyn NarrativeGenerator>,
    config: OrchestratorConfig,
}

impl SituationOrchestrator {
    pub fn new(generator: Arc<dyn NarrativeGenerator>, config: OrchestratorConfig) -> Self {
        Self { generator, config }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one generation. The only error is an invalid identifier, checked
    /// before any backend call. Dropping the future stops further attempts.
    pub async fn run(
        &self,
        context: &GenerationContext,
    ) -> Result<GenerationOutcome, GenerationError> {
        validate_assessment_id(&context.assessment_id)?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "situation_run",
            run_id = %run_id,
            assessment_id = %context.assessment_id,
            model = %self.generator.model(),
        );
        Ok(self.run_validated(context).instrument(span).await)
    }

    async fn run_validated(&self, context: &GenerationContext) -> GenerationOutcome {
        let started = Instant::now();
        let max_attempts = self.config.max_generation_attempts.max(1);
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut state = RunState::Attempting(1);

        let accepted = loop {
            match state {
                RunState::Attempting(logical) => {
                    tracing::debug!(logical_attempt = logical, "Attempting generation");
                    state = match self.attempt(context, &mut attempts).await {
                        AttemptOutcome::Accepted {
                            assessment,
                            attempt_number,
                        } => RunState::Succeeded {
                            assessment,
                            attempt_number,
                        },
                        AttemptOutcome::Rejected if logical < max_attempts => {
                            RunState::Retrying(logical)
                        }
                        AttemptOutcome::Rejected | AttemptOutcome::TransportFailed => {
                            RunState::Exhausted
                        }
                    };
                }
                RunState::Retrying(logical) => {
                    tracing::info!(
                        logical_attempt = logical + 1,
                        max_attempts,
                        "Output rejected, retrying with a fresh attempt"
                    );
                    state = RunState::Attempting(logical + 1);
                }
                RunState::Succeeded {
                    assessment,
                    attempt_number,
                } => break Some((assessment, attempt_number)),
                RunState::Exhausted => break None,
            }
        };

        let total_duration = started.elapsed().as_millis() as u64;

        match accepted {
            Some((assessment, attempt_number)) => {
                let source = if attempt_number == 1 {
                    GenerationSource::Ai
                } else {
                    GenerationSource::RetryFallback
                };
                tracing::info!(
                    source = %source,
                    attempts = attempts.len(),
                    total_ms = total_duration,
                    "Generation succeeded"
                );
                GenerationOutcome {
                    payload: AssessmentPayload::Structured(sanitize_structured(&assessment)),
                    metadata: GenerationMetadata {
                        source,
                        final_source: source,
                        attempts,
                        total_duration,
                        model_version: Some(self.generator.model().to_string()),
                        template_used: None,
                        generated_at: Utc::now(),
                    },
                }
            }
            None => {
                let selection = select_fallback(context);
                tracing::warn!(
                    template = selection.template_id,
                    attempts = attempts.len(),
                    total_ms = total_duration,
                    "Generation exhausted, serving fallback template"
                );
                GenerationOutcome {
                    payload: AssessmentPayload::Structured(selection.assessment),
                    metadata: GenerationMetadata {
                        source: GenerationSource::Fallback,
                        final_source: GenerationSource::Fallback,
                        attempts,
                        total_duration,
                        model_version: None,
                        template_used: Some(selection.template_id.to_string()),
                        generated_at: Utc::now(),
                    },
                }
            }
        }
    }

    /// One logical attempt: a backend call under the retry executor, then
    /// parse and policy checks on whatever came back. Every backend call
    /// appends exactly one entry to `attempts`.
    async fn attempt(
        &self,
        context: &GenerationContext,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> AttemptOutcome {
        let generator = self.generator.as_ref();
        let model = generator.model().to_string();
        let call_timeout = self.config.call_timeout;
        let timeout_ms = call_timeout.as_millis() as u64;
        let mut call_window: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        let result = execute_with_retry_observed(
            "situation_generation",
            &self.config.retry,
            move |_| async move {
                match tokio::time::timeout(call_timeout, generator.generate(context)).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Timeout(timeout_ms)),
                }
            },
            |report| match report.outcome {
                Ok(_) => call_window = Some((report.started_at, report.finished_at)),
                Err(err) => {
                    let number = attempts.len() as u32 + 1;
                    attempts.push(GenerationAttempt::transport_failure(
                        number,
                        &model,
                        report.started_at,
                        report.finished_at,
                        failure_reason(err),
                        &err.to_string(),
                    ));
                }
            },
        )
        .await;

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "Generation call failed");
                return AttemptOutcome::TransportFailed;
            }
        };

        let (start, end) = call_window.unwrap_or_else(|| {
            let now = Utc::now();
            (now, now)
        });
        let attempt_number = attempts.len() as u32 + 1;

        let candidate = match parse_situation_response(&raw) {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::warn!(attempt = attempt_number, error = %err, "Model output did not parse");
                attempts.push(GenerationAttempt::parse_failure(
                    attempt_number,
                    &model,
                    start,
                    end,
                    &err.to_string(),
                    &raw,
                ));
                return AttemptOutcome::Rejected;
            }
        };

        let report = validate_assessment(&candidate);
        if !report.is_acceptable() {
            let summary = report.summary();
            tracing::warn!(
                attempt = attempt_number,
                content_violation = report.has_content_violations(),
                issues = %summary,
                "Model output rejected by policy"
            );
            attempts.push(GenerationAttempt::policy_failure(
                attempt_number,
                &model,
                start,
                end,
                report.has_content_violations(),
                &summary,
                &raw,
            ));
            return AttemptOutcome::Rejected;
        }
        if !report.structural.is_empty() {
            tracing::debug!(
                attempt = attempt_number,
                issues = ?report.structural,
                "Repairing structural issues in accepted output"
            );
        }

        attempts.push(GenerationAttempt::succeeded(
            attempt_number,
            &model,
            start,
            end,
            &raw,
        ));
        AttemptOutcome::Accepted {
            assessment: candidate,
            attempt_number,
        }
    }
}

fn failure_reason(err: &GenerationError) -> FailureReason {
    match err {
        GenerationError::Timeout(_) => FailureReason::Timeout,
        _ => FailureReason::ApiError,
    }
}
