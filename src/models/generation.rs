use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{FailureReason, GenerationSource};

/// Characters of raw backend output kept on an attempt for postmortem.
pub const RAW_RESPONSE_PREVIEW_CHARS: usize = 500;

/// One call made to the generation backend.
///
/// Attempts are built complete (with `end_time` set) and only ever appended
/// to a run's list, never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationAttempt {
    pub attempt_number: u32,
    pub model: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds between start and end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(default)]
    pub policy_violation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl GenerationAttempt {
    fn finished(
        attempt_number: u32,
        model: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let duration = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            attempt_number,
            model: model.to_string(),
            start_time,
            end_time: Some(end_time),
            duration: Some(duration),
            success: false,
            failure_reason: None,
            policy_violation: false,
            parse_error: None,
            error_message: None,
            raw_response: None,
        }
    }

    /// An attempt whose output parsed and passed the policy validator.
    pub fn succeeded(
        attempt_number: u32,
        model: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        raw: &str,
    ) -> Self {
        Self {
            success: true,
            raw_response: Some(raw_preview(raw)),
            ..Self::finished(attempt_number, model, start_time, end_time)
        }
    }

    /// The backend call itself failed (transport, status code, timeout).
    pub fn transport_failure(
        attempt_number: u32,
        model: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: FailureReason,
        error: &str,
    ) -> Self {
        Self {
            failure_reason: Some(reason),
            error_message: Some(error.to_string()),
            ..Self::finished(attempt_number, model, start_time, end_time)
        }
    }

    /// The backend answered but the output could not be parsed.
    pub fn parse_failure(
        attempt_number: u32,
        model: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        parse_error: &str,
        raw: &str,
    ) -> Self {
        Self {
            failure_reason: Some(FailureReason::ParseError),
            parse_error: Some(parse_error.to_string()),
            raw_response: Some(raw_preview(raw)),
            ..Self::finished(attempt_number, model, start_time, end_time)
        }
    }

    /// The output parsed but was rejected by the policy validator.
    ///
    /// `content_violation` separates banned-content matches from structural
    /// rejections such as an out-of-window word count.
    pub fn policy_failure(
        attempt_number: u32,
        model: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        content_violation: bool,
        detail: &str,
        raw: &str,
    ) -> Self {
        Self {
            failure_reason: Some(FailureReason::PolicyViolation),
            policy_violation: content_violation,
            error_message: Some(detail.to_string()),
            raw_response: Some(raw_preview(raw)),
            ..Self::finished(attempt_number, model, start_time, end_time)
        }
    }
}

/// Truncate raw backend output to the diagnostic preview length.
pub fn raw_preview(raw: &str) -> String {
    raw.chars().take(RAW_RESPONSE_PREVIEW_CHARS).collect()
}

/// Summary of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub source: GenerationSource,
    pub final_source: GenerationSource,
    pub attempts: Vec<GenerationAttempt>,
    /// Wall-clock milliseconds for the whole run.
    pub total_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_used: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl GenerationMetadata {
    /// Placeholder for payloads that carry no run record (stored or legacy
    /// narratives), so the `debug` shape is always present for clients.
    pub fn unknown_stub() -> Self {
        Self {
            source: GenerationSource::Unknown,
            final_source: GenerationSource::Unknown,
            attempts: Vec::new(),
            total_duration: 0,
            model_version: None,
            template_used: None,
            generated_at: Utc::now(),
        }
    }

    pub fn successful_attempt(&self) -> Option<&GenerationAttempt> {
        self.attempts.iter().rev().find(|a| a.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn duration_is_derived_from_timestamps() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(1_250);
        let attempt = GenerationAttempt::succeeded(1, "model-a", start, end, "{}");
        assert_eq!(attempt.duration, Some(1_250));
        assert_eq!(attempt.end_time, Some(end));
        assert!(attempt.failure_reason.is_none());
    }

    #[test]
    fn raw_response_is_truncated_to_preview() {
        let raw = "x".repeat(2_000);
        let start = Utc::now();
        let attempt = GenerationAttempt::parse_failure(2, "m", start, start, "bad json", &raw);
        assert_eq!(attempt.raw_response.unwrap().chars().count(), RAW_RESPONSE_PREVIEW_CHARS);
        assert_eq!(attempt.failure_reason, Some(FailureReason::ParseError));
        assert!(!attempt.success);
    }

    #[test]
    fn policy_failure_records_flag() {
        let start = Utc::now();
        let content = GenerationAttempt::policy_failure(1, "m", start, start, true, "banned", "raw");
        assert!(content.policy_violation);
        let structural =
            GenerationAttempt::policy_failure(1, "m", start, start, false, "words", "raw");
        assert!(!structural.policy_violation);
        assert_eq!(structural.failure_reason, Some(FailureReason::PolicyViolation));
    }

    #[test]
    fn attempt_serializes_camel_case() {
        let start = Utc::now();
        let attempt = GenerationAttempt::transport_failure(
            3,
            "m",
            start,
            start,
            FailureReason::Timeout,
            "timed out",
        );
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["attemptNumber"], 3);
        assert_eq!(json["failureReason"], "timeout");
        assert_eq!(json["policyViolation"], false);
        assert!(json.get("rawResponse").is_none());
    }

    #[test]
    fn unknown_stub_has_empty_attempts() {
        let stub = GenerationMetadata::unknown_stub();
        assert_eq!(stub.source, GenerationSource::Unknown);
        assert_eq!(stub.final_source, GenerationSource::Unknown);
        assert!(stub.attempts.is_empty());
        assert_eq!(stub.total_duration, 0);
        let json = serde_json::to_value(&stub).unwrap();
        assert_eq!(json["finalSource"], "unknown");
        assert!(json["generatedAt"].is_string());
    }
}
