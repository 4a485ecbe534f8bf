use serde::{Deserialize, Serialize};

/// Disclaimer attached whenever a payload arrives without a usable one.
pub const DEFAULT_DISCLAIMER: &str =
    "This reflection is based on your own self-assessment answers. \
     It is a prompt for thinking, not a professional evaluation of your leadership.";

/// The two forward-looking scenario lines shown under the insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenarios {
    pub if_unchanged: String,
    pub if_addressed: String,
}

/// Situation Assessment, the 2.0 narrative shape.
///
/// Every field except the disclaimer is optional so partially populated
/// payloads survive sanitization with their absent fields still absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SituationAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchouts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Scenarios>,
    #[serde(default)]
    pub disclaimer: String,
}

/// Pre-2.0 narrative shape, still stored for older assessments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAssessment {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub fragilities: Vec<String>,
    #[serde(default)]
    pub what_works: Vec<String>,
    #[serde(default)]
    pub disclaimer: String,
}

/// A narrative payload, tagged explicitly by schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "lowercase")]
pub enum AssessmentPayload {
    Structured(SituationAssessment),
    Legacy(LegacyAssessment),
}

impl AssessmentPayload {
    pub fn schema(&self) -> &'static str {
        match self {
            AssessmentPayload::Structured(_) => "structured",
            AssessmentPayload::Legacy(_) => "legacy",
        }
    }

    pub fn disclaimer(&self) -> &str {
        match self {
            AssessmentPayload::Structured(a) => &a.disclaimer,
            AssessmentPayload::Legacy(a) => &a.disclaimer,
        }
    }
}
