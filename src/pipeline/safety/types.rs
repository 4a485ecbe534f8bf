use serde::Serialize;

/// Family a banned phrase belongs to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyFamily {
    /// Names of model vendors or model categories.
    VendorNaming,
    /// Comparisons against external populations.
    BenchmarkReference,
    /// Odds, likelihoods and percentage chances.
    ProbabilityFraming,
    /// The prompt's own instructions echoed back ("under 200 words").
    MetaInstruction,
    /// Internal process vocabulary leaking into user-facing copy.
    ComplianceJargon,
    /// The retired strengths/weaknesses framing.
    LegacyFraming,
}

/// A single banned-phrase match.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PolicyViolation {
    pub rule_id: &'static str,
    pub family: PolicyFamily,
    pub matched_text: String,
    /// Byte offset of the match in the scanned text.
    pub offset: usize,
    /// Length of the match in bytes.
    pub length: usize,
}

/// A violation located in a named assessment field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub violation: PolicyViolation,
}

/// Shape problems found in an assessment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralIssue {
    InsightMissing,
    WordCount { count: usize },
    ParagraphCount { count: usize },
    HeadlineTooLong { chars: usize },
    TooManyItems { field: &'static str, count: usize },
    ItemTooLong { field: &'static str, chars: usize },
}

impl StructuralIssue {
    /// Issues the sanitizer cannot repair; they reject the attempt.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::InsightMissing | Self::WordCount { .. })
    }
}

/// Outcome of validating one assessment.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PolicyReport {
    pub violations: Vec<FieldViolation>,
    pub structural: Vec<StructuralIssue>,
}

impl PolicyReport {
    pub fn has_content_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn is_acceptable(&self) -> bool {
        !self.has_content_violations() && !self.structural.iter().any(StructuralIssue::is_blocking)
    }

    /// Short description for attempt diagnostics. Never includes the
    /// offending text itself.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}:{}", v.field, v.violation.rule_id))
            .collect();
        parts.extend(
            self.structural
                .iter()
                .filter(|issue| issue.is_blocking())
                .map(|issue| match issue {
                    StructuralIssue::WordCount { count } => format!("insight word count {count}"),
                    other => format!("{other:?}"),
                }),
        );
        parts.join(", ")
    }
}
