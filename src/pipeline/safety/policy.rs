use std::sync::LazyLock;

use regex::Regex;

use super::types::{
    FieldViolation, PolicyFamily, PolicyReport, PolicyViolation, StructuralIssue,
};
use crate::models::SituationAssessment;

/// Inclusive word-count window for the insight narrative.
pub const MIN_INSIGHT_WORDS: usize = 150;
pub const MAX_INSIGHT_WORDS: usize = 220;

pub const HEADLINE_MAX_CHARS: usize = 120;
pub const ITEM_MAX_CHARS: usize = 84;
pub const MAX_ACTION_ITEMS: usize = 3;
pub const MAX_WATCHOUTS: usize = 2;
pub const INSIGHT_PARAGRAPHS: usize = 2;

/// Plural forms accepted for a banned term.
#[derive(Debug, Clone, Copy)]
enum Plural {
    None,
    /// strength → strengths
    S,
    /// weakness → weaknesses
    Es,
    /// fragility → fragilities
    Ies,
}

#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// Whole-word phrase; internal spaces match any whitespace run.
    Term(&'static str, Plural),
    /// Raw case-insensitive regex for shapes a term list cannot express.
    Pattern(&'static str),
}

/// One entry of the banned-content rule set.
#[derive(Debug, Clone, Copy)]
struct PolicyRule {
    id: &'static str,
    family: PolicyFamily,
    matcher: Matcher,
    /// Text this rule must flag; exercised by the rule-set tests.
    #[cfg_attr(not(test), allow(dead_code))]
    sample: &'static str,
}

const fn term(
    id: &'static str,
    family: PolicyFamily,
    text: &'static str,
    plural: Plural,
    sample: &'static str,
) -> PolicyRule {
    PolicyRule {
        id,
        family,
        matcher: Matcher::Term(text, plural),
        sample,
    }
}

const fn pattern(
    id: &'static str,
    family: PolicyFamily,
    regex: &'static str,
    sample: &'static str,
) -> PolicyRule {
    PolicyRule {
        id,
        family,
        matcher: Matcher::Pattern(regex),
        sample,
    }
}

use PolicyFamily::*;

/// The maintained banned-content list.
const POLICY_RULES: &[PolicyRule] = &[
    // --- Vendor naming ---
    term("vendor-openai", VendorNaming, "openai", Plural::None, "Written with OpenAI."),
    term("vendor-chatgpt", VendorNaming, "chatgpt", Plural::None, "ChatGPT says so."),
    term("vendor-gpt", VendorNaming, "gpt", Plural::None, "Drafted by GPT-4."),
    term("vendor-anthropic", VendorNaming, "anthropic", Plural::None, "An Anthropic model."),
    term("vendor-claude", VendorNaming, "claude", Plural::None, "Claude wrote this."),
    term("vendor-gemini", VendorNaming, "gemini", Plural::None, "Gemini suggests this."),
    term("vendor-llm", VendorNaming, "llm", Plural::S, "Modern LLMs agree."),
    term(
        "vendor-language-model",
        VendorNaming,
        "language model",
        Plural::S,
        "A large language model wrote this.",
    ),
    // --- Benchmark references ---
    term("benchmark", BenchmarkReference, "benchmark", Plural::S, "Against the benchmark."),
    term(
        "benchmark-industry-average",
        BenchmarkReference,
        "industry average",
        Plural::S,
        "Above the industry average.",
    ),
    term("benchmark-percentile", BenchmarkReference, "percentile", Plural::S, "In the 80th percentile."),
    term("benchmark-quartile", BenchmarkReference, "quartile", Plural::S, "Top quartile results."),
    term("benchmark-peer-group", BenchmarkReference, "peer group", Plural::S, "Versus your peer group."),
    pattern(
        "benchmark-compared-to-others",
        BenchmarkReference,
        r"\b(?:compared|relative)\s+to\s+(?:other|most|typical)\s+(?:executives|leaders|ceos|managers)\b",
        "Compared to other executives you lead well.",
    ),
    // --- Probability framing ---
    term("probability", ProbabilityFraming, "probability", Plural::Ies, "A high probability of stalling."),
    term("probability-likelihood", ProbabilityFraming, "likelihood", Plural::S, "The likelihood is high."),
    term("probability-odds", ProbabilityFraming, "odds", Plural::None, "The odds favour you."),
    pattern(
        "probability-percent-chance",
        ProbabilityFraming,
        r"\b\d{1,3}\s*(?:%|percent)\s+(?:chance|probability|likelihood)\b",
        "There is a 70% chance of drift.",
    ),
    pattern(
        "probability-chance-of",
        ProbabilityFraming,
        r"\b(?:high|low|good|strong|slim|real)\s+chance\s+(?:of|that)\b",
        "A high chance of burnout.",
    ),
    // --- Meta-instructions echoed back ---
    pattern(
        "meta-word-limit",
        MetaInstruction,
        r"\b(?:under|within|below|fewer\s+than|less\s+than|no\s+more\s+than|at\s+most)\s+\d+\s+words?\b",
        "Kept under 200 words as asked.",
    ),
    pattern(
        "meta-word-count",
        MetaInstruction,
        r"\bword\s+(?:count|limit)s?\b",
        "Word count: 180.",
    ),
    term("meta-as-an-ai", MetaInstruction, "as an ai", Plural::None, "As an AI, I cannot judge."),
    term("meta-system-prompt", MetaInstruction, "system prompt", Plural::S, "Per the system prompt."),
    pattern(
        "meta-per-instructions",
        MetaInstruction,
        r"\b(?:per|following|according\s+to)\s+(?:the|my|your)\s+(?:instructions|guidelines|prompt)\b",
        "Following the instructions, here it is.",
    ),
    // --- Leaked compliance jargon ---
    term(
        "compliance-methodology",
        ComplianceJargon,
        "methodology compliant",
        Plural::None,
        "This is methodology compliant.",
    ),
    term("compliance-policy-compliant", ComplianceJargon, "policy compliant", Plural::None, "Fully policy compliant."),
    term("compliance-guardrail", ComplianceJargon, "guardrail", Plural::S, "Within the guardrails."),
    term("compliance-banned-word", ComplianceJargon, "banned word", Plural::S, "No banned words used."),
    term("compliance-banned-phrase", ComplianceJargon, "banned phrase", Plural::S, "Avoiding banned phrases."),
    term("compliance-content-policy", ComplianceJargon, "content policy", Plural::Ies, "Under content policies."),
    // --- Legacy strength/weakness framing ---
    term("legacy-strength", LegacyFraming, "strength", Plural::S, "Your strengths are clear."),
    term("legacy-weakness", LegacyFraming, "weakness", Plural::Es, "Two weaknesses stand out."),
    term("legacy-fragility", LegacyFraming, "fragility", Plural::Ies, "Fragilities in the team."),
];

struct CompiledRule {
    rule: &'static PolicyRule,
    regex: Regex,
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    POLICY_RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            regex: Regex::new(&rule_regex(&rule.matcher)).expect("Invalid policy regex pattern"),
        })
        .collect()
});

fn rule_regex(matcher: &Matcher) -> String {
    match *matcher {
        Matcher::Pattern(p) => format!("(?i){p}"),
        Matcher::Term(text, plural) => {
            let (stem, suffix) = match plural {
                Plural::None => (text, ""),
                Plural::S => (text, "s?"),
                Plural::Es => (text, "(?:es)?"),
                Plural::Ies => (text.strip_suffix('y').unwrap_or(text), "(?:y|ies)"),
            };
            let words: Vec<String> = stem.split_whitespace().map(regex::escape).collect();
            format!(r"(?i)\b{}{}\b", words.join(r"\s+"), suffix)
        }
    }
}

/// True when `text` contains any banned phrase.
pub fn violates_policy(text: &str) -> bool {
    COMPILED_RULES.iter().any(|c| c.regex.is_match(text))
}

/// Every banned-phrase match in `text`, ordered by offset.
/// Overlapping matches keep the longer span.
pub fn find_violations(text: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    for compiled in COMPILED_RULES.iter() {
        for mat in compiled.regex.find_iter(text) {
            violations.push(PolicyViolation {
                rule_id: compiled.rule.id,
                family: compiled.rule.family,
                matched_text: mat.as_str().to_string(),
                offset: mat.start(),
                length: mat.len(),
            });
        }
    }
    deduplicate_violations(&mut violations);
    violations
}

/// Remove overlapping violations, keeping the more specific (longer) match.
fn deduplicate_violations(violations: &mut Vec<PolicyViolation>) {
    violations.sort_by_key(|v| (v.offset, std::cmp::Reverse(v.length)));
    let mut kept: Vec<PolicyViolation> = Vec::with_capacity(violations.len());
    for v in violations.drain(..) {
        let contained = kept
            .last()
            .is_some_and(|k| v.offset >= k.offset && v.offset + v.length <= k.offset + k.length);
        if !contained {
            kept.push(v);
        }
    }
    *violations = kept;
}

/// Delete every banned phrase from `text`. Whitespace left behind is the
/// caller's to tidy.
pub fn strip_banned_phrases(text: &str) -> String {
    COMPILED_RULES
        .iter()
        .fold(text.to_string(), |acc, c| c.regex.replace_all(&acc, "").into_owned())
}

/// Words separated by whitespace runs. Blank input counts as zero.
pub fn get_word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_valid_word_count(text: &str) -> bool {
    (MIN_INSIGHT_WORDS..=MAX_INSIGHT_WORDS).contains(&get_word_count(text))
}

/// Blank-line delimited, non-empty blocks.
pub fn count_paragraphs(text: &str) -> usize {
    let normalized = text.replace('\r', "");
    normalized
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .count()
}

/// Check every text field of an assessment against the banned list and the
/// structural contract.
pub fn validate_assessment(assessment: &SituationAssessment) -> PolicyReport {
    let mut report = PolicyReport::default();

    let mut scan = |field: &'static str, text: &str| {
        for violation in find_violations(text) {
            report.violations.push(FieldViolation { field, violation });
        }
    };

    if let Some(headline) = &assessment.headline {
        scan("headline", headline);
    }
    if let Some(insight) = &assessment.insight {
        scan("insight", insight);
    }
    for item in assessment.action_items.iter().flatten() {
        scan("actionItems", item);
    }
    for item in assessment.watchouts.iter().flatten() {
        scan("watchouts", item);
    }
    if let Some(scenarios) = &assessment.scenarios {
        scan("scenarios", &scenarios.if_unchanged);
        scan("scenarios", &scenarios.if_addressed);
    }
    scan("disclaimer", &assessment.disclaimer);

    report.structural = structural_issues(assessment);
    report
}

fn structural_issues(assessment: &SituationAssessment) -> Vec<StructuralIssue> {
    let mut issues = Vec::new();

    match assessment.insight.as_deref() {
        None => issues.push(StructuralIssue::InsightMissing),
        Some(insight) if insight.trim().is_empty() => issues.push(StructuralIssue::InsightMissing),
        Some(insight) => {
            if !is_valid_word_count(insight) {
                issues.push(StructuralIssue::WordCount {
                    count: get_word_count(insight),
                });
            }
            let paragraphs = count_paragraphs(insight);
            if paragraphs != INSIGHT_PARAGRAPHS {
                issues.push(StructuralIssue::ParagraphCount { count: paragraphs });
            }
        }
    }

    if let Some(headline) = &assessment.headline {
        let chars = headline.chars().count();
        if chars > HEADLINE_MAX_CHARS {
            issues.push(StructuralIssue::HeadlineTooLong { chars });
        }
    }

    check_items(
        "actionItems",
        assessment.action_items.as_deref(),
        MAX_ACTION_ITEMS,
        &mut issues,
    );
    check_items(
        "watchouts",
        assessment.watchouts.as_deref(),
        MAX_WATCHOUTS,
        &mut issues,
    );

    issues
}

fn check_items(
    field: &'static str,
    items: Option<&[String]>,
    max_items: usize,
    issues: &mut Vec<StructuralIssue>,
) {
    let Some(items) = items else { return };
    if items.len() > max_items {
        issues.push(StructuralIssue::TooManyItems {
            field,
            count: items.len(),
        });
    }
    for item in items {
        let chars = item.chars().count();
        if chars > ITEM_MAX_CHARS {
            issues.push(StructuralIssue::ItemTooLong { field, chars });
        }
    }
}
