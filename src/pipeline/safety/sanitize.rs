use std::sync::LazyLock;

use regex::Regex;

use super::policy::{
    strip_banned_phrases, violates_policy, HEADLINE_MAX_CHARS, ITEM_MAX_CHARS, MAX_ACTION_ITEMS,
    MAX_WATCHOUTS,
};
use crate::models::{
    AssessmentPayload, LegacyAssessment, Scenarios, SituationAssessment, DEFAULT_DISCLAIMER,
};

pub const SCENARIO_MAX_CHARS: usize = 280;
pub const DISCLAIMER_MAX_CHARS: usize = 400;

/// Removing a banned phrase can splice two neighbours into a new one, so
/// cleanup repeats until the text is stable.
const MAX_CLEAN_PASSES: usize = 4;

/// Process chatter the model sometimes wraps around its answer.
static LEAK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "Here is your assessment:" preamble lines
        r"(?im)^[ \t]*(?:here\s+is|here's|below\s+is)\s+(?:the|your|an?)\s+[^\n]{0,60}:[ \t]*$",
        // "(182 words)" style counters
        r"(?i)\(\s*\d+\s+words?\s*\)",
        // "Note: this response follows ..." trailers
        r"(?im)^[ \t]*note\s*:[^\n]*\b(?:response|instructions?|requirements?|format)\b[^\n]*$",
        // "This text is fully compliant."
        r"(?i)\b(?:this|the)\s+(?:response|text|narrative|output)\s+(?:is|was)\s+(?:(?:fully|methodology|policy)\s+)?compliant\b\.?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid leak pattern"))
    .collect()
});

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").expect("valid regex"));

static MARKDOWN_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__|`").expect("valid regex"));

static BULLET_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*•·▪]|\d{1,2}[.)])[ \t]+").expect("valid regex")
});

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:!?])").expect("valid regex"));

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid regex"));

// ═══════════════════════════════════════════════════════════
// Text cleanup
// ═══════════════════════════════════════════════════════════

/// Common cleanup shared by every field. Keeps paragraph breaks.
pub fn clean_text(text: &str) -> String {
    let mut out = text.replace('\r', "");
    for leak in LEAK_PATTERNS.iter() {
        out = leak.replace_all(&out, "").into_owned();
    }
    out = MARKDOWN_HEADING.replace_all(&out, "").into_owned();
    out = MARKDOWN_EMPHASIS.replace_all(&out, "").into_owned();
    out = BULLET_MARKER.replace_all(&out, "").into_owned();

    for _ in 0..MAX_CLEAN_PASSES {
        out = strip_banned_phrases(&out);
        out = tidy_spacing(&collapse_repeated_punctuation(&out));
        if !violates_policy(&out) {
            break;
        }
    }
    out
}

/// Collapse runs of the same punctuation mark ("!!!" → "!", ",," → ",").
fn collapse_repeated_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        let repeated = prev == Some(c) && matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-');
        if !repeated {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

fn tidy_spacing(text: &str) -> String {
    let out = SPACE_BEFORE_PUNCT.replace_all(text, "$1");
    let out = HORIZONTAL_SPACE.replace_all(&out, " ");
    let lines: Vec<&str> = out.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n\n").trim().to_string()
}

/// Single-line form: paragraph breaks become spaces.
fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max_chars` characters, preferring the last word boundary.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let truncated = &text[..cut];
    let kept = match truncated.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &truncated[..pos],
        _ => truncated,
    };
    kept.trim_end_matches([',', ';', ':', ' ']).to_string()
}

// ═══════════════════════════════════════════════════════════
// Insight
// ═══════════════════════════════════════════════════════════

/// Normalize the insight to exactly two paragraphs separated by one blank
/// line. Blocks left with no words after cleanup are dropped; if none
/// remain, both paragraphs are empty. Whitespace-only input yields "".
pub fn sanitize_insight(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let cleaned = clean_text(text);
    let blocks: Vec<String> = cleaned
        .split("\n\n")
        .map(flatten)
        .filter(|b| has_words(b))
        .collect();

    match blocks.as_slice() {
        [] => "\n\n".to_string(),
        [first, second, ..] => format!("{first}\n\n{second}"),
        [only] => {
            let (first, second) = split_block(only);
            format!("{first}\n\n{second}")
        }
    }
}

fn has_words(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Split one block into two paragraphs at the sentence midpoint, with
/// `ceil(n/2)` sentences in the first. A single sentence splits at the word
/// midpoint instead.
fn split_block(block: &str) -> (String, String) {
    let sentences = split_sentences(block);
    if sentences.len() >= 2 {
        let mid = sentences.len().div_ceil(2);
        return (sentences[..mid].join(" "), sentences[mid..].join(" "));
    }
    let words: Vec<&str> = block.split_whitespace().collect();
    let mid = words.len().div_ceil(2);
    (words[..mid].join(" "), words[mid..].join(" "))
}

/// Sentences end at `.`, `!` or `?` followed by whitespace or end of text.
/// Text with no terminal punctuation is one sentence.
fn split_sentences(block: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = block.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = i + c.len_utf8();
            let sentence = block[start..end].trim();
            if has_words(sentence) {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = block[start..].trim();
    if has_words(tail) {
        sentences.push(tail);
    }
    sentences
}

// ═══════════════════════════════════════════════════════════
// Short fields
// ═══════════════════════════════════════════════════════════

pub fn sanitize_headline(text: &str) -> String {
    sanitize_structured_field(text, Some(HEADLINE_MAX_CHARS))
}

/// Clean a single-line field, optionally bounded to `max_chars`.
pub fn sanitize_structured_field(text: &str, max_chars: Option<usize>) -> String {
    let flat = flatten(&clean_text(text));
    match max_chars {
        Some(max) => truncate_at_word_boundary(&flat, max),
        None => flat,
    }
}

fn sanitize_list(items: &[String], max_items: usize) -> Vec<String> {
    items
        .iter()
        .map(|item| sanitize_structured_field(item, Some(ITEM_MAX_CHARS)))
        .filter(|item| !item.is_empty())
        .take(max_items)
        .collect()
}

pub fn sanitize_action_items(items: &[String]) -> Vec<String> {
    sanitize_list(items, MAX_ACTION_ITEMS)
}

pub fn sanitize_watchouts(items: &[String]) -> Vec<String> {
    sanitize_list(items, MAX_WATCHOUTS)
}

pub fn sanitize_scenarios(scenarios: &Scenarios) -> Scenarios {
    Scenarios {
        if_unchanged: sanitize_structured_field(&scenarios.if_unchanged, Some(SCENARIO_MAX_CHARS)),
        if_addressed: sanitize_structured_field(&scenarios.if_addressed, Some(SCENARIO_MAX_CHARS)),
    }
}

/// Cleaned disclaimer, or the default text when nothing usable remains.
pub fn sanitize_disclaimer(text: &str) -> String {
    let cleaned = sanitize_structured_field(text, Some(DISCLAIMER_MAX_CHARS));
    if cleaned.is_empty() {
        DEFAULT_DISCLAIMER.to_string()
    } else {
        cleaned
    }
}

// ═══════════════════════════════════════════════════════════
// Aggregate
// ═══════════════════════════════════════════════════════════

fn non_empty(text: String) -> Option<String> {
    has_words(&text).then_some(text)
}

/// Sanitize every present field; absent fields stay absent.
pub fn sanitize_structured(assessment: &SituationAssessment) -> SituationAssessment {
    SituationAssessment {
        headline: assessment
            .headline
            .as_deref()
            .and_then(|h| non_empty(sanitize_headline(h))),
        insight: assessment
            .insight
            .as_deref()
            .and_then(|i| non_empty(sanitize_insight(i))),
        action_items: assessment
            .action_items
            .as_deref()
            .map(sanitize_action_items),
        watchouts: assessment.watchouts.as_deref().map(sanitize_watchouts),
        scenarios: assessment.scenarios.as_ref().map(sanitize_scenarios),
        disclaimer: sanitize_disclaimer(&assessment.disclaimer),
    }
}

/// Display-ready copy of any payload. Legacy payloads keep their content
/// and only get a cleaned disclaimer.
pub fn sanitize_situation_assessment(payload: &AssessmentPayload) -> AssessmentPayload {
    match payload {
        AssessmentPayload::Structured(assessment) => {
            AssessmentPayload::Structured(sanitize_structured(assessment))
        }
        AssessmentPayload::Legacy(legacy) => AssessmentPayload::Legacy(LegacyAssessment {
            disclaimer: sanitize_disclaimer(&legacy.disclaimer),
            ..legacy.clone()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::safety::policy::{count_paragraphs, get_word_count};

    // -- clean_text --

    #[test]
    fn removes_carriage_returns_and_markdown() {
        let out = clean_text("## Overview\r\n**Clear** direction and `steady` delivery.");
        assert_eq!(out, "Overview\nClear direction and steady delivery.");
    }

    #[test]
    fn strips_bullets_and_repeated_punctuation() {
        let out = clean_text("- Delegate more!!!\n* Protect recovery time..\n1. Ask for feedback??");
        assert_eq!(out, "Delegate more!\nProtect recovery time.\nAsk for feedback?");
    }

    #[test]
    fn strips_banned_phrases_and_tidies_gaps() {
        let out = clean_text("Your strengths are clear , and the benchmark is irrelevant.");
        assert!(!violates_policy(&out));
        assert_eq!(out, "Your are clear, and the is irrelevant.");
    }

    #[test]
    fn strips_spliced_banned_phrase() {
        // removing "odds" joins "word" and "count"
        let out = clean_text("A word odds count appears.");
        assert!(!violates_policy(&out), "{out}");
    }

    #[test]
    fn strips_leaked_process_lines() {
        let out = clean_text("Here is your assessment:\nDelivery is steady. (182 words)");
        assert_eq!(out, "Delivery is steady.");
        let out = clean_text("Delivery is steady. This response is methodology compliant.");
        assert_eq!(out, "Delivery is steady.");
    }

    #[test]
    fn collapses_multiple_blank_lines() {
        assert_eq!(clean_text("One.\n\n\n\n  \nTwo."), "One.\n\nTwo.");
    }

    // -- insight --

    #[test]
    fn keeps_first_two_blocks() {
        let out = sanitize_insight("First block.\n\nSecond block.\n\nThird block.");
        assert_eq!(out, "First block.\n\nSecond block.");
    }

    #[test]
    fn single_block_splits_at_sentence_midpoint() {
        let out = sanitize_insight("One. Two! Three? Four. Five.");
        assert_eq!(out, "One. Two! Three?\n\nFour. Five.");
        assert_eq!(out.matches("\n\n").count(), 1);
    }

    #[test]
    fn even_sentence_count_splits_in_half() {
        assert_eq!(sanitize_insight("A b. C d. E f. G h."), "A b. C d.\n\nE f. G h.");
    }

    #[test]
    fn single_sentence_splits_at_word_midpoint() {
        let out = sanitize_insight("no terminal punctuation in this block at all");
        assert_eq!(out, "no terminal punctuation in\n\nthis block at all");
    }

    #[test]
    fn decimal_point_is_not_a_sentence_end() {
        let out = sanitize_insight("Revenue grew 2.5 times this year. The team doubled.");
        assert_eq!(out, "Revenue grew 2.5 times this year.\n\nThe team doubled.");
    }

    #[test]
    fn single_word_leaves_empty_second_paragraph() {
        assert_eq!(sanitize_insight("Momentum"), "Momentum\n\n");
    }

    #[test]
    fn blank_insight_yields_empty_string() {
        assert_eq!(sanitize_insight(""), "");
        assert_eq!(sanitize_insight("  \r\n\n \n"), "");
    }

    #[test]
    fn fully_stripped_insight_keeps_two_empty_paragraphs() {
        assert_eq!(sanitize_insight("strengths"), "\n\n");
        assert_eq!(sanitize_insight("- "), "\n\n");
    }

    #[test]
    fn punctuation_left_by_stripping_is_not_a_paragraph() {
        let out = sanitize_insight("Benchmark odds.");
        assert!(!out.starts_with('.'), "{out:?}");
        assert_eq!(out.matches("\n\n").count(), 1);

        let out = sanitize_insight("Benchmark odds.\n\nKeep the weekly rhythm. Protect recovery time.");
        assert_eq!(out, "Keep the weekly rhythm.\n\nProtect recovery time.");
    }

    #[test]
    fn structured_insight_with_no_words_is_absent() {
        let cleaned = sanitize_structured(&SituationAssessment {
            insight: Some("strengths".into()),
            ..Default::default()
        });
        assert_eq!(cleaned.insight, None);
    }

    #[test]
    fn insight_always_has_exactly_one_break() {
        let inputs = [
            "a\n\nb\n\nc\n\nd",
            "Sentence one. Sentence two.",
            "Just words without ending",
            "Line one\nline two\n\n\n\nline three",
            "strengths",
            "- ",
            "Benchmark odds.",
            "...\n\n!!!\n\nOne real sentence here.",
        ];
        for input in inputs {
            let out = sanitize_insight(input);
            assert_eq!(out.matches("\n\n").count(), 1, "input {input:?} gave {out:?}");
            assert!(!out.contains("\n\n\n"));
        }
    }

    #[test]
    fn paragraph_words_are_preserved() {
        let text = "word ".repeat(170);
        let out = sanitize_insight(&text);
        assert_eq!(get_word_count(&out), 170);
        assert_eq!(count_paragraphs(&out), 2);
    }

    // -- short fields --

    #[test]
    fn headline_bounded_to_limit() {
        let long = "Leadership momentum ".repeat(20);
        let out = sanitize_headline(&long);
        assert!(out.chars().count() <= HEADLINE_MAX_CHARS);
        assert!(out.ends_with("momentum") || out.ends_with("Leadership"));
    }

    #[test]
    fn headline_without_spaces_is_hard_cut() {
        let out = sanitize_headline(&"x".repeat(300));
        assert_eq!(out.chars().count(), HEADLINE_MAX_CHARS);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let text = "é".repeat(200);
        let out = truncate_at_word_boundary(&text, 10);
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn action_items_capped_in_count_and_length() {
        let items: Vec<String> = (0..5)
            .map(|i| format!("Action {i} {}", "detail ".repeat(20)))
            .collect();
        let out = sanitize_action_items(&items);
        assert_eq!(out.len(), MAX_ACTION_ITEMS);
        assert!(out.iter().all(|i| i.chars().count() <= ITEM_MAX_CHARS));
        assert!(out[0].starts_with("Action 0"));
    }

    #[test]
    fn blank_items_dropped_before_capping() {
        let items = vec![
            "  ".to_string(),
            "- ".to_string(),
            "Name the gap".to_string(),
            "Ask for feedback".to_string(),
            "Review in a month".to_string(),
        ];
        assert_eq!(
            sanitize_watchouts(&items),
            vec!["Name the gap".to_string(), "Ask for feedback".to_string()]
        );
    }

    #[test]
    fn structured_field_unbounded_when_no_limit() {
        let text = "steady ".repeat(100);
        assert_eq!(sanitize_structured_field(&text, None).split(' ').count(), 100);
    }

    // -- aggregate --

    #[test]
    fn absent_fields_stay_absent() {
        let out = sanitize_structured(&SituationAssessment {
            headline: Some("**Steady** footing".into()),
            ..Default::default()
        });
        assert_eq!(out.headline.as_deref(), Some("Steady footing"));
        assert!(out.insight.is_none());
        assert!(out.action_items.is_none());
        assert!(out.scenarios.is_none());
        assert_eq!(out.disclaimer, DEFAULT_DISCLAIMER);
    }

    #[test]
    fn present_disclaimer_is_cleaned_not_replaced() {
        let out = sanitize_structured(&SituationAssessment {
            disclaimer: "Based on  your answers!!".into(),
            ..Default::default()
        });
        assert_eq!(out.disclaimer, "Based on your answers!");
    }

    #[test]
    fn scenarios_are_cleaned() {
        let out = sanitize_scenarios(&Scenarios {
            if_unchanged: "- Energy thins out..".into(),
            if_addressed: "The team   grows.".into(),
        });
        assert_eq!(out.if_unchanged, "Energy thins out.");
        assert_eq!(out.if_addressed, "The team grows.");
    }

    #[test]
    fn legacy_payload_passes_through_except_disclaimer() {
        let legacy = LegacyAssessment {
            strengths: vec!["Clear direction!!".into()],
            fragilities: vec!["Thin bench".into()],
            what_works: vec![],
            disclaimer: String::new(),
        };
        let out = sanitize_situation_assessment(&AssessmentPayload::Legacy(legacy.clone()));
        match out {
            AssessmentPayload::Legacy(l) => {
                assert_eq!(l.strengths, legacy.strengths);
                assert_eq!(l.fragilities, legacy.fragilities);
                assert_eq!(l.disclaimer, DEFAULT_DISCLAIMER);
            }
            other => panic!("schema changed to {}", other.schema()),
        }
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let payload = AssessmentPayload::Structured(SituationAssessment {
            headline: Some("Direction is clear!!".into()),
            insight: Some("One. Two. Three.".into()),
            action_items: Some(vec!["- Delegate".into()]),
            watchouts: None,
            scenarios: None,
            disclaimer: String::new(),
        });
        let once = sanitize_situation_assessment(&payload);
        let twice = sanitize_situation_assessment(&once);
        assert_eq!(once, twice);
    }
}
