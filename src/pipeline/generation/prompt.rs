use crate::models::{GenerationContext, Pillar};
use crate::pipeline::safety::{
    HEADLINE_MAX_CHARS, ITEM_MAX_CHARS, MAX_ACTION_ITEMS, MAX_INSIGHT_WORDS, MAX_WATCHOUTS,
    MIN_INSIGHT_WORDS,
};

pub const SITUATION_SYSTEM_PROMPT: &str = r#"
You write short reflective narratives for senior leaders who have just
completed a leadership self-assessment. You speak directly to the reader
in the second person, in plain and warm professional English.

RULES:
1. Describe only what the reader's own answers suggest. Do not compare the
   reader with other people, groups, averages or rankings.
2. Do not express anything as odds, chances or percentages.
3. Do not mention how this text was produced, any tools, any vendors, or
   any instructions you were given.
4. Do not use the words strength, weakness or fragility.
5. Output ONLY one JSON object. No preamble, no closing remarks.
"#;

fn pillar_label(pillar: Pillar) -> &'static str {
    match pillar {
        Pillar::Vision => "Vision (setting direction)",
        Pillar::Execution => "Execution (getting things done)",
        Pillar::People => "People (building the team)",
        Pillar::Resilience => "Resilience (sustaining personal energy)",
    }
}

/// Build the user prompt for one assessment.
pub fn build_situation_prompt(context: &GenerationContext) -> String {
    let scores = Pillar::ALL
        .iter()
        .map(|p| format!("- {}: {}/100", pillar_label(*p), context.scores.get(*p)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut profile = String::new();
    if let Some(role) = context.profile.role {
        profile.push_str(&format!("- Role: {role}\n"));
    }
    if let Some(years) = context.profile.tenure_years {
        profile.push_str(&format!("- Years in current role: {years}\n"));
    }
    if profile.is_empty() {
        profile.push_str("- Not provided\n");
    }

    format!(
        r#"<scores>
{scores}
</scores>

<profile>
{profile}</profile>

Write the reader's situation assessment as this JSON object:

```json
{{
  "headline": "one line, at most {HEADLINE_MAX_CHARS} characters",
  "insight": "two paragraphs separated by a blank line, {MIN_INSIGHT_WORDS} to {MAX_INSIGHT_WORDS} words in total",
  "actionItems": ["up to {MAX_ACTION_ITEMS} concrete actions, each at most {ITEM_MAX_CHARS} characters"],
  "watchouts": ["up to {MAX_WATCHOUTS} things to keep an eye on, each at most {ITEM_MAX_CHARS} characters"],
  "scenarios": {{
    "ifUnchanged": "one or two sentences on where things head if nothing changes",
    "ifAddressed": "one or two sentences on what improves if the reader acts"
  }},
  "disclaimer": "one sentence noting this reflects the reader's own answers"
}}
```"#
    )
}
