use serde::Deserialize;
use serde_json::Value;

use super::GenerationError;
use crate::models::{Scenarios, SituationAssessment};

/// Parse raw model output into an (unsanitized) situation assessment.
///
/// Accepts a fenced ```json block, a bare fence, or the outermost `{...}`
/// span. Field names may be camelCase or snake_case; `insight` may be a
/// string or a list of paragraphs and is the only required field.
pub fn parse_situation_response(response: &str) -> Result<SituationAssessment, GenerationError> {
    let json_str = extract_json(response)
        .ok_or_else(|| GenerationError::MalformedResponse("No JSON object found".into()))?;

    let raw: RawSituation =
        serde_json::from_str(json_str).map_err(|e| GenerationError::JsonParsing(e.to_string()))?;

    let insight = raw
        .insight
        .map(TextOrList::into_paragraphs)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GenerationError::MalformedResponse("Missing insight".into()))?;

    Ok(SituationAssessment {
        headline: raw.headline,
        insight: Some(insight),
        action_items: raw.action_items.map(TextOrList::into_items),
        watchouts: raw.watchouts.map(TextOrList::into_items),
        scenarios: raw.scenarios.as_ref().and_then(parse_scenarios),
        disclaimer: raw.disclaimer.unwrap_or_default(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSituation {
    #[serde(default, alias = "title")]
    headline: Option<String>,
    #[serde(default)]
    insight: Option<TextOrList>,
    #[serde(default, alias = "action_items", alias = "actions")]
    action_items: Option<TextOrList>,
    #[serde(default, alias = "watch_outs", alias = "watchOuts")]
    watchouts: Option<TextOrList>,
    #[serde(default)]
    scenarios: Option<Value>,
    #[serde(default)]
    disclaimer: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<Value>),
}

impl TextOrList {
    fn strings(items: Vec<Value>) -> impl Iterator<Item = String> {
        items.into_iter().filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    fn into_paragraphs(self) -> String {
        match self {
            TextOrList::Text(text) => text,
            TextOrList::List(items) => Self::strings(items).collect::<Vec<_>>().join("\n\n"),
        }
    }

    fn into_items(self) -> Vec<String> {
        match self {
            TextOrList::Text(text) => vec![text],
            TextOrList::List(items) => Self::strings(items).collect(),
        }
    }
}

fn parse_scenarios(value: &Value) -> Option<Scenarios> {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
    match value {
        Value::Object(map) => Some(Scenarios {
            if_unchanged: text(map.get("ifUnchanged").or_else(|| map.get("if_unchanged")))?,
            if_addressed: text(map.get("ifAddressed").or_else(|| map.get("if_addressed")))?,
        }),
        Value::Array(items) if items.len() == 2 => Some(Scenarios {
            if_unchanged: text(items.first())?,
            if_addressed: text(items.get(1))?,
        }),
        _ => None,
    }
}

/// Locate the JSON object in a model response.
fn extract_json(response: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = response.find(fence) {
            let body = &response[start + fence.len()..];
            if let Some(end) = body.find("```") {
                let candidate = body[..end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
