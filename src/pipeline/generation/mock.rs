use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::NarrativeGenerator;
use super::GenerationError;
use crate::models::GenerationContext;

/// A 172-word, two-paragraph insight that passes the content policy.
pub const SAMPLE_INSIGHT: &str =
    "You have built a clear sense of direction and your team knows where the \
    business is heading. Delivery is steady, and the way you run the weekly \
    rhythm gives people room to act without waiting for approval. The gap sits \
    in how much of your own energy is left at the end of each week, which shapes \
    how patient and present you can be in the moments that matter most.\n\n\
    The next quarter is a good time to protect recovery as seriously as you \
    protect the plan. Look at the recurring meetings that drain you without \
    moving decisions forward and hand some of them to the leaders who report to \
    you. Use the time you recover to hold longer conversations with the two or \
    three people whose growth will decide the next phase. Small changes in how \
    you spend attention tend to compound, and the team will notice the \
    difference well before any formal review does. Keep a short note each Friday \
    on what gave you energy and what took it away.";

/// Model output in the expected JSON shape around the given insight.
pub fn model_output_with_insight(insight: &str) -> String {
    let body = serde_json::json!({
        "headline": "Clear direction, with your own energy as the constraint",
        "insight": insight,
        "actionItems": [
            "Hand two recurring meetings to your direct reports",
            "Block one recovery afternoon each week",
        ],
        "watchouts": ["Recovery time is the first thing to disappear"],
        "scenarios": {
            "ifUnchanged": "The plan holds while your patience and presence wear thin.",
            "ifAddressed": "The team takes on more of the weekly load and you lead with more energy.",
        },
        "disclaimer": "This reflects your own answers.",
    });
    format!("```json\n{body:#}\n```")
}

/// Policy-clean model output.
pub fn sample_model_output() -> String {
    model_output_with_insight(SAMPLE_INSIGHT)
}

/// Generator that replays a fixed script of results, one per call.
///
/// Once the script is used up, the last entry repeats.
pub struct ScriptedGenerator {
    model: String,
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    last: Mutex<Option<Result<String, GenerationError>>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            model: "scripted-model".to_string(),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    /// Every call returns the same result.
    pub fn always(result: Result<String, GenerationError>) -> Self {
        Self::new(vec![result])
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_result(&self) -> Result<String, GenerationError> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(result) = next {
            *last = Some(result);
        }
        last.clone()
            .unwrap_or_else(|| Err(GenerationError::MalformedResponse("empty script".into())))
    }
}

#[async_trait]
impl NarrativeGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, _context: &GenerationContext) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PillarScores, ProfileSignals};
    use crate::pipeline::generation::parse_situation_response;
    use crate::pipeline::safety::{get_word_count, validate_assessment};

    fn ctx() -> GenerationContext {
        GenerationContext {
            assessment_id: "a-1".into(),
            scores: PillarScores {
                vision: 80,
                execution: 70,
                people: 60,
                resilience: 40,
            },
            profile: ProfileSignals::default(),
        }
    }

    #[test]
    fn sample_output_parses_and_passes_policy() {
        let parsed = parse_situation_response(&sample_model_output()).unwrap();
        assert_eq!(get_word_count(parsed.insight.as_deref().unwrap()), 172);
        let report = validate_assessment(&parsed);
        assert!(report.is_acceptable(), "{report:?}");
        assert!(report.structural.is_empty(), "{report:?}");
    }

    #[tokio::test]
    async fn replays_script_then_repeats_last() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Timeout(10)),
            Ok("done".into()),
        ]);
        assert_eq!(generator.generate(&ctx()).await, Err(GenerationError::Timeout(10)));
        assert_eq!(generator.generate(&ctx()).await, Ok("done".into()));
        assert_eq!(generator.generate(&ctx()).await, Ok("done".into()));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn empty_script_fails() {
        let generator = ScriptedGenerator::new(vec![]);
        assert!(generator.generate(&ctx()).await.is_err());
    }
}
