//! Pre-vetted fallback narratives.
//!
//! When generation is exhausted, a template is chosen deterministically from
//! the assessment context. Selection rules are data: each template and
//! context note carries a [`Predicate`] over a fixed set of context facts,
//! and the first template whose predicate holds wins.

use crate::models::{
    GenerationContext, Pillar, PillarScores, Role, Scenarios, SituationAssessment,
    DEFAULT_DISCLAIMER,
};
use crate::pipeline::safety::MAX_WATCHOUTS;

// ═══════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════

/// Numeric fact a predicate can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Score(Pillar),
    LowestScore,
    HighestScore,
    ScoreSpread,
    TenureYears,
}

/// Trigger condition for a template or context note.
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    Always,
    /// Field is present and `>=` the threshold.
    AtLeast(Field, u8),
    /// Field is present and `<` the threshold.
    Below(Field, u8),
    RoleIs(Role),
    LowestPillarIs(Pillar),
    All(&'static [Predicate]),
    Any(&'static [Predicate]),
    Not(&'static Predicate),
}

/// Facts derived once from a context; predicates only read these.
#[derive(Debug, Clone, Copy)]
pub struct ContextFacts {
    scores: PillarScores,
    lowest: (Pillar, u8),
    highest: (Pillar, u8),
    role: Option<Role>,
    tenure_years: Option<u8>,
}

impl ContextFacts {
    pub fn from_context(context: &GenerationContext) -> Self {
        Self {
            scores: context.scores,
            lowest: context.scores.lowest(),
            highest: context.scores.highest(),
            role: context.profile.role,
            tenure_years: context.profile.tenure_years,
        }
    }

    fn value(&self, field: Field) -> Option<u8> {
        match field {
            Field::Score(pillar) => Some(self.scores.get(pillar)),
            Field::LowestScore => Some(self.lowest.1),
            Field::HighestScore => Some(self.highest.1),
            Field::ScoreSpread => Some(self.highest.1.saturating_sub(self.lowest.1)),
            Field::TenureYears => self.tenure_years,
        }
    }
}

impl Predicate {
    pub fn evaluate(&self, facts: &ContextFacts) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::AtLeast(field, threshold) => {
                facts.value(*field).is_some_and(|v| v >= *threshold)
            }
            Predicate::Below(field, threshold) => {
                facts.value(*field).is_some_and(|v| v < *threshold)
            }
            Predicate::RoleIs(role) => facts.role == Some(*role),
            Predicate::LowestPillarIs(pillar) => facts.lowest.0 == *pillar,
            Predicate::All(preds) => preds.iter().all(|p| p.evaluate(facts)),
            Predicate::Any(preds) => preds.iter().any(|p| p.evaluate(facts)),
            Predicate::Not(pred) => !pred.evaluate(facts),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Catalogue
// ═══════════════════════════════════════════════════════════

pub struct FallbackTemplate {
    pub id: &'static str,
    pub when: Predicate,
    pub headline: &'static str,
    pub insight: &'static str,
    pub action_items: &'static [&'static str],
    pub watchouts: &'static [&'static str],
    pub if_unchanged: &'static str,
    pub if_addressed: &'static str,
}

/// Extra watch-out line appended to a fallback when its predicate holds.
pub struct ContextNote {
    pub id: &'static str,
    pub when: Predicate,
    pub text: &'static str,
}

/// Checked in order; the last entry always applies.
pub const FALLBACK_TEMPLATES: &[FallbackTemplate] = &[
    FallbackTemplate {
        id: "fallback-steady-v1",
        when: Predicate::AtLeast(Field::LowestScore, 70),
        headline: "Even footing across the board, with room to stretch on purpose",
        insight: "Your answers describe a leader whose footing is broadly even across \
                  direction, delivery, people and personal energy. Nothing in the pattern \
                  points to an area that is quietly failing, and that balance is itself an \
                  asset: it means the organisation around you can absorb change without \
                  leaning too hard on any single part of how you lead. The risk in a profile \
                  like this is rarely a crisis. It is drift, where steady results make it easy \
                  to stop asking which habits still earn their place on your calendar.\n\n\
                  The useful question now is where a deliberate stretch would matter most over \
                  the next two quarters. Pick one area where you feel comfortable rather than \
                  challenged and raise the bar on purpose, whether that means a sharper point \
                  of view on direction, faster decisions, or deeper investment in the people \
                  who will carry the next phase. Keep the rest of the system stable while you \
                  do it, and revisit the choice after a few weeks so the stretch stays \
                  intentional instead of becoming another standing commitment.",
        action_items: &[
            "Pick one comfortable area and raise the bar for the next two quarters",
            "Ask your team which steady habits no longer earn their place",
            "Revisit your stretch goal after six weeks and adjust it deliberately",
        ],
        watchouts: &["Steady results can hide slow drift in how you spend your time"],
        if_unchanged: "Results stay dependable, but the organisation gradually settles into \
                       habits that no one questions.",
        if_addressed: "A deliberate stretch in one area lifts the pace of the whole team while \
                       the rest of the system stays stable.",
    },
    FallbackTemplate {
        id: "fallback-uneven-v1",
        when: Predicate::AtLeast(Field::ScoreSpread, 30),
        headline: "A wide gap between your most and least practised areas of leadership",
        insight: "Your answers show a wide gap between the parts of leadership that come \
                  naturally to you and the parts that get less of your attention. That spread \
                  is common in senior roles, because people are usually promoted for what they \
                  already do well, but it matters more as scope grows. The areas you rate \
                  highly are likely carrying the load, and they can mask how much the lower \
                  areas are costing your team in time, clarity or energy.\n\n\
                  The most practical move is to stop treating the lower areas as permanent \
                  features of your style. Choose the single gap that most affects the people \
                  closest to you and make it visible: name it with your team, ask for specific \
                  feedback, and agree on what better would look like in a month. You do not \
                  need to close every gap at once. Narrowing the widest one usually lifts the \
                  others, because the time and attention it frees up can flow back into the \
                  work you already do well.",
        action_items: &[
            "Name the widest gap with your team and agree what better looks like",
            "Ask two direct reports for specific feedback on that one area",
            "Review progress after a month before widening the focus",
        ],
        watchouts: &["Highly rated areas may be masking the cost of the lower ones"],
        if_unchanged: "The areas you rely on keep carrying the load while the gaps quietly cost \
                       the team time and clarity.",
        if_addressed: "Narrowing the widest gap frees attention that flows back into the work \
                       you already do well.",
    },
    FallbackTemplate {
        id: "fallback-people-v1",
        when: Predicate::All(&[
            Predicate::LowestPillarIs(Pillar::People),
            Predicate::Below(Field::Score(Pillar::People), 60),
        ]),
        headline: "The people side of your leadership needs more of your attention",
        insight: "Your answers suggest that the people side of leadership is currently getting \
                  less of you than direction or delivery. That can happen for good reasons, \
                  such as a demanding quarter or a team that seems to run itself, but over \
                  time it shows up as slower escalation, quieter meetings and fewer candid \
                  conversations reaching you. The team may be working hard while losing some \
                  of the trust and context that let them act without waiting for you.\n\n\
                  Start with attention rather than programmes. Set aside regular, protected \
                  time with your direct reports that is about them rather than status, and ask \
                  what is getting in their way. Look at how decisions are explained once they \
                  are made, since people commit more readily when they understand the \
                  reasoning. Small, consistent signals of interest tend to matter more than a \
                  single offsite, and they give you earlier warning when something important \
                  is about to go wrong in the parts of the business you cannot see directly.",
        action_items: &[
            "Protect regular one-to-one time with each direct report",
            "Explain the reasoning behind key decisions once they are made",
            "Ask each report what is currently getting in their way",
        ],
        watchouts: &["Quiet meetings can mean problems are reaching you too late"],
        if_unchanged: "The team keeps working hard, but candid conversations and early warnings \
                       reach you less often.",
        if_addressed: "Consistent attention rebuilds trust, and problems surface while they are \
                       still easy to fix.",
    },
    FallbackTemplate {
        id: "fallback-general-v1",
        when: Predicate::Always,
        headline: "A useful starting picture of how you lead today",
        insight: "Your answers give a useful starting picture of how you lead today, across \
                  setting direction, getting things done, building your team and sustaining \
                  your own energy. No single pattern dominates, which suggests the next step \
                  is less about fixing one problem and more about choosing where focused \
                  effort would pay back most in the coming months. Self-assessment is a \
                  snapshot, so treat this as a prompt for reflection rather than a verdict on \
                  your leadership.\n\n\
                  A good way to use it is to compare your answers with what the people around \
                  you would say. Ask two or three trusted colleagues which area they would \
                  most like to see you invest in, and notice where their view differs from \
                  yours. Then pick one concrete change you can sustain for a month, track \
                  whether it shifts how your week feels, and return to the assessment \
                  afterwards to see what has moved and what deserves your attention next.",
        action_items: &[
            "Ask two or three trusted colleagues where they would like you to invest",
            "Choose one concrete change you can sustain for a month",
            "Retake the assessment afterwards to see what has moved",
        ],
        watchouts: &["Self-assessment is a snapshot, so test it against how others see you"],
        if_unchanged: "Your leadership stays broadly as it is, with no clear focus for the effort \
                       you invest.",
        if_addressed: "A single sustained change gives you a concrete signal of where further \
                       effort pays back.",
    },
];

pub const CONTEXT_NOTES: &[ContextNote] = &[
    ContextNote {
        id: "note-new-role",
        when: Predicate::Below(Field::TenureYears, 1),
        text: "New in role: give yourself time before reading too much into the pattern",
    },
    ContextNote {
        id: "note-founder",
        when: Predicate::RoleIs(Role::Founder),
        text: "As a founder, check which decisions still need to come to you",
    },
    ContextNote {
        id: "note-resilience-low",
        when: Predicate::Below(Field::Score(Pillar::Resilience), 50),
        text: "Low energy reserves make every other area harder to sustain",
    },
];

/// The chosen fallback, ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSelection {
    pub template_id: &'static str,
    pub assessment: SituationAssessment,
}

impl FallbackTemplate {
    fn render(&self, notes: &[&ContextNote]) -> SituationAssessment {
        let mut watchouts: Vec<String> = self.watchouts.iter().map(|w| w.to_string()).collect();
        for note in notes {
            if watchouts.len() >= MAX_WATCHOUTS {
                break;
            }
            watchouts.push(note.text.to_string());
        }

        SituationAssessment {
            headline: Some(self.headline.to_string()),
            insight: Some(self.insight.to_string()),
            action_items: Some(self.action_items.iter().map(|a| a.to_string()).collect()),
            watchouts: Some(watchouts),
            scenarios: Some(Scenarios {
                if_unchanged: self.if_unchanged.to_string(),
                if_addressed: self.if_addressed.to_string(),
            }),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
        }
    }
}

/// Pick the fallback narrative for a context. Same context, same result.
pub fn select_fallback(context: &GenerationContext) -> FallbackSelection {
    let facts = ContextFacts::from_context(context);
    let template = FALLBACK_TEMPLATES
        .iter()
        .find(|t| t.when.evaluate(&facts))
        .unwrap_or(&FALLBACK_TEMPLATES[FALLBACK_TEMPLATES.len() - 1]);
    let notes: Vec<&ContextNote> = CONTEXT_NOTES
        .iter()
        .filter(|n| n.when.evaluate(&facts))
        .collect();

    tracing::debug!(
        template = template.id,
        notes = notes.len(),
        "Selected fallback template"
    );

    FallbackSelection {
        template_id: template.id,
        assessment: template.render(&notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileSignals;
    use crate::pipeline::safety::{
        count_paragraphs, sanitize_structured, validate_assessment, violates_policy,
        ITEM_MAX_CHARS,
    };

    fn context(v: u8, e: u8, p: u8, r: u8) -> GenerationContext {
        GenerationContext {
            assessment_id: "a-1".into(),
            scores: PillarScores {
                vision: v,
                execution: e,
                people: p,
                resilience: r,
            },
            profile: ProfileSignals::default(),
        }
    }

    // =================================================================
    // VETTING
    // =================================================================

    #[test]
    fn every_template_passes_policy_and_structure() {
        for template in FALLBACK_TEMPLATES {
            let rendered = template.render(&[]);
            let report = validate_assessment(&rendered);
            assert!(report.violations.is_empty(), "{}: {report:?}", template.id);
            assert!(report.structural.is_empty(), "{}: {report:?}", template.id);
            assert_eq!(count_paragraphs(template.insight), 2, "{}", template.id);
        }
    }

    #[test]
    fn every_template_survives_sanitization_unchanged() {
        for template in FALLBACK_TEMPLATES {
            let rendered = template.render(&[]);
            assert_eq!(sanitize_structured(&rendered), rendered, "{}", template.id);
        }
    }

    #[test]
    fn every_context_note_is_clean_and_short() {
        for note in CONTEXT_NOTES {
            assert!(!violates_policy(note.text), "{}", note.id);
            assert!(note.text.chars().count() <= ITEM_MAX_CHARS, "{}", note.id);
        }
    }

    #[test]
    fn template_ids_are_unique() {
        let mut ids: Vec<&str> = FALLBACK_TEMPLATES.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), FALLBACK_TEMPLATES.len());
    }

    // =================================================================
    // SELECTION
    // =================================================================

    #[test]
    fn high_floor_selects_steady() {
        assert_eq!(select_fallback(&context(80, 75, 90, 70)).template_id, "fallback-steady-v1");
    }

    #[test]
    fn wide_spread_selects_uneven() {
        assert_eq!(select_fallback(&context(90, 85, 40, 70)).template_id, "fallback-uneven-v1");
    }

    #[test]
    fn low_people_without_wide_spread_selects_people() {
        assert_eq!(select_fallback(&context(70, 65, 50, 60)).template_id, "fallback-people-v1");
    }

    #[test]
    fn everything_else_selects_general() {
        assert_eq!(select_fallback(&context(60, 55, 65, 58)).template_id, "fallback-general-v1");
    }

    #[test]
    fn selection_is_deterministic() {
        let ctx = context(44, 71, 52, 63);
        assert_eq!(select_fallback(&ctx), select_fallback(&ctx));
    }

    #[test]
    fn context_notes_fill_remaining_watchouts() {
        let mut ctx = context(60, 55, 65, 45);
        ctx.profile = ProfileSignals {
            role: Some(Role::Founder),
            tenure_years: Some(0),
        };
        let selection = select_fallback(&ctx);
        let watchouts = selection.assessment.watchouts.unwrap();
        assert_eq!(watchouts.len(), MAX_WATCHOUTS);
        assert!(watchouts[1].starts_with("New in role"));
    }

    #[test]
    fn absent_tenure_never_matches_tenure_predicates() {
        let facts = ContextFacts::from_context(&context(50, 50, 50, 50));
        assert!(!Predicate::Below(Field::TenureYears, 1).evaluate(&facts));
        assert!(!Predicate::AtLeast(Field::TenureYears, 0).evaluate(&facts));
    }

    #[test]
    fn composite_predicates() {
        let facts = ContextFacts::from_context(&context(90, 20, 50, 60));
        assert!(Predicate::Any(&[Predicate::RoleIs(Role::Manager), Predicate::AtLeast(Field::ScoreSpread, 70)])
            .evaluate(&facts));
        assert!(Predicate::Not(&Predicate::LowestPillarIs(Pillar::People)).evaluate(&facts));
        assert!(Predicate::All(&[
            Predicate::LowestPillarIs(Pillar::Execution),
            Predicate::AtLeast(Field::HighestScore, 90),
        ])
        .evaluate(&facts));
    }
}
