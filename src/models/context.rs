use serde::{Deserialize, Serialize};

use super::enums::{Pillar, Role};

/// Pillar scores produced by the (external) scoring step, 0–100 each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarScores {
    pub vision: u8,
    pub execution: u8,
    pub people: u8,
    pub resilience: u8,
}

impl PillarScores {
    pub const MAX_SCORE: u8 = 100;

    pub fn get(&self, pillar: Pillar) -> u8 {
        match pillar {
            Pillar::Vision => self.vision,
            Pillar::Execution => self.execution,
            Pillar::People => self.people,
            Pillar::Resilience => self.resilience,
        }
    }

    /// Lowest-scoring pillar. Ties resolve in `Pillar::ALL` order.
    pub fn lowest(&self) -> (Pillar, u8) {
        Pillar::ALL
            .iter()
            .map(|p| (*p, self.get(*p)))
            .fold((Pillar::Vision, u8::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
    }

    pub fn highest(&self) -> (Pillar, u8) {
        Pillar::ALL
            .iter()
            .map(|p| (*p, self.get(*p)))
            .fold((Pillar::Vision, 0), |best, cur| if cur.1 > best.1 { cur } else { best })
    }

    pub fn spread(&self) -> u8 {
        self.highest().1 - self.lowest().1
    }

    /// First pillar whose score is above `MAX_SCORE`, if any.
    pub fn out_of_range(&self) -> Option<Pillar> {
        Pillar::ALL
            .into_iter()
            .find(|p| self.get(*p) > Self::MAX_SCORE)
    }
}

/// Optional profile signals captured alongside the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure_years: Option<u8>,
}

/// Everything a generation run knows about the assessment it narrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub assessment_id: String,
    pub scores: PillarScores,
    #[serde(default)]
    pub profile: ProfileSignals,
}
