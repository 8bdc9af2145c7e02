use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type SkillDeltas = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceSummary {
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub weighted_score: f64,
    #[serde(default)]
    pub last_event_id: Option<String>,
    #[serde(default)]
    pub last_prompt_version: Option<String>,
}

fn default_priors() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMix {
    #[serde(default = "default_priors")]
    pub priors: f64,
    #[serde(default)]
    pub tasks: f64,
    #[serde(default)]
    pub assessments: f64,
    #[serde(default)]
    pub projects: f64,
}

impl Default for SourceMix {
    fn default() -> Self {
        Self {
            priors: default_priors(),
            tasks: 0.0,
            assessments: 0.0,
            projects: 0.0,
        }
    }
}

impl SourceMix {
    pub fn tasks_only() -> Self {
        Self {
            priors: 0.0,
            tasks: 1.0,
            assessments: 0.0,
            projects: 0.0,
        }
    }

    pub fn shift_toward_tasks(&mut self, alpha: f64) {
        self.tasks = (1.0 - alpha) * self.tasks + alpha;
        self.priors *= 1.0 - alpha;
        self.assessments *= 1.0 - alpha;
        self.projects *= 1.0 - alpha;
    }
}

fn default_half_life_days() -> u32 {
    90
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    #[serde(default = "default_half_life_days")]
    pub half_life_days: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_decay_applied: Option<OffsetDateTime>,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            last_decay_applied: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkillEntry {
    #[serde(default)]
    pub level: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(default)]
    pub evidence_summary: EvidenceSummary,
    #[serde(default)]
    pub source_mix: SourceMix,
    #[serde(default)]
    pub decay: DecayPolicy,
}

impl SkillEntry {
    pub fn set_level(&mut self, level: f64) {
        self.level = level.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    pub user_id: String,
    #[serde(default)]
    pub skill_vector: BTreeMap<String, SkillEntry>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl LearningState {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            skill_vector: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn levels(&self) -> BTreeMap<String, f64> {
        self.skill_vector
            .iter()
            .map(|(skill, entry)| (skill.clone(), entry.level))
            .collect()
    }
}
