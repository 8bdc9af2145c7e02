use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub type SlotId = String;
pub type TemplateId = String;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    Coding,
    Explanation,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::Coding => "coding",
            QuestionType::Explanation => "explanation",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_pass_score() -> f64 {
    0.6
}

fn default_max_attempts() -> u32 {
    3
}

pub fn default_remediation_strategies() -> Vec<String> {
    vec![
        "explanation".to_string(),
        "guided_practice".to_string(),
        "retry_same".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MasteryPolicy {
    #[serde(default = "default_pass_score")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub pass_score: f64,
}

impl Default for MasteryPolicy {
    fn default() -> Self {
        Self {
            pass_score: default_pass_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RemediationPolicy {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    #[serde(default = "default_remediation_strategies")]
    pub strategies: Vec<String>,
}

impl RemediationPolicy {
    pub fn step_limit(&self) -> usize {
        if self.strategies.is_empty() {
            self.max_attempts as usize
        } else {
            self.strategies.len()
        }
    }

    pub fn strategy_at(&self, step: usize) -> Option<&str> {
        self.strategies.get(step).map(String::as_str)
    }
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategies: default_remediation_strategies(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SlotDefinition {
    #[serde(alias = "id")]
    #[validate(length(min = 1))]
    pub slot_id: SlotId,
    pub skill: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    #[validate(nested)]
    pub mastery: MasteryPolicy,
    #[serde(default)]
    #[validate(nested)]
    pub remediation: RemediationPolicy,
    #[serde(default)]
    pub unlocks: Vec<SlotId>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PhaseDefinition {
    pub phase_id: String,
    pub name: String,
    #[serde(default)]
    pub objective: Option<String>,
    #[validate(nested)]
    pub slots: Vec<SlotDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariant {
    #[default]
    Standard,
    Remediation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    #[serde(alias = "id")]
    pub task_template_id: TemplateId,
    #[serde(default, alias = "base_id")]
    pub base_template_id: Option<TemplateId>,
    pub slot_id: SlotId,
    pub skill: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(alias = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub variant: TemplateVariant,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub prompt: String,
}

impl TaskTemplate {
    pub fn canonical_base_id(&self) -> &str {
        self.base_template_id
            .as_deref()
            .unwrap_or(&self.task_template_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Curriculum {
    pub track_id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub phases: Vec<PhaseDefinition>,
    #[serde(default)]
    pub templates: Vec<TaskTemplate>,
}

impl Curriculum {
    pub fn slot_definition(&self, slot_id: &str) -> Option<&SlotDefinition> {
        self.phases
            .iter()
            .flat_map(|phase| phase.slots.iter())
            .find(|slot| slot.slot_id == slot_id)
    }

    pub fn templates_for_slot(&self, slot_id: &str) -> Vec<TaskTemplate> {
        self.templates
            .iter()
            .filter(|template| template.slot_id == slot_id)
            .cloned()
            .collect()
    }

    pub fn template(&self, template_id: &str) -> Option<&TaskTemplate> {
        self.templates
            .iter()
            .find(|template| template.task_template_id == template_id)
    }
}
