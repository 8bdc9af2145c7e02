use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    curriculum::{Difficulty, QuestionType},
    roadmap::SlotFlag,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AIEvaluationResult {
    pub passed: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub score: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub partial_credit: f64,
    pub feedback: String,
    pub detected_concepts: Vec<String>,
    pub mistakes: Vec<String>,
    pub model_name: String,
    pub model_version: String,
    pub prompt_version: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,
}

impl AIEvaluationResult {
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.model_name, self.prompt_version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub task_instance_id: String,
    pub skill: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub question_type: QuestionType,
    pub context: EvaluationContext,
    #[serde(default)]
    pub prompt: Option<String>,
    pub submission: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub payload: Value,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub time_spent_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityPenalty {
    HintUsed { factor: f64 },
    FastSubmission { score_factor: f64, confidence_factor: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub evaluation: AIEvaluationResult,
    pub double_pass_used: bool,
    pub pass_score: f64,
    pub raw_score: f64,
    pub stability_factor: f64,
    pub penalties: Vec<IntegrityPenalty>,
    pub near_miss: bool,
    pub flags: BTreeSet<SlotFlag>,
    pub notice: Option<String>,
}
