use serde::Serialize;

use crate::{
    curriculum::{Difficulty, QuestionType, SlotId},
    evaluation::EvaluationOutcome,
    roadmap::{PhaseTransition, RemediationPlan, RoadmapStatus, SlotStatus, TaskInstanceId},
    skills::SkillUpdate,
    telemetry::DecisionOutcome,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartSlotResult {
    pub slot_id: SlotId,
    pub task_instance_id: TaskInstanceId,
    pub task_template_id: String,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub hint: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteSlotResult {
    pub slot_id: SlotId,
    pub task_instance_id: TaskInstanceId,
    pub success: bool,
    pub slot_status: SlotStatus,
    pub roadmap_status: RoadmapStatus,
    pub unlocked: Vec<SlotId>,
    pub phase_transitions: Vec<PhaseTransition>,
    pub skill_update: SkillUpdate,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitSlotResult {
    pub slot_id: SlotId,
    pub task_instance_id: TaskInstanceId,
    pub outcome: DecisionOutcome,
    pub evaluation: EvaluationOutcome,
    pub slot_status: SlotStatus,
    pub roadmap_status: RoadmapStatus,
    pub remediation: Option<RemediationPlan>,
    pub unlocked: Vec<SlotId>,
    pub phase_transitions: Vec<PhaseTransition>,
    pub skill_update: SkillUpdate,
    pub user_message: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediateSlotResult {
    pub slot_id: SlotId,
    pub slot_status: SlotStatus,
    pub user_message: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReinstateResult {
    pub slot_id: SlotId,
    pub current_phase: String,
    pub version: u64,
}
