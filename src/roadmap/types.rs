use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::curriculum::{Curriculum, Difficulty, QuestionType, SlotId, TemplateId};

pub const MAX_EVALUATION_HISTORY: usize = 10;

pub type TaskInstanceId = String;
pub type PhaseId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadmapStatus {
    Active,
    Completed,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Locked,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseLockReason {
    AwaitingPrerequisites { message: String },
    DependencyFailed { slot_id: SlotId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Locked,
    Available,
    InProgress,
    Completed,
    Failed,
    RemediationRequired,
}

impl SlotStatus {
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            SlotStatus::Available | SlotStatus::InProgress | SlotStatus::RemediationRequired
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Failed)
    }

    pub fn is_startable(&self) -> bool {
        matches!(self, SlotStatus::Available | SlotStatus::RemediationRequired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotLockReason {
    DependencyFailed { slot_id: SlotId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotFlag {
    ScoreDriftDetected,
    LowConfidenceEvaluation,
    DoublePassUsed,
}

impl SlotFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotFlag::ScoreDriftDetected => "score_drift_detected",
            SlotFlag::LowConfidenceEvaluation => "low_confidence_evaluation",
            SlotFlag::DoublePassUsed => "double_pass_used",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    pub submission_id: String,
    pub score: f64,
    pub confidence: f64,
    pub is_partial_credit: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemediationProgress {
    #[serde(default)]
    pub remediation_attempts: u32,
    #[serde(default)]
    pub current_remediation_step: usize,
    #[serde(default)]
    pub in_remediation: bool,
}

impl RemediationProgress {
    pub fn is_reattempt(&self) -> bool {
        self.remediation_attempts > 0
    }

    /// True once the slot has been on a remediation track, even after a
    /// reinstatement reset its cursor.
    pub fn was_remediated(&self) -> bool {
        self.in_remediation || self.remediation_attempts > 0
    }

    pub fn resolve(&mut self) {
        self.current_remediation_step = 0;
        self.in_remediation = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSlot {
    pub slot_id: SlotId,
    pub skill: String,
    pub difficulty: Difficulty,
    pub status: SlotStatus,
    #[serde(default)]
    pub active_task_instance_id: Option<TaskInstanceId>,
    #[serde(default)]
    pub locked_reason: Option<SlotLockReason>,
    #[serde(flatten)]
    pub remediation: RemediationProgress,
    #[serde(default)]
    pub evaluation_history: VecDeque<EvaluationSnapshot>,
    #[serde(default)]
    pub flags: BTreeSet<SlotFlag>,
    #[serde(default)]
    pub user_message: Option<String>,
}

impl TaskSlot {
    pub fn new(slot_id: impl Into<SlotId>, skill: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            slot_id: slot_id.into(),
            skill: skill.into(),
            difficulty,
            status: SlotStatus::Locked,
            active_task_instance_id: None,
            locked_reason: None,
            remediation: RemediationProgress::default(),
            evaluation_history: VecDeque::new(),
            flags: BTreeSet::new(),
            user_message: None,
        }
    }

    pub fn with_status(mut self, status: SlotStatus) -> Self {
        self.status = status;
        self
    }

    pub fn push_snapshot(&mut self, snapshot: EvaluationSnapshot) {
        self.evaluation_history.push_back(snapshot);
        while self.evaluation_history.len() > MAX_EVALUATION_HISTORY {
            self.evaluation_history.pop_front();
        }
    }

    pub fn history_scores(&self) -> Vec<f64> {
        self.evaluation_history
            .iter()
            .map(|snapshot| snapshot.score)
            .collect()
    }

    pub fn has_flag(&self, flag: SlotFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn unlock(&mut self) {
        self.status = SlotStatus::Available;
        self.locked_reason = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase_id: PhaseId,
    #[serde(default)]
    pub name: String,
    pub phase_status: PhaseStatus,
    #[serde(default)]
    pub locked_reason: Option<PhaseLockReason>,
    pub slots: Vec<TaskSlot>,
}

impl PhaseState {
    pub fn has_actionable_slot(&self) -> bool {
        self.slots.iter().any(|slot| slot.status.is_actionable())
    }

    pub fn slot_index(&self, slot_id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.slot_id == slot_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskInstanceStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub task_instance_id: TaskInstanceId,
    pub skill: String,
    pub slot_id: SlotId,
    pub base_template_id: TemplateId,
    pub task_template_id: TemplateId,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub status: TaskInstanceStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapState {
    pub user_id: String,
    pub goal: String,
    pub version: u64,
    pub status: RoadmapStatus,
    pub is_active: bool,
    pub current_phase: PhaseId,
    pub phases: Vec<PhaseState>,
    #[serde(default)]
    pub task_instances: Vec<TaskInstance>,
    #[serde(default)]
    pub locked_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_evaluated_at: OffsetDateTime,
}

impl RoadmapState {
    pub fn from_curriculum(
        user_id: impl Into<String>,
        goal: impl Into<String>,
        curriculum: &Curriculum,
        now: OffsetDateTime,
    ) -> Self {
        let phases: Vec<PhaseState> = curriculum
            .phases
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                let mut slots: Vec<TaskSlot> = definition
                    .slots
                    .iter()
                    .map(|slot| TaskSlot::new(&slot.slot_id, &slot.skill, slot.difficulty))
                    .collect();
                if index == 0 {
                    if let Some(first) = slots.first_mut() {
                        first.unlock();
                    }
                }
                PhaseState {
                    phase_id: definition.phase_id.clone(),
                    name: definition.name.clone(),
                    phase_status: if index == 0 {
                        PhaseStatus::Active
                    } else {
                        PhaseStatus::Locked
                    },
                    locked_reason: (index > 0).then(|| PhaseLockReason::AwaitingPrerequisites {
                        message: format!(
                            "complete all slots in phase '{}'",
                            curriculum.phases[index - 1].name
                        ),
                    }),
                    slots,
                }
            })
            .collect();

        Self {
            user_id: user_id.into(),
            goal: goal.into(),
            version: 1,
            status: RoadmapStatus::Active,
            is_active: true,
            current_phase: phases
                .first()
                .map(|phase| phase.phase_id.clone())
                .unwrap_or_default(),
            phases,
            task_instances: Vec::new(),
            locked_reason: None,
            generated_at: now,
            last_evaluated_at: now,
        }
    }

    pub fn slot_location(&self, slot_id: &str) -> Option<(usize, usize)> {
        self.phases
            .iter()
            .enumerate()
            .find_map(|(phase_index, phase)| {
                phase
                    .slot_index(slot_id)
                    .map(|slot_index| (phase_index, slot_index))
            })
    }

    pub fn slot(&self, slot_id: &str) -> Option<&TaskSlot> {
        let (phase_index, slot_index) = self.slot_location(slot_id)?;
        Some(&self.phases[phase_index].slots[slot_index])
    }

    pub fn slot_mut(&mut self, slot_id: &str) -> Option<&mut TaskSlot> {
        let (phase_index, slot_index) = self.slot_location(slot_id)?;
        Some(&mut self.phases[phase_index].slots[slot_index])
    }

    pub fn slots(&self) -> impl Iterator<Item = &TaskSlot> {
        self.phases.iter().flat_map(|phase| phase.slots.iter())
    }

    pub fn active_phase_index(&self) -> Option<usize> {
        self.phases
            .iter()
            .position(|phase| phase.phase_status == PhaseStatus::Active)
    }

    pub fn in_progress_slot(&self) -> Option<&TaskSlot> {
        self.slots()
            .find(|slot| slot.status == SlotStatus::InProgress)
    }

    pub fn task_instance(&self, task_instance_id: &str) -> Option<&TaskInstance> {
        self.task_instances
            .iter()
            .find(|instance| instance.task_instance_id == task_instance_id)
    }

    pub fn task_instance_mut(&mut self, task_instance_id: &str) -> Option<&mut TaskInstance> {
        self.task_instances
            .iter_mut()
            .find(|instance| instance.task_instance_id == task_instance_id)
    }
}
