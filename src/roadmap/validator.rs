use std::{collections::BTreeSet, fmt};

use crate::roadmap::types::{
    MAX_EVALUATION_HISTORY, PhaseLockReason, PhaseStatus, RoadmapState, RoadmapStatus, SlotStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationCode {
    MissingUserId,
    MissingGoal,
    NoPhases,
    TimestampOrder,
    ActivePhaseCount,
    CurrentPhaseMismatch,
    DuplicatePhaseId,
    DuplicateSlotId,
    InProgressWithoutInstance,
    IllegalActiveInstance,
    UnknownActiveInstance,
    InstanceSlotMismatch,
    LockedPhaseWithoutReason,
    LockedPhaseOpenSlot,
    ActivePhaseNotActionable,
    MultipleInProgress,
    CompletedRoadmapActive,
    CompletedRoadmapActivePhase,
    InactiveRoadmapFlag,
    EvaluationHistoryOverflow,
    EvaluationOutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub code: ViolationCode,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.code == code)
    }

    pub fn codes(&self) -> BTreeSet<ViolationCode> {
        self.violations
            .iter()
            .map(|violation| violation.code)
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<&str> = self
            .violations
            .iter()
            .map(|violation| violation.detail.as_str())
            .collect();
        write!(f, "roadmap invariant violated: {}", details.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Default)]
struct Violations(Vec<Violation>);

impl Violations {
    fn push(&mut self, code: ViolationCode, detail: impl Into<String>) {
        self.0.push(Violation {
            code,
            detail: detail.into(),
        });
    }
}

/// Checks every structural invariant of a roadmap. Pure; every check runs so
/// the returned error lists all violations at once.
pub fn validate(roadmap: &RoadmapState) -> Result<(), ValidationError> {
    let mut violations = Violations::default();

    if roadmap.user_id.trim().is_empty() {
        violations.push(ViolationCode::MissingUserId, "missing user_id");
    }
    if roadmap.goal.trim().is_empty() {
        violations.push(ViolationCode::MissingGoal, "missing goal");
    }
    if roadmap.phases.is_empty() {
        violations.push(ViolationCode::NoPhases, "no phases defined");
    }
    if roadmap.last_evaluated_at < roadmap.generated_at {
        violations.push(
            ViolationCode::TimestampOrder,
            format!(
                "last_evaluated_at {} precedes generated_at {}",
                roadmap.last_evaluated_at, roadmap.generated_at
            ),
        );
    }

    check_phase_activity(roadmap, &mut violations);
    check_slots(roadmap, &mut violations);
    check_phase_slot_consistency(roadmap, &mut violations);
    check_roadmap_status(roadmap, &mut violations);

    if violations.0.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            violations: violations.0,
        })
    }
}

fn check_phase_activity(roadmap: &RoadmapState, violations: &mut Violations) {
    let active: Vec<&str> = roadmap
        .phases
        .iter()
        .filter(|phase| phase.phase_status == PhaseStatus::Active)
        .map(|phase| phase.phase_id.as_str())
        .collect();

    match roadmap.status {
        RoadmapStatus::Active => {
            if active.len() != 1 {
                violations.push(
                    ViolationCode::ActivePhaseCount,
                    format!(
                        "exactly one active phase required, found {}",
                        active.len()
                    ),
                );
            } else if active[0] != roadmap.current_phase {
                violations.push(
                    ViolationCode::CurrentPhaseMismatch,
                    format!(
                        "current_phase '{}' does not match active phase '{}'",
                        roadmap.current_phase, active[0]
                    ),
                );
            }
        }
        RoadmapStatus::Completed | RoadmapStatus::Locked => {
            if !active.is_empty() {
                violations.push(
                    ViolationCode::ActivePhaseCount,
                    format!(
                        "{:?} roadmap contains {} active phase(s)",
                        roadmap.status,
                        active.len()
                    ),
                );
            }
        }
    }

    let mut phase_ids = BTreeSet::new();
    for phase in &roadmap.phases {
        if !phase_ids.insert(phase.phase_id.as_str()) {
            violations.push(
                ViolationCode::DuplicatePhaseId,
                format!("duplicate phase_id '{}'", phase.phase_id),
            );
        }
    }
}

fn check_slots(roadmap: &RoadmapState, violations: &mut Violations) {
    let mut slot_ids = BTreeSet::new();
    let mut in_progress = Vec::new();

    for phase in &roadmap.phases {
        for slot in &phase.slots {
            if !slot_ids.insert(slot.slot_id.as_str()) {
                violations.push(
                    ViolationCode::DuplicateSlotId,
                    format!("duplicate slot_id '{}'", slot.slot_id),
                );
            }

            match (slot.status, slot.active_task_instance_id.as_deref()) {
                (SlotStatus::InProgress, None) => violations.push(
                    ViolationCode::InProgressWithoutInstance,
                    format!(
                        "slot '{}' in_progress without active_task_instance_id",
                        slot.slot_id
                    ),
                ),
                (SlotStatus::InProgress, Some(instance_id)) => {
                    in_progress.push(slot.slot_id.as_str());
                    match roadmap.task_instance(instance_id) {
                        None => violations.push(
                            ViolationCode::UnknownActiveInstance,
                            format!(
                                "slot '{}' references unknown task instance '{}'",
                                slot.slot_id, instance_id
                            ),
                        ),
                        Some(instance) if instance.slot_id != slot.slot_id => violations.push(
                            ViolationCode::InstanceSlotMismatch,
                            format!(
                                "task instance '{}' belongs to slot '{}', not '{}'",
                                instance_id, instance.slot_id, slot.slot_id
                            ),
                        ),
                        Some(_) => {}
                    }
                }
                (_, Some(instance_id)) => violations.push(
                    ViolationCode::IllegalActiveInstance,
                    format!(
                        "slot '{}' is {:?} but holds active_task_instance_id '{}'",
                        slot.slot_id, slot.status, instance_id
                    ),
                ),
                (_, None) => {}
            }

            if slot.evaluation_history.len() > MAX_EVALUATION_HISTORY {
                violations.push(
                    ViolationCode::EvaluationHistoryOverflow,
                    format!(
                        "slot '{}' holds {} evaluation snapshots (max {})",
                        slot.slot_id,
                        slot.evaluation_history.len(),
                        MAX_EVALUATION_HISTORY
                    ),
                );
            }
            let out_of_bounds = slot.evaluation_history.iter().any(|snapshot| {
                !(0.0..=1.0).contains(&snapshot.score)
                    || !(0.0..=1.0).contains(&snapshot.confidence)
            });
            if out_of_bounds {
                violations.push(
                    ViolationCode::EvaluationOutOfBounds,
                    format!(
                        "slot '{}' has an evaluation snapshot outside [0, 1]",
                        slot.slot_id
                    ),
                );
            }
        }
    }

    if in_progress.len() > 1 {
        violations.push(
            ViolationCode::MultipleInProgress,
            format!(
                "multiple in_progress slots across roadmap: {}",
                in_progress.join(", ")
            ),
        );
    }
}

fn check_phase_slot_consistency(roadmap: &RoadmapState, violations: &mut Violations) {
    for phase in &roadmap.phases {
        match phase.phase_status {
            PhaseStatus::Locked => match phase.locked_reason.as_ref() {
                None => violations.push(
                    ViolationCode::LockedPhaseWithoutReason,
                    format!("phase '{}' locked without locked_reason", phase.phase_id),
                ),
                Some(PhaseLockReason::AwaitingPrerequisites { .. }) => {
                    if phase
                        .slots
                        .iter()
                        .any(|slot| slot.status != SlotStatus::Locked)
                    {
                        violations.push(
                            ViolationCode::LockedPhaseOpenSlot,
                            format!("locked phase '{}' contains a non-locked slot", phase.phase_id),
                        );
                    }
                }
                Some(PhaseLockReason::DependencyFailed { .. }) => {
                    if phase.has_actionable_slot() {
                        violations.push(
                            ViolationCode::LockedPhaseOpenSlot,
                            format!(
                                "halted phase '{}' still contains an actionable slot",
                                phase.phase_id
                            ),
                        );
                    }
                }
            },
            PhaseStatus::Active => {
                if !phase.has_actionable_slot() {
                    violations.push(
                        ViolationCode::ActivePhaseNotActionable,
                        format!("active phase '{}' has no actionable slot", phase.phase_id),
                    );
                }
            }
            PhaseStatus::Completed => {}
        }
    }
}

fn check_roadmap_status(roadmap: &RoadmapState, violations: &mut Violations) {
    match roadmap.status {
        RoadmapStatus::Completed => {
            if roadmap.is_active {
                violations.push(
                    ViolationCode::CompletedRoadmapActive,
                    "completed roadmap cannot be active",
                );
            }
            if roadmap
                .phases
                .iter()
                .any(|phase| phase.phase_status == PhaseStatus::Active)
            {
                violations.push(
                    ViolationCode::CompletedRoadmapActivePhase,
                    "completed roadmap contains an active phase",
                );
            }
        }
        RoadmapStatus::Active => {
            if !roadmap.is_active {
                violations.push(
                    ViolationCode::InactiveRoadmapFlag,
                    "active roadmap must carry is_active = true",
                );
            }
        }
        RoadmapStatus::Locked => {}
    }
}
