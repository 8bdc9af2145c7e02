use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    curriculum::{SlotId, TaskTemplate},
    error::{EngineError, business_conflict, internal_error, invalid_request},
    roadmap::types::{
        PhaseId, PhaseLockReason, PhaseStatus, RoadmapState, RoadmapStatus, SlotStatus,
        TaskInstance, TaskInstanceStatus,
    },
};

pub const PASS_MESSAGE: &str = "Completed successfully.";
pub const FORCED_REMEDIATION_MESSAGE: &str =
    "Remediation assigned. Review the material and try again.";
pub const REINSTATED_MESSAGE: &str = "Reinstated by administrator. Try this task again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseTransition {
    SlotOpened { slot_id: SlotId },
    PhaseCompleted { phase_id: PhaseId },
    PhaseActivated { phase_id: PhaseId },
    RoadmapCompleted,
}

pub struct RoadmapTransitions;

impl RoadmapTransitions {
    pub fn start_slot(
        roadmap: &mut RoadmapState,
        slot_id: &str,
        template: &TaskTemplate,
        now: OffsetDateTime,
    ) -> Result<TaskInstance, EngineError> {
        if roadmap.status != RoadmapStatus::Active {
            return Err(invalid_request(format!(
                "roadmap for '{}' is {:?}; slots cannot be started",
                roadmap.user_id, roadmap.status
            )));
        }
        if let Some(busy) = roadmap.in_progress_slot() {
            return Err(business_conflict(format!(
                "slot '{}' is already in progress",
                busy.slot_id
            )));
        }

        let phase_index = Self::active_phase_of(roadmap, slot_id)?;
        let slot_index = roadmap.phases[phase_index]
            .slot_index(slot_id)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
        let slot = &mut roadmap.phases[phase_index].slots[slot_index];
        if !slot.status.is_startable() {
            return Err(invalid_request(format!(
                "slot '{}' cannot be started from {:?}",
                slot_id, slot.status
            )));
        }

        let instance = TaskInstance {
            task_instance_id: Uuid::now_v7().to_string(),
            skill: slot.skill.clone(),
            slot_id: slot.slot_id.clone(),
            base_template_id: template.canonical_base_id().to_string(),
            task_template_id: template.task_template_id.clone(),
            difficulty: slot.difficulty,
            question_type: template.question_type,
            status: TaskInstanceStatus::InProgress,
            started_at: now,
            completed_at: None,
        };

        slot.status = SlotStatus::InProgress;
        slot.active_task_instance_id = Some(instance.task_instance_id.clone());
        slot.user_message = None;
        roadmap.task_instances.push(instance.clone());

        info!(
            target: "roadmap",
            user_id = %roadmap.user_id,
            slot_id = slot_id,
            task_instance_id = %instance.task_instance_id,
            task_template_id = %instance.task_template_id,
            "slot_started"
        );
        Ok(instance)
    }

    pub fn finish_active_task(
        roadmap: &mut RoadmapState,
        slot_id: &str,
        succeeded: bool,
        now: OffsetDateTime,
    ) -> Result<TaskInstance, EngineError> {
        let slot = roadmap
            .slot_mut(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        if slot.status != SlotStatus::InProgress {
            return Err(invalid_request(format!(
                "slot '{}' is {:?}, not in progress",
                slot_id, slot.status
            )));
        }
        let instance_id = slot.active_task_instance_id.take().ok_or_else(|| {
            internal_error(format!("slot '{}' in progress without task instance", slot_id))
        })?;

        let instance = roadmap.task_instance_mut(&instance_id).ok_or_else(|| {
            internal_error(format!(
                "slot '{}' references unknown task instance '{}'",
                slot_id, instance_id
            ))
        })?;
        instance.status = if succeeded {
            TaskInstanceStatus::Completed
        } else {
            TaskInstanceStatus::Failed
        };
        instance.completed_at = Some(now);
        let instance = instance.clone();
        roadmap.last_evaluated_at = now.max(roadmap.generated_at);
        Ok(instance)
    }

    pub fn record_pass(
        roadmap: &mut RoadmapState,
        slot_id: &str,
        unlocks: &[SlotId],
    ) -> Result<Vec<SlotId>, EngineError> {
        let (phase_index, slot_index) = roadmap
            .slot_location(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        {
            let slot = &mut roadmap.phases[phase_index].slots[slot_index];
            slot.status = SlotStatus::Completed;
            slot.remediation.resolve();
            slot.user_message = Some(PASS_MESSAGE.to_string());
        }

        let phase_open = roadmap.phases[phase_index].phase_status == PhaseStatus::Active;
        let mut opened = Vec::new();
        if !phase_open {
            return Ok(opened);
        }

        let phase = &mut roadmap.phases[phase_index];
        if unlocks.is_empty() {
            if let Some(next) = phase.slots.get_mut(slot_index + 1) {
                if next.status == SlotStatus::Locked && next.locked_reason.is_none() {
                    next.unlock();
                    opened.push(next.slot_id.clone());
                }
            }
        } else {
            for slot in &mut phase.slots {
                if unlocks.contains(&slot.slot_id)
                    && slot.status == SlotStatus::Locked
                    && slot.locked_reason.is_none()
                {
                    slot.unlock();
                    opened.push(slot.slot_id.clone());
                }
            }
        }
        Ok(opened)
    }

    pub fn complete_directly(
        roadmap: &mut RoadmapState,
        slot_id: &str,
        success: bool,
        unlocks: &[SlotId],
        now: OffsetDateTime,
    ) -> Result<(TaskInstance, Vec<PhaseTransition>), EngineError> {
        let instance = Self::finish_active_task(roadmap, slot_id, success, now)?;
        if success {
            Self::record_pass(roadmap, slot_id, unlocks)?;
        } else {
            let slot = roadmap
                .slot_mut(slot_id)
                .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
            slot.status = SlotStatus::Failed;
            slot.remediation.in_remediation = false;
        }
        let transitions = Self::resolve_active_phase(roadmap);
        Ok((instance, transitions))
    }

    pub fn force_remediation(
        roadmap: &mut RoadmapState,
        slot_id: &str,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        if roadmap.status != RoadmapStatus::Active {
            return Err(invalid_request(format!(
                "roadmap for '{}' is {:?}; remediation cannot be assigned",
                roadmap.user_id, roadmap.status
            )));
        }
        let phase_index = Self::active_phase_of(roadmap, slot_id)?;
        let slot_index = roadmap.phases[phase_index]
            .slot_index(slot_id)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;

        let status = roadmap.phases[phase_index].slots[slot_index].status;
        match status {
            SlotStatus::Locked => {
                return Err(invalid_request(format!(
                    "slot '{}' is locked and cannot enter remediation",
                    slot_id
                )));
            }
            SlotStatus::InProgress => {
                Self::finish_active_task(roadmap, slot_id, false, now)?;
            }
            _ => {}
        }

        let slot = &mut roadmap.phases[phase_index].slots[slot_index];
        slot.status = SlotStatus::RemediationRequired;
        slot.remediation.in_remediation = true;
        slot.user_message = Some(FORCED_REMEDIATION_MESSAGE.to_string());
        info!(target: "roadmap", user_id = %roadmap.user_id, slot_id = slot_id, "remediation_forced");
        Ok(())
    }

    pub fn resolve_active_phase(roadmap: &mut RoadmapState) -> Vec<PhaseTransition> {
        let mut transitions = Vec::new();
        if roadmap.status != RoadmapStatus::Active {
            return transitions;
        }

        while let Some(phase_index) = roadmap.active_phase_index() {
            let phase = &mut roadmap.phases[phase_index];
            if phase.has_actionable_slot() {
                break;
            }

            if let Some(slot) = phase
                .slots
                .iter_mut()
                .find(|slot| slot.status == SlotStatus::Locked)
            {
                slot.unlock();
                transitions.push(PhaseTransition::SlotOpened {
                    slot_id: slot.slot_id.clone(),
                });
                break;
            }

            phase.phase_status = PhaseStatus::Completed;
            phase.locked_reason = None;
            transitions.push(PhaseTransition::PhaseCompleted {
                phase_id: phase.phase_id.clone(),
            });

            let next_index = roadmap
                .phases
                .iter()
                .enumerate()
                .skip(phase_index + 1)
                .find(|(_, phase)| phase.phase_status == PhaseStatus::Locked)
                .map(|(index, _)| index);

            match next_index {
                Some(next_index) => {
                    let next = &mut roadmap.phases[next_index];
                    next.phase_status = PhaseStatus::Active;
                    next.locked_reason = None;
                    roadmap.current_phase = next.phase_id.clone();
                    transitions.push(PhaseTransition::PhaseActivated {
                        phase_id: next.phase_id.clone(),
                    });
                    // the loop opens its first slot on the next pass
                }
                None => {
                    roadmap.status = RoadmapStatus::Completed;
                    roadmap.is_active = false;
                    transitions.push(PhaseTransition::RoadmapCompleted);
                    break;
                }
            }
        }

        for transition in &transitions {
            info!(
                target: "roadmap",
                user_id = %roadmap.user_id,
                transition = ?transition,
                "phase_transition"
            );
        }
        transitions
    }

    pub fn reinstate(roadmap: &mut RoadmapState) -> Result<SlotId, EngineError> {
        if roadmap.status != RoadmapStatus::Locked {
            return Err(invalid_request(format!(
                "roadmap for '{}' is {:?}, not locked",
                roadmap.user_id, roadmap.status
            )));
        }

        let (phase_index, failed_slot_id) = roadmap
            .phases
            .iter()
            .enumerate()
            .find_map(|(index, phase)| match &phase.locked_reason {
                Some(PhaseLockReason::DependencyFailed { slot_id })
                    if phase.phase_status == PhaseStatus::Locked =>
                {
                    Some((index, slot_id.clone()))
                }
                _ => None,
            })
            .ok_or_else(|| {
                invalid_request(format!(
                    "roadmap for '{}' has no halted phase to reinstate",
                    roadmap.user_id
                ))
            })?;

        let phase = &mut roadmap.phases[phase_index];
        let slot = phase
            .slots
            .iter_mut()
            .find(|slot| slot.slot_id == failed_slot_id)
            .ok_or_else(|| {
                internal_error(format!(
                    "halted phase '{}' does not hold failed slot '{}'",
                    phase.phase_id, failed_slot_id
                ))
            })?;
        slot.unlock();
        slot.remediation.resolve();
        slot.flags.clear();
        slot.user_message = Some(REINSTATED_MESSAGE.to_string());

        phase.phase_status = PhaseStatus::Active;
        phase.locked_reason = None;
        roadmap.current_phase = phase.phase_id.clone();
        roadmap.status = RoadmapStatus::Active;
        roadmap.is_active = true;
        roadmap.locked_reason = None;

        info!(
            target: "roadmap",
            user_id = %roadmap.user_id,
            slot_id = %failed_slot_id,
            "roadmap_reinstated"
        );
        Ok(failed_slot_id)
    }

    fn active_phase_of(roadmap: &RoadmapState, slot_id: &str) -> Result<usize, EngineError> {
        let (phase_index, _) = roadmap
            .slot_location(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        let phase = &roadmap.phases[phase_index];
        if phase.phase_status != PhaseStatus::Active {
            return Err(invalid_request(format!(
                "slot '{}' belongs to phase '{}' which is {:?}",
                slot_id, phase.phase_id, phase.phase_status
            )));
        }
        Ok(phase_index)
    }
}
