use serde::Serialize;
use tracing::{info, warn};

use crate::{
    curriculum::{RemediationPolicy, SlotId},
    error::{EngineError, internal_error, invalid_request},
    roadmap::types::{
        PhaseLockReason, PhaseStatus, RoadmapState, RoadmapStatus, SlotLockReason, SlotStatus,
    },
};

pub const EXHAUSTED_MESSAGE: &str =
    "Multiple remediation attempts did not resolve this concept. Please review the material.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "posture", rename_all = "snake_case")]
pub enum RemediationPosture {
    Enter {
        step: usize,
        strategy: Option<String>,
    },
    Advance {
        step: usize,
        strategy: Option<String>,
    },
    Exhausted {
        step: usize,
    },
}

impl RemediationPosture {
    pub fn step(&self) -> usize {
        match self {
            RemediationPosture::Enter { step, .. }
            | RemediationPosture::Advance { step, .. }
            | RemediationPosture::Exhausted { step } => *step,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RemediationPosture::Exhausted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationPlan {
    pub slot_id: SlotId,
    pub posture: RemediationPosture,
    pub dependents: Vec<SlotId>,
}

pub struct RemediationPlanner;

impl RemediationPlanner {
    pub fn plan(
        roadmap: &RoadmapState,
        slot_id: &str,
        policy: &RemediationPolicy,
        unlocks: &[SlotId],
    ) -> Result<RemediationPlan, EngineError> {
        let (phase_index, slot_index) = roadmap
            .slot_location(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        let slot = &roadmap.phases[phase_index].slots[slot_index];

        let posture = if slot.remediation.in_remediation {
            let step = slot.remediation.current_remediation_step + 1;
            if step >= policy.step_limit() {
                RemediationPosture::Exhausted { step }
            } else {
                RemediationPosture::Advance {
                    step,
                    strategy: policy.strategy_at(step).map(str::to_string),
                }
            }
        } else {
            RemediationPosture::Enter {
                step: 0,
                strategy: policy.strategy_at(0).map(str::to_string),
            }
        };

        let dependents = if unlocks.is_empty() {
            roadmap.phases[phase_index].slots[slot_index + 1..]
                .iter()
                .map(|slot| slot.slot_id.clone())
                .collect()
        } else {
            unlocks
                .iter()
                .filter(|id| id.as_str() != slot_id)
                .cloned()
                .collect()
        };

        Ok(RemediationPlan {
            slot_id: slot_id.to_string(),
            posture,
            dependents,
        })
    }

    pub fn apply(roadmap: &mut RoadmapState, plan: &RemediationPlan) -> Result<(), EngineError> {
        let (phase_index, slot_index) = roadmap
            .slot_location(&plan.slot_id)
            .ok_or_else(|| internal_error(format!("planned slot '{}' vanished", plan.slot_id)))?;

        {
            let slot = &mut roadmap.phases[phase_index].slots[slot_index];
            slot.remediation.remediation_attempts += 1;
            slot.remediation.current_remediation_step = plan.posture.step();
            slot.remediation.in_remediation = true;
        }

        match &plan.posture {
            RemediationPosture::Enter { strategy, .. }
            | RemediationPosture::Advance { strategy, .. } => {
                let slot = &mut roadmap.phases[phase_index].slots[slot_index];
                slot.status = SlotStatus::RemediationRequired;
                slot.user_message = Some(match strategy {
                    Some(strategy) => {
                        format!("Keep going. Next step: {}.", strategy_title(strategy))
                    }
                    None => "Keep going. Try this task again.".to_string(),
                });

                for dependent_id in &plan.dependents {
                    if let Some(dependent) = roadmap.slot_mut(dependent_id) {
                        if dependent.status == SlotStatus::Available {
                            dependent.status = SlotStatus::Locked;
                            dependent.locked_reason = Some(SlotLockReason::DependencyFailed {
                                slot_id: plan.slot_id.clone(),
                            });
                        }
                    }
                }
                info!(
                    target: "roadmap",
                    slot_id = %plan.slot_id,
                    step = plan.posture.step(),
                    dependents = plan.dependents.len(),
                    "remediation_entered"
                );
            }
            RemediationPosture::Exhausted { step } => {
                let phase = &mut roadmap.phases[phase_index];
                for (index, slot) in phase.slots.iter_mut().enumerate() {
                    if index == slot_index {
                        slot.status = SlotStatus::Failed;
                        slot.user_message = Some(EXHAUSTED_MESSAGE.to_string());
                    } else if slot.status.is_actionable() {
                        slot.status = SlotStatus::Locked;
                        slot.locked_reason = Some(SlotLockReason::DependencyFailed {
                            slot_id: plan.slot_id.clone(),
                        });
                    }
                }
                phase.phase_status = PhaseStatus::Locked;
                phase.locked_reason = Some(PhaseLockReason::DependencyFailed {
                    slot_id: plan.slot_id.clone(),
                });

                roadmap.status = RoadmapStatus::Locked;
                roadmap.locked_reason = Some(format!(
                    "Critical failure in {}. Curriculum paused.",
                    plan.slot_id
                ));
                warn!(
                    target: "roadmap",
                    slot_id = %plan.slot_id,
                    step = *step,
                    "remediation_exhausted_roadmap_locked"
                );
            }
        }

        Ok(())
    }

    pub fn release_dependents(
        roadmap: &mut RoadmapState,
        resolved_slot_id: &str,
        frozen: bool,
    ) -> Vec<SlotId> {
        if frozen {
            warn!(
                target: "roadmap",
                slot_id = resolved_slot_id,
                "dependent_unlock_suppressed_system_frozen"
            );
            return Vec::new();
        }

        let mut released = Vec::new();
        for phase in &mut roadmap.phases {
            let phase_open = phase.phase_status == PhaseStatus::Active;
            for slot in &mut phase.slots {
                let blocked_by_resolved = matches!(
                    &slot.locked_reason,
                    Some(SlotLockReason::DependencyFailed { slot_id }) if slot_id == resolved_slot_id
                );
                if !blocked_by_resolved {
                    continue;
                }
                if phase_open && slot.status == SlotStatus::Locked {
                    slot.unlock();
                    released.push(slot.slot_id.clone());
                } else {
                    slot.locked_reason = None;
                }
            }
        }

        if !released.is_empty() {
            info!(
                target: "roadmap",
                slot_id = resolved_slot_id,
                released = ?released,
                "dependents_released"
            );
        }
        released
    }
}

pub fn strategy_title(strategy: &str) -> String {
    strategy
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
