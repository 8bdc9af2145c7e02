use crate::{
    curriculum::{RemediationPolicy, TaskTemplate, TemplateVariant},
    error::{EngineError, configuration_error},
    roadmap::types::{SlotStatus, TaskSlot},
};

pub fn resolve_template(
    slot: &TaskSlot,
    candidates: &[TaskTemplate],
    policy: &RemediationPolicy,
) -> Result<TaskTemplate, EngineError> {
    if candidates.is_empty() {
        return Err(configuration_error(format!(
            "no templates configured for slot '{}'",
            slot.slot_id
        )));
    }

    if slot.status == SlotStatus::RemediationRequired {
        let step = slot.remediation.current_remediation_step;
        if !policy.strategies.is_empty() && step >= policy.step_limit() {
            return Err(configuration_error(format!(
                "slot '{}' has no remediation strategy at step {}",
                slot.slot_id, step
            )));
        }
        if let Some(strategy) = policy.strategy_at(step) {
            let matched = candidates.iter().find(|template| {
                template.variant == TemplateVariant::Remediation
                    && template.strategy.as_deref() == Some(strategy)
            });
            if let Some(template) = matched {
                return Ok(template.clone());
            }
        }
    }

    candidates
        .iter()
        .find(|template| template.variant == TemplateVariant::Standard)
        .cloned()
        .ok_or_else(|| {
            configuration_error(format!(
                "no standard template configured for slot '{}'",
                slot.slot_id
            ))
        })
}
