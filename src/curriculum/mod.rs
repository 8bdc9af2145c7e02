pub mod ports;
pub mod types;

use std::{collections::BTreeSet, fs, path::Path};

use validator::Validate;

use crate::error::{EngineError, configuration_error};

pub use ports::CurriculumProvider;
pub use types::{
    Curriculum, Difficulty, MasteryPolicy, PhaseDefinition, QuestionType, RemediationPolicy,
    SlotDefinition, SlotId, TaskTemplate, TemplateId, TemplateVariant,
};

#[derive(Debug, Clone)]
pub struct StaticCurriculum {
    curriculum: Curriculum,
}

impl StaticCurriculum {
    pub fn new(curriculum: Curriculum) -> Result<Self, EngineError> {
        curriculum
            .validate()
            .map_err(|err| configuration_error(format!("invalid curriculum: {err}")))?;

        let mut seen = BTreeSet::new();
        for slot in curriculum.phases.iter().flat_map(|phase| phase.slots.iter()) {
            if !seen.insert(slot.slot_id.as_str()) {
                return Err(configuration_error(format!(
                    "curriculum '{}' defines slot '{}' more than once",
                    curriculum.track_id, slot.slot_id
                )));
            }
        }
        for template in &curriculum.templates {
            if !seen.contains(template.slot_id.as_str()) {
                return Err(configuration_error(format!(
                    "template '{}' is bound to unknown slot '{}'",
                    template.task_template_id, template.slot_id
                )));
            }
        }

        Ok(Self { curriculum })
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|err| {
            configuration_error(format!(
                "failed to read curriculum '{}': {err}",
                path.display()
            ))
        })?;
        let curriculum: Curriculum = json5::from_str(&content).map_err(|err| {
            configuration_error(format!(
                "failed to parse curriculum '{}': {err}",
                path.display()
            ))
        })?;
        Self::new(curriculum)
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }
}

impl CurriculumProvider for StaticCurriculum {
    fn snapshot(&self) -> Result<Curriculum, EngineError> {
        Ok(self.curriculum.clone())
    }

    fn slot_definition(&self, slot_id: &str) -> Result<Option<SlotDefinition>, EngineError> {
        Ok(self.curriculum.slot_definition(slot_id).cloned())
    }

    fn templates_for_slot(&self, slot_id: &str) -> Result<Vec<TaskTemplate>, EngineError> {
        Ok(self.curriculum.templates_for_slot(slot_id))
    }

    fn template(&self, template_id: &str) -> Result<Option<TaskTemplate>, EngineError> {
        Ok(self.curriculum.template(template_id).cloned())
    }
}
