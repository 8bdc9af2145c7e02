use crate::{
    curriculum::types::{Curriculum, SlotDefinition, TaskTemplate},
    error::EngineError,
};

pub trait CurriculumProvider: Send + Sync {
    fn snapshot(&self) -> Result<Curriculum, EngineError>;

    fn slot_definition(&self, slot_id: &str) -> Result<Option<SlotDefinition>, EngineError>;

    fn templates_for_slot(&self, slot_id: &str) -> Result<Vec<TaskTemplate>, EngineError>;

    fn template(&self, template_id: &str) -> Result<Option<TaskTemplate>, EngineError>;
}
