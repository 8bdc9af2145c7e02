use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::{curriculum::Difficulty, error::EngineError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintRequest {
    pub user_id: String,
    pub slot_id: String,
    pub skill: String,
    pub difficulty: Difficulty,
    pub task_template_id: String,
    pub skill_levels: BTreeMap<String, f64>,
}

#[async_trait]
pub trait HintGeneratorPort: Send + Sync {
    async fn generate_hint(&self, request: HintRequest) -> Result<Option<String>, EngineError>;
}

#[derive(Default)]
pub struct NoopHintGenerator;

#[async_trait]
impl HintGeneratorPort for NoopHintGenerator {
    async fn generate_hint(&self, _request: HintRequest) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}
