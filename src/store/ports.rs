use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    error::EngineError,
    roadmap::RoadmapState,
    skills::{LearningState, SkillEntry},
};

#[async_trait]
pub trait RoadmapRepository: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<RoadmapState>, EngineError>;

    async fn create(&self, roadmap: &RoadmapState) -> Result<(), EngineError>;

    /// Accepts the write only if the stored version still equals
    /// `expected_version`; the stored copy then carries `expected_version + 1`,
    /// which is returned. A mismatch is a retryable conflict.
    async fn commit(
        &self,
        roadmap: &RoadmapState,
        expected_version: u64,
    ) -> Result<u64, EngineError>;
}

#[async_trait]
pub trait LearningStateStore: Send + Sync {
    /// Missing users read as an empty learning state.
    async fn load(&self, user_id: &str) -> Result<LearningState, EngineError>;

    async fn apply_entries(
        &self,
        user_id: &str,
        entries: BTreeMap<String, SkillEntry>,
        now: OffsetDateTime,
    ) -> Result<(), EngineError>;
}
