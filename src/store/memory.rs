use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use crate::{
    error::{EngineError, business_conflict, not_found, version_conflict},
    roadmap::RoadmapState,
    skills::{LearningState, SkillEntry},
    store::ports::{LearningStateStore, RoadmapRepository},
};

#[derive(Default)]
pub struct InMemoryRoadmapRepository {
    roadmaps: RwLock<HashMap<String, RoadmapState>>,
}

impl InMemoryRoadmapRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoadmapRepository for InMemoryRoadmapRepository {
    async fn load(&self, user_id: &str) -> Result<Option<RoadmapState>, EngineError> {
        Ok(self.roadmaps.read().await.get(user_id).cloned())
    }

    async fn create(&self, roadmap: &RoadmapState) -> Result<(), EngineError> {
        let mut roadmaps = self.roadmaps.write().await;
        if roadmaps.contains_key(&roadmap.user_id) {
            return Err(business_conflict(format!(
                "roadmap for '{}' already exists",
                roadmap.user_id
            )));
        }
        roadmaps.insert(roadmap.user_id.clone(), roadmap.clone());
        Ok(())
    }

    async fn commit(
        &self,
        roadmap: &RoadmapState,
        expected_version: u64,
    ) -> Result<u64, EngineError> {
        let mut roadmaps = self.roadmaps.write().await;
        let stored = roadmaps.get_mut(&roadmap.user_id).ok_or_else(|| {
            not_found(format!("no roadmap stored for '{}'", roadmap.user_id))
        })?;
        if stored.version != expected_version {
            return Err(version_conflict(format!(
                "roadmap for '{}' is at version {}, expected {}",
                roadmap.user_id, stored.version, expected_version
            )));
        }

        let next_version = expected_version + 1;
        let mut committed = roadmap.clone();
        committed.version = next_version;
        *stored = committed;
        Ok(next_version)
    }
}

#[derive(Default)]
pub struct InMemoryLearningStateStore {
    states: Mutex<HashMap<String, LearningState>>,
}

impl InMemoryLearningStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningStateStore for InMemoryLearningStateStore {
    async fn load(&self, user_id: &str) -> Result<LearningState, EngineError> {
        Ok(self
            .states
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| LearningState::empty(user_id)))
    }

    async fn apply_entries(
        &self,
        user_id: &str,
        entries: BTreeMap<String, SkillEntry>,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        let mut states = self.states.lock().await;
        let state = states
            .entry(user_id.to_string())
            .or_insert_with(|| LearningState::empty(user_id));
        state.skill_vector.extend(entries);
        state.updated_at = Some(now);
        Ok(())
    }
}
