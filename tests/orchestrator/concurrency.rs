use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use roadmap_engine::{
    curriculum::StaticCurriculum,
    error::{EngineError, EngineErrorKind},
    orchestrator::{NoopHintGenerator, SlotOrchestrator},
    roadmap::{RoadmapState, SlotStatus},
    store::{InMemoryRoadmapRepository, RoadmapRepository},
    telemetry::NoopTelemetrySink,
    testing::{TestEngine, sample_curriculum},
};

use crate::USER;

/// Lets another writer commit first whenever a race is armed.
#[derive(Default)]
struct RacingRepository {
    inner: InMemoryRoadmapRepository,
    armed: AtomicBool,
}

impl RacingRepository {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoadmapRepository for RacingRepository {
    async fn load(&self, user_id: &str) -> Result<Option<RoadmapState>, EngineError> {
        self.inner.load(user_id).await
    }

    async fn create(&self, roadmap: &RoadmapState) -> Result<(), EngineError> {
        self.inner.create(roadmap).await
    }

    async fn commit(
        &self,
        roadmap: &RoadmapState,
        expected_version: u64,
    ) -> Result<u64, EngineError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(current) = self.inner.load(&roadmap.user_id).await? {
                self.inner.commit(&current, current.version).await?;
            }
        }
        self.inner.commit(roadmap, expected_version).await
    }
}

fn racing_orchestrator(engine: &TestEngine, repository: Arc<RacingRepository>) -> SlotOrchestrator {
    SlotOrchestrator::new(
        repository,
        engine.learning.clone(),
        Arc::new(StaticCurriculum::new(sample_curriculum()).expect("fixture curriculum is valid")),
        engine.pipeline.clone(),
        engine.control.clone(),
        Arc::new(NoopHintGenerator),
        Arc::new(NoopTelemetrySink),
    )
}

#[tokio::test]
async fn given_concurrent_writer_when_start_commits_then_retryable_conflict_is_surfaced() {
    let engine = TestEngine::new().expect("fixture curriculum is valid");
    let repository = Arc::new(RacingRepository::default());
    let orchestrator = racing_orchestrator(&engine, repository.clone());
    orchestrator
        .initialize_roadmap(USER, "Learn Python")
        .await
        .expect("roadmap should initialize");

    repository.arm();
    let err = orchestrator
        .start_slot(USER, "py-vars")
        .await
        .expect_err("stale version must not commit");

    assert_eq!(err.kind, EngineErrorKind::Conflict);
    assert!(err.is_version_conflict());
    let stored = orchestrator.get_roadmap(USER).await.expect("stored");
    assert_eq!(stored.version, 2);
    assert_eq!(
        stored.slot("py-vars").map(|slot| slot.status),
        Some(SlotStatus::Available)
    );

    let started = orchestrator
        .start_slot(USER, "py-vars")
        .await
        .expect("caller reloads and retries");
    assert_eq!(started.version, 3);
}

#[tokio::test]
async fn given_two_starts_in_flight_when_joined_then_exactly_one_commits() {
    let engine = TestEngine::new().expect("fixture curriculum is valid");
    let orchestrator = racing_orchestrator(&engine, Arc::new(RacingRepository::default()));
    orchestrator
        .initialize_roadmap(USER, "Learn Python")
        .await
        .expect("roadmap should initialize");

    let (first, second) = tokio::join!(
        orchestrator.start_slot(USER, "py-vars"),
        orchestrator.start_slot(USER, "py-vars"),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    let failure = results
        .iter()
        .find_map(|result| result.as_ref().err())
        .expect("one start must lose");
    assert_eq!(failure.kind, EngineErrorKind::Conflict);
    let stored = orchestrator.get_roadmap(USER).await.expect("stored");
    assert_eq!(stored.version, 2);
}
