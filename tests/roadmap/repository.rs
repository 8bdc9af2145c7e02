use std::{fs, path::PathBuf, sync::Arc};

use uuid::Uuid;

use roadmap_engine::{
    error::EngineErrorKind,
    roadmap::{RoadmapState, validate},
    skills::SkillEntry,
    store::{
        FileLearningStateStore, FileRoadmapRepository, InMemoryRoadmapRepository,
        LearningStateStore, RoadmapRepository,
    },
    testing::{fixed_now, sample_roadmap},
};

use crate::pass_slot;

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("roadmap-store-test-{}", Uuid::now_v7()))
}

async fn assert_round_trip(repository: Arc<dyn RoadmapRepository>) {
    let mut roadmap = sample_roadmap("learner-1");
    repository
        .create(&roadmap)
        .await
        .expect("create should succeed");

    pass_slot(&mut roadmap, "py-vars");
    let version = repository
        .commit(&roadmap, 1)
        .await
        .expect("commit should succeed");
    assert_eq!(version, 2);

    let reloaded: RoadmapState = repository
        .load("learner-1")
        .await
        .expect("load should succeed")
        .expect("roadmap should exist");
    assert_eq!(reloaded.version, version);
    validate(&reloaded).expect("reloaded roadmap should be valid");
    roadmap.version = version;
    assert_eq!(reloaded, roadmap);
}

async fn assert_stale_commit_conflicts(repository: Arc<dyn RoadmapRepository>) {
    let roadmap = sample_roadmap("learner-2");
    repository
        .create(&roadmap)
        .await
        .expect("create should succeed");
    repository
        .commit(&roadmap, 1)
        .await
        .expect("first writer wins");

    let err = repository
        .commit(&roadmap, 1)
        .await
        .expect_err("second writer read a stale version");
    assert_eq!(err.kind, EngineErrorKind::Conflict);
    assert!(err.retryable);
    assert!(err.is_version_conflict());

    let err = repository
        .create(&roadmap)
        .await
        .expect_err("one roadmap per user");
    assert_eq!(err.kind, EngineErrorKind::Conflict);
    assert!(!err.retryable);
}

#[tokio::test]
async fn given_in_memory_repository_when_committed_and_reloaded_then_roadmap_round_trips() {
    assert_round_trip(Arc::new(InMemoryRoadmapRepository::new())).await;
}

#[tokio::test]
async fn given_file_repository_when_committed_and_reloaded_then_roadmap_round_trips() {
    let dir = scratch_dir();
    assert_round_trip(Arc::new(FileRoadmapRepository::new(&dir))).await;
    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn given_in_memory_repository_when_commit_is_stale_then_retryable_conflict_is_returned() {
    assert_stale_commit_conflicts(Arc::new(InMemoryRoadmapRepository::new())).await;
}

#[tokio::test]
async fn given_file_repository_when_commit_is_stale_then_retryable_conflict_is_returned() {
    let dir = scratch_dir();
    assert_stale_commit_conflicts(Arc::new(FileRoadmapRepository::new(&dir))).await;
    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn given_unknown_user_when_committing_then_not_found_is_returned() {
    let repository = InMemoryRoadmapRepository::new();

    let err = repository
        .commit(&sample_roadmap("ghost"), 1)
        .await
        .expect_err("nothing stored");

    assert_eq!(err.kind, EngineErrorKind::NotFound);
}

#[tokio::test]
async fn given_path_like_user_id_when_loading_from_files_then_request_is_rejected() {
    let dir = scratch_dir();
    let repository = FileRoadmapRepository::new(&dir);

    let err = repository
        .load("../escape")
        .await
        .expect_err("user ids are not paths");

    assert_eq!(err.kind, EngineErrorKind::InvalidRequest);
    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn given_file_learning_store_when_entries_applied_then_other_skills_survive() {
    let dir = scratch_dir();
    let store = FileLearningStateStore::new(&dir);

    let empty = store.load("learner-1").await.expect("load should succeed");
    assert!(empty.skill_vector.is_empty());

    let python = SkillEntry {
        level: 0.4,
        confidence: 0.1,
        ..SkillEntry::default()
    };
    let sql = SkillEntry {
        level: 0.2,
        confidence: 0.1,
        ..SkillEntry::default()
    };
    store
        .apply_entries(
            "learner-1",
            [("python".to_string(), python), ("sql".to_string(), sql)].into(),
            fixed_now(),
        )
        .await
        .expect("apply should succeed");
    let raised = SkillEntry {
        level: 0.5,
        confidence: 0.15,
        ..SkillEntry::default()
    };
    store
        .apply_entries(
            "learner-1",
            [("python".to_string(), raised)].into(),
            fixed_now(),
        )
        .await
        .expect("apply should succeed");

    let state = store.load("learner-1").await.expect("load should succeed");
    assert_eq!(state.skill_vector["python"].level, 0.5);
    assert_eq!(state.skill_vector["sql"].level, 0.2);
    assert_eq!(state.updated_at, Some(fixed_now()));
    let _ = fs::remove_dir_all(&dir);
}
