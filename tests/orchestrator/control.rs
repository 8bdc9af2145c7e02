use roadmap_engine::{
    control::SystemMode,
    error::EngineErrorKind,
    roadmap::SlotStatus,
    skills::SkillUpdate,
    store::LearningStateStore,
    telemetry::EngineTelemetryEvent,
};

use crate::{USER, approx, attempt, engine_with_roadmap};

#[tokio::test]
async fn given_frozen_system_when_high_score_passes_then_no_skill_entry_is_written() {
    let engine = engine_with_roadmap().await;
    engine.orchestrator.freeze("evaluator audit");

    let result = attempt(&engine, "py-vars", 0.95).await;

    assert!(matches!(
        result.skill_update,
        SkillUpdate::Suppressed {
            mode: SystemMode::Frozen,
            ..
        }
    ));
    let learning = engine.learning.load(USER).await.expect("learning state");
    assert!(learning.skill_vector.is_empty());
    assert!(learning.updated_at.is_none());

    assert_eq!(result.slot_status, SlotStatus::Completed);
    let rules = &engine.telemetry.decisions()[0].rules_triggered;
    assert!(rules.contains(&"skill_update_suppressed".to_string()));
    assert!(engine.telemetry.events().iter().any(|event| matches!(
        event,
        EngineTelemetryEvent::SkillUpdateSuppressed {
            mode: SystemMode::Frozen,
            ..
        }
    )));
}

#[tokio::test]
async fn given_unfrozen_system_when_pass_follows_then_skill_updates_resume() {
    let engine = engine_with_roadmap().await;
    engine.orchestrator.freeze("evaluator audit");
    attempt(&engine, "py-vars", 0.95).await;

    let status = engine.orchestrator.unfreeze("audit finished");
    let result = attempt(&engine, "py-loops", 0.95).await;

    assert_eq!(status.mode, SystemMode::Normal);
    assert!(result.skill_update.is_applied());
    let learning = engine.learning.load(USER).await.expect("learning state");
    assert!(learning.skill_vector.contains_key("python"));
}

#[tokio::test]
async fn given_dampened_system_when_pass_is_graded_then_skill_gain_is_scaled() {
    let engine = engine_with_roadmap().await;
    let status = engine
        .orchestrator
        .set_dampening(0.5, "noisy grader")
        .expect("factor in range");
    assert_eq!(status.mode, SystemMode::Dampened);

    attempt(&engine, "py-vars", 0.9).await;

    let learning = engine.learning.load(USER).await.expect("learning state");
    assert!(approx(learning.skill_vector["python"].level, 0.07));
    assert_eq!(engine.orchestrator.system_status().dampening_factor, 0.5);
}

#[tokio::test]
async fn given_invalid_dampening_factor_when_set_then_request_is_rejected() {
    let engine = engine_with_roadmap().await;

    let err = engine
        .orchestrator
        .set_dampening(-0.1, "typo")
        .expect_err("factor must lie in [0, 1]");

    assert_eq!(err.kind, EngineErrorKind::InvalidRequest);
    assert_eq!(engine.orchestrator.system_status().mode, SystemMode::Normal);
}
