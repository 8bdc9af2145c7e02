use roadmap_engine::{
    error::EngineErrorKind,
    roadmap::{
        PhaseStatus, PhaseTransition, RoadmapStatus, RoadmapTransitions, SlotStatus,
        TaskInstanceStatus, validate,
    },
    testing::{fixed_now, sample_roadmap},
};

use crate::{pass_slot, standard_template};

#[test]
fn given_available_slot_when_started_then_slot_holds_new_instance() {
    let mut roadmap = sample_roadmap("learner-1");

    let instance = RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-vars",
        &standard_template("py-vars"),
        fixed_now(),
    )
    .expect("slot should start");

    let slot = roadmap.slot("py-vars").expect("slot exists");
    assert_eq!(slot.status, SlotStatus::InProgress);
    assert_eq!(
        slot.active_task_instance_id.as_deref(),
        Some(instance.task_instance_id.as_str())
    );
    assert_eq!(instance.status, TaskInstanceStatus::InProgress);
    assert_eq!(instance.base_template_id, "py-vars-standard");
    assert_eq!(roadmap.task_instances.len(), 1);
    validate(&roadmap).expect("started roadmap should be valid");
}

#[test]
fn given_slot_in_progress_when_another_start_is_attempted_then_conflict_is_returned() {
    let mut roadmap = sample_roadmap("learner-1");
    RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-vars",
        &standard_template("py-vars"),
        fixed_now(),
    )
    .expect("first start should succeed");
    roadmap.phases[0].slots[1].unlock();

    let err = RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-loops",
        &standard_template("py-loops"),
        fixed_now(),
    )
    .expect_err("single-flight must hold");

    assert_eq!(err.kind, EngineErrorKind::Conflict);
    assert!(!err.retryable);
    assert_eq!(
        roadmap.slot("py-loops").map(|slot| slot.status),
        Some(SlotStatus::Available)
    );
}

#[test]
fn given_slot_in_locked_phase_when_started_then_request_is_rejected() {
    let mut roadmap = sample_roadmap("learner-1");

    let err = RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-functions",
        &standard_template("py-functions"),
        fixed_now(),
    )
    .expect_err("locked phase slots cannot start");

    assert_eq!(err.kind, EngineErrorKind::InvalidRequest);
}

#[test]
fn given_first_slot_passed_when_recorded_then_next_slot_opens() {
    let mut roadmap = sample_roadmap("learner-1");

    pass_slot(&mut roadmap, "py-vars");

    assert_eq!(
        roadmap.slot("py-vars").map(|slot| slot.status),
        Some(SlotStatus::Completed)
    );
    assert_eq!(
        roadmap.slot("py-loops").map(|slot| slot.status),
        Some(SlotStatus::Available)
    );
    assert_eq!(
        roadmap.task_instances[0].status,
        TaskInstanceStatus::Completed
    );
    assert_eq!(roadmap.task_instances[0].completed_at, Some(fixed_now()));
    assert_eq!(roadmap.last_evaluated_at, fixed_now());
    validate(&roadmap).expect("roadmap should stay valid");
}

#[test]
fn given_last_slot_of_phase_passed_when_resolved_then_next_phase_activates() {
    let mut roadmap = sample_roadmap("learner-1");
    pass_slot(&mut roadmap, "py-vars");

    RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-loops",
        &standard_template("py-loops"),
        fixed_now(),
    )
    .expect("slot should start");
    let (_, transitions) =
        RoadmapTransitions::complete_directly(&mut roadmap, "py-loops", true, &[], fixed_now())
            .expect("slot should complete");

    assert_eq!(
        transitions,
        vec![
            PhaseTransition::PhaseCompleted {
                phase_id: "phase-basics".to_string()
            },
            PhaseTransition::PhaseActivated {
                phase_id: "phase-functions".to_string()
            },
            PhaseTransition::SlotOpened {
                slot_id: "py-functions".to_string()
            },
        ]
    );
    assert_eq!(roadmap.current_phase, "phase-functions");
    assert_eq!(roadmap.phases[0].phase_status, PhaseStatus::Completed);
    assert_eq!(roadmap.phases[1].phase_status, PhaseStatus::Active);
    assert!(roadmap.phases[1].locked_reason.is_none());
    validate(&roadmap).expect("roadmap should stay valid");
}

#[test]
fn given_every_slot_passed_when_resolved_then_roadmap_completes_and_deactivates() {
    let mut roadmap = sample_roadmap("learner-1");

    for slot_id in ["py-vars", "py-loops", "py-functions", "py-recursion"] {
        pass_slot(&mut roadmap, slot_id);
    }

    assert_eq!(roadmap.status, RoadmapStatus::Completed);
    assert!(!roadmap.is_active);
    assert!(
        roadmap
            .phases
            .iter()
            .all(|phase| phase.phase_status == PhaseStatus::Completed)
    );
    validate(&roadmap).expect("completed roadmap should be valid");
}

#[test]
fn given_failed_direct_completion_when_phase_has_locked_slot_then_it_opens() {
    let mut roadmap = sample_roadmap("learner-1");
    RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-vars",
        &standard_template("py-vars"),
        fixed_now(),
    )
    .expect("slot should start");

    let (instance, transitions) =
        RoadmapTransitions::complete_directly(&mut roadmap, "py-vars", false, &[], fixed_now())
            .expect("slot should complete");

    assert_eq!(instance.status, TaskInstanceStatus::Failed);
    assert_eq!(
        roadmap.slot("py-vars").map(|slot| slot.status),
        Some(SlotStatus::Failed)
    );
    assert_eq!(
        transitions,
        vec![PhaseTransition::SlotOpened {
            slot_id: "py-loops".to_string()
        }]
    );
    validate(&roadmap).expect("roadmap should stay valid");
}

#[test]
fn given_in_progress_slot_when_remediation_is_forced_then_attempt_fails_and_slot_awaits_remediation()
 {
    let mut roadmap = sample_roadmap("learner-1");
    RoadmapTransitions::start_slot(
        &mut roadmap,
        "py-vars",
        &standard_template("py-vars"),
        fixed_now(),
    )
    .expect("slot should start");

    RoadmapTransitions::force_remediation(&mut roadmap, "py-vars", fixed_now())
        .expect("remediation should be forced");

    let slot = roadmap.slot("py-vars").expect("slot exists");
    assert_eq!(slot.status, SlotStatus::RemediationRequired);
    assert!(slot.active_task_instance_id.is_none());
    assert!(slot.remediation.in_remediation);
    assert_eq!(roadmap.task_instances[0].status, TaskInstanceStatus::Failed);
    validate(&roadmap).expect("roadmap should stay valid");
}

#[test]
fn given_locked_slot_when_remediation_is_forced_then_request_is_rejected() {
    let mut roadmap = sample_roadmap("learner-1");

    let err = RoadmapTransitions::force_remediation(&mut roadmap, "py-loops", fixed_now())
        .expect_err("locked slots cannot be remediated");

    assert_eq!(err.kind, EngineErrorKind::InvalidRequest);
}
