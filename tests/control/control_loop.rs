use time::Duration;

use roadmap_engine::{
    config::ControlConfig,
    control::{ControlLoop, FreezeOrigin, SystemMode, SystemStatusHandle},
    error::EngineErrorKind,
    testing::fixed_now,
};

use crate::signal;

fn control(config: ControlConfig) -> ControlLoop {
    ControlLoop::new(config, SystemStatusHandle::new(fixed_now()), fixed_now())
}

#[test]
fn given_golden_failure_when_normal_then_calibration_freeze_lifts_after_three_passes() {
    let control = control(ControlConfig::default());

    let decision = control.record_calibration(1, fixed_now());
    assert_eq!(decision.mode_after, SystemMode::Frozen);
    let status = control.status();
    assert_eq!(status.freeze_origin, Some(FreezeOrigin::Calibration));
    assert_eq!(status.dampening_factor, 0.0);

    for hour in 1..=2 {
        let decision = control.record_calibration(0, fixed_now() + Duration::hours(hour));
        assert_eq!(decision.mode_after, SystemMode::Frozen);
    }
    let decision = control.record_calibration(0, fixed_now() + Duration::hours(3));

    assert_eq!(decision.mode_before, SystemMode::Frozen);
    assert_eq!(decision.mode_after, SystemMode::Normal);
    assert_eq!(decision.consecutive_passes, 3);
    assert_eq!(control.status().dampening_factor, 1.0);
}

#[test]
fn given_failure_during_recovery_when_frozen_then_pass_count_restarts() {
    let control = control(ControlConfig::default());
    control.record_calibration(1, fixed_now());
    control.record_calibration(0, fixed_now());
    control.record_calibration(0, fixed_now());

    let decision = control.record_calibration(2, fixed_now());

    assert_eq!(decision.mode_after, SystemMode::Frozen);
    assert_eq!(control.consecutive_passes(), 0);
}

#[test]
fn given_administrative_freeze_when_calibration_passes_then_system_stays_frozen() {
    let control = control(ControlConfig::default());
    control.freeze("incident review", fixed_now());

    for hour in 1..=5 {
        control.record_calibration(0, fixed_now() + Duration::hours(hour));
    }

    let status = control.status();
    assert_eq!(status.mode, SystemMode::Frozen);
    assert_eq!(status.freeze_origin, Some(FreezeOrigin::Administrative));
    assert_eq!(status.reason, "incident review");

    let status = control.unfreeze("review closed", fixed_now() + Duration::hours(6));
    assert_eq!(status.mode, SystemMode::Normal);
    assert_eq!(status.dampening_factor, 1.0);
    assert!(status.freeze_origin.is_none());
}

#[test]
fn given_dampening_factor_out_of_range_when_set_then_request_is_rejected() {
    let control = control(ControlConfig::default());

    let err = control
        .set_dampening(1.5, "too much", fixed_now())
        .expect_err("factor must lie in [0, 1]");
    assert_eq!(err.kind, EngineErrorKind::InvalidRequest);
    assert_eq!(control.status().mode, SystemMode::Normal);

    let status = control
        .set_dampening(0.3, "manual throttle", fixed_now())
        .expect("factor in range");
    assert_eq!(status.mode, SystemMode::Dampened);
    assert_eq!(status.dampening_factor, 0.3);
}

#[test]
fn given_scattered_live_scores_when_calibrated_then_system_dampens() {
    let control = control(ControlConfig::default());
    for index in 0..20 {
        let score = if index % 2 == 0 { 0.0 } else { 1.0 };
        control.record_evaluation(signal(score, false, fixed_now()));
    }

    let decision = control.record_calibration(0, fixed_now());

    assert_eq!(decision.metrics.samples, 20);
    assert_eq!(decision.metrics.score_std_dev, 0.5);
    assert_eq!(decision.mode_after, SystemMode::Dampened);
    assert_eq!(control.status().dampening_factor, 0.5);
}

#[test]
fn given_golden_failure_without_freeze_policy_when_dampened_then_safe_mode_is_entered() {
    let control = control(ControlConfig {
        freeze_on_golden_failure: false,
        ..ControlConfig::default()
    });
    control
        .set_dampening(0.5, "manual throttle", fixed_now())
        .expect("factor in range");

    let decision = control.record_calibration(1, fixed_now());

    assert_eq!(decision.mode_after, SystemMode::SafeMode);
    assert_eq!(control.status().dampening_factor, 0.25);
}

#[test]
fn given_drift_in_three_cycles_when_dampened_then_safe_mode_then_recovery_after_quiet_day() {
    let control = control(ControlConfig::default());
    control
        .set_dampening(0.5, "manual throttle", fixed_now())
        .expect("factor in range");

    for hour in 0..3 {
        let at = fixed_now() + Duration::hours(hour);
        control.record_evaluation(signal(0.4, true, at));
        control.record_calibration(0, at);
    }
    assert_eq!(control.status().mode, SystemMode::SafeMode);

    let decision = control.record_calibration(0, fixed_now() + Duration::hours(12));
    assert_eq!(decision.mode_after, SystemMode::SafeMode);
    assert_eq!(decision.consecutive_drift_cycles, 0);

    let decision = control.record_calibration(0, fixed_now() + Duration::hours(30));
    assert_eq!(decision.mode_after, SystemMode::Normal);
}
