use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use roadmap_engine::{
    cli::config_path_from_args,
    config::Config,
    control::{CalibrationRunner, ControlLoop, SystemStatusHandle, spawn_calibration_loop},
    curriculum::StaticCurriculum,
    evaluation::{EvaluationPipeline, EvaluatorPort, HttpEvaluator, UnavailableEvaluator},
    logging::init_tracing,
    orchestrator::{NoopHintGenerator, SlotOrchestrator},
    store::{FileLearningStateStore, FileRoadmapRepository},
    telemetry::{TelemetrySink, TracingTelemetrySink},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging_guard = init_tracing(&config.logging).context("failed to initialize logging")?;

    let curriculum = Arc::new(
        StaticCurriculum::load(&config.curriculum.path).with_context(|| {
            format!(
                "failed to load curriculum from {}",
                config.curriculum.path.display()
            )
        })?,
    );

    let evaluator: Arc<dyn EvaluatorPort> = match &config.evaluator.endpoint {
        Some(endpoint) => Arc::new(
            HttpEvaluator::new(
                endpoint.clone(),
                Duration::from_millis(config.evaluator.timeout_ms),
            )
            .context("failed to construct http evaluator")?,
        ),
        None => Arc::new(UnavailableEvaluator),
    };
    let pipeline = Arc::new(EvaluationPipeline::new(
        evaluator,
        config.evaluation.clone(),
    ));

    let now = OffsetDateTime::now_utc();
    let control = Arc::new(ControlLoop::new(
        config.control.clone(),
        SystemStatusHandle::new(now),
        now,
    ));
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);

    let orchestrator = SlotOrchestrator::new(
        Arc::new(FileRoadmapRepository::new(
            config.storage.state_dir.join("roadmaps"),
        )),
        Arc::new(FileLearningStateStore::new(
            config.storage.state_dir.join("learning"),
        )),
        curriculum.clone(),
        Arc::clone(&pipeline),
        Arc::clone(&control),
        Arc::new(NoopHintGenerator),
        Arc::clone(&telemetry),
    );

    let shutdown = CancellationToken::new();
    let calibration_task = if config.evaluator.endpoint.is_some() {
        let runner = Arc::new(CalibrationRunner::new(
            Arc::clone(&pipeline),
            Arc::clone(&control),
            config.calibration.golden_tasks.clone(),
            Arc::clone(&telemetry),
        ));
        Some(spawn_calibration_loop(
            runner,
            Duration::from_secs(config.calibration.interval_seconds),
            shutdown.clone(),
        ))
    } else {
        tracing::warn!(
            target: "calibration",
            "calibration_disabled_no_evaluator_endpoint"
        );
        None
    };

    tracing::info!(
        target: "orchestrator",
        run_id = logging_guard.run_id(),
        track_id = %curriculum.curriculum().track_id,
        state_dir = %config.storage.state_dir.display(),
        mode = orchestrator.system_status().mode.as_str(),
        "roadmap_engine_ready"
    );

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };

    tracing::info!(target: "orchestrator", signal = signal_name, "shutdown_requested");
    shutdown.cancel();
    if let Some(task) = calibration_task {
        task.await.context("calibration task join failed")?;
    }

    tracing::info!(target: "orchestrator", signal = signal_name, "roadmap_engine_stopped");
    drop(logging_guard);
    Ok(())
}
