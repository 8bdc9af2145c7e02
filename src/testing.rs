use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::json;
use time::{OffsetDateTime, macros::datetime};

use crate::{
    config::{ControlConfig, EvaluationConfig},
    control::{ControlLoop, SystemStatusHandle},
    curriculum::{
        Curriculum, Difficulty, MasteryPolicy, PhaseDefinition, QuestionType, RemediationPolicy,
        SlotDefinition, StaticCurriculum, TaskTemplate, TemplateVariant,
    },
    error::{EngineError, evaluator_error},
    evaluation::{
        AIEvaluationResult, EvaluationPipeline, EvaluationRequest, EvaluatorPort, Submission,
    },
    orchestrator::{NoopHintGenerator, SlotOrchestrator},
    roadmap::RoadmapState,
    store::{InMemoryLearningStateStore, InMemoryRoadmapRepository},
    telemetry::{DecisionTrace, EngineTelemetryEvent, TelemetrySink},
};

pub const TRACK_ID: &str = "python-foundations";

pub fn fixed_now() -> OffsetDateTime {
    datetime!(2026-03-01 09:00 UTC)
}

#[derive(Default)]
pub struct ScriptedEvaluator {
    queue: Mutex<VecDeque<Result<AIEvaluationResult, EngineError>>>,
    fallback: Mutex<Option<AIEvaluationResult>>,
    requests: Mutex<Vec<EvaluationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: AIEvaluationResult) {
        lock(&self.queue).push_back(Ok(result));
    }

    pub fn push_error(&self, error: EngineError) {
        lock(&self.queue).push_back(Err(error));
    }

    pub fn set_fallback(&self, result: AIEvaluationResult) {
        *lock(&self.fallback) = Some(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<EvaluationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl EvaluatorPort for ScriptedEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<AIEvaluationResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);
        if let Some(next) = lock(&self.queue).pop_front() {
            return next;
        }
        lock(&self.fallback)
            .clone()
            .ok_or_else(|| evaluator_error("scripted evaluator has no response left"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default)]
pub struct RecordingTelemetrySink {
    events: Mutex<Vec<EngineTelemetryEvent>>,
}

impl RecordingTelemetrySink {
    pub fn events(&self) -> Vec<EngineTelemetryEvent> {
        lock(&self.events).clone()
    }

    pub fn decisions(&self) -> Vec<DecisionTrace> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineTelemetryEvent::Decision(trace) => Some(*trace),
                _ => None,
            })
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn on_event(&self, event: EngineTelemetryEvent) {
        lock(&self.events).push(event);
    }
}

pub fn evaluation_result(score: f64, confidence: f64) -> AIEvaluationResult {
    AIEvaluationResult {
        passed: score >= 0.6,
        score,
        confidence,
        partial_credit: 0.0,
        feedback: format!("scored {score}"),
        detected_concepts: vec!["loops".to_string()],
        mistakes: Vec::new(),
        model_name: "grader".to_string(),
        model_version: "2026-01".to_string(),
        prompt_version: "v1".to_string(),
        temperature: 0.0,
    }
}

pub fn submission(submission_id: &str) -> Submission {
    Submission {
        submission_id: submission_id.to_string(),
        payload: json!({ "code": "def add(a, b):\n    return a + b" }),
        hint_used: false,
        time_spent_seconds: Some(120.0),
    }
}

fn slot(slot_id: &str, skill: &str, difficulty: Difficulty) -> SlotDefinition {
    SlotDefinition {
        slot_id: slot_id.to_string(),
        skill: skill.to_string(),
        difficulty,
        mastery: MasteryPolicy::default(),
        remediation: RemediationPolicy::default(),
        unlocks: Vec::new(),
        concepts: Vec::new(),
    }
}

fn template(
    template_id: &str,
    slot: &SlotDefinition,
    question_type: QuestionType,
    variant: TemplateVariant,
    strategy: Option<&str>,
) -> TaskTemplate {
    TaskTemplate {
        task_template_id: template_id.to_string(),
        base_template_id: (variant == TemplateVariant::Remediation)
            .then(|| format!("{}-standard", slot.slot_id)),
        slot_id: slot.slot_id.clone(),
        skill: slot.skill.clone(),
        difficulty: slot.difficulty,
        question_type,
        variant,
        strategy: strategy.map(str::to_string),
        prompt: format!("Solve {}", slot.slot_id),
    }
}

pub fn sample_curriculum() -> Curriculum {
    let basics = vec![
        slot("py-vars", "python", Difficulty::Easy),
        slot("py-loops", "python", Difficulty::Medium),
    ];
    let functions = vec![
        slot("py-functions", "python", Difficulty::Medium),
        slot("py-recursion", "computer_science", Difficulty::Hard),
    ];

    let mut templates: Vec<TaskTemplate> = basics
        .iter()
        .chain(functions.iter())
        .map(|slot| {
            template(
                &format!("{}-standard", slot.slot_id),
                slot,
                QuestionType::Coding,
                TemplateVariant::Standard,
                None,
            )
        })
        .collect();
    for strategy in RemediationPolicy::default().strategies {
        templates.push(template(
            &format!("py-vars-{strategy}"),
            &basics[0],
            QuestionType::Coding,
            TemplateVariant::Remediation,
            Some(&strategy),
        ));
    }

    Curriculum {
        track_id: TRACK_ID.to_string(),
        name: "Python Foundations".to_string(),
        version: Some("1".to_string()),
        phases: vec![
            PhaseDefinition {
                phase_id: "phase-basics".to_string(),
                name: "Basics".to_string(),
                objective: None,
                slots: basics,
            },
            PhaseDefinition {
                phase_id: "phase-functions".to_string(),
                name: "Functions".to_string(),
                objective: None,
                slots: functions,
            },
        ],
        templates,
    }
}

pub fn sample_roadmap(user_id: &str) -> RoadmapState {
    RoadmapState::from_curriculum(user_id, "Learn Python", &sample_curriculum(), fixed_now())
}

pub struct TestEngine {
    pub orchestrator: SlotOrchestrator,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub roadmaps: Arc<InMemoryRoadmapRepository>,
    pub learning: Arc<InMemoryLearningStateStore>,
    pub control: Arc<ControlLoop>,
    pub pipeline: Arc<EvaluationPipeline>,
    pub telemetry: Arc<RecordingTelemetrySink>,
}

impl TestEngine {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_curriculum(sample_curriculum())
    }

    pub fn with_curriculum(curriculum: Curriculum) -> Result<Self, EngineError> {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let roadmaps = Arc::new(InMemoryRoadmapRepository::new());
        let learning = Arc::new(InMemoryLearningStateStore::new());
        let telemetry = Arc::new(RecordingTelemetrySink::default());
        let now = OffsetDateTime::now_utc();
        let control = Arc::new(ControlLoop::new(
            ControlConfig::default(),
            SystemStatusHandle::new(now),
            now,
        ));
        let pipeline = Arc::new(EvaluationPipeline::new(
            evaluator.clone(),
            EvaluationConfig::default(),
        ));
        let orchestrator = SlotOrchestrator::new(
            roadmaps.clone(),
            learning.clone(),
            Arc::new(StaticCurriculum::new(curriculum)?),
            pipeline.clone(),
            control.clone(),
            Arc::new(NoopHintGenerator),
            telemetry.clone(),
        );
        Ok(Self {
            orchestrator,
            evaluator,
            roadmaps,
            learning,
            control,
            pipeline,
            telemetry,
        })
    }
}
