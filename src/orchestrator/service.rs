use std::{collections::BTreeSet, sync::Arc};

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    control::{ControlLoop, EvaluationSignal, SystemStatus},
    curriculum::{CurriculumProvider, SlotDefinition, SlotId},
    error::{EngineError, business_conflict, internal_error, invalid_request, not_found},
    evaluation::{
        AIEvaluationResult, EvaluationOutcome, EvaluationPipeline, IntegrityPenalty, Submission,
        consistency::has_directional_drift,
    },
    orchestrator::{
        ports::{HintGeneratorPort, HintRequest},
        types::{
            CompleteSlotResult, ReinstateResult, RemediateSlotResult, StartSlotResult,
            SubmitSlotResult,
        },
    },
    roadmap::{
        PhaseTransition, RemediationPlanner, RemediationPosture, RoadmapState, RoadmapStatus,
        RoadmapTransitions, SlotFlag, SlotStatus, TaskInstance, resolve_template, validate,
    },
    skills::{SkillEvidence, SkillUpdate, SkillUpdateEngine},
    store::{LearningStateStore, RoadmapRepository},
    telemetry::{DecisionOutcome, DecisionTrace, EngineTelemetryEvent, TelemetrySink},
};

const MANUAL_MODEL_NAME: &str = "manual";
const MANUAL_PROMPT_VERSION: &str = "manual";

/// Use-case layer over one user's roadmap. Every mutating call loads the
/// roadmap, checks preconditions, mutates, validates and commits against the
/// version it loaded. Conflicts are surfaced, never retried here.
pub struct SlotOrchestrator {
    roadmaps: Arc<dyn RoadmapRepository>,
    learning: Arc<dyn LearningStateStore>,
    curriculum: Arc<dyn CurriculumProvider>,
    pipeline: Arc<EvaluationPipeline>,
    control: Arc<ControlLoop>,
    hints: Arc<dyn HintGeneratorPort>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SlotOrchestrator {
    pub fn new(
        roadmaps: Arc<dyn RoadmapRepository>,
        learning: Arc<dyn LearningStateStore>,
        curriculum: Arc<dyn CurriculumProvider>,
        pipeline: Arc<EvaluationPipeline>,
        control: Arc<ControlLoop>,
        hints: Arc<dyn HintGeneratorPort>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            roadmaps,
            learning,
            curriculum,
            pipeline,
            control,
            hints,
            telemetry,
        }
    }

    pub fn control(&self) -> &Arc<ControlLoop> {
        &self.control
    }

    pub async fn initialize_roadmap(
        &self,
        user_id: &str,
        goal: &str,
    ) -> Result<RoadmapState, EngineError> {
        if self.roadmaps.load(user_id).await?.is_some() {
            return Err(business_conflict(format!(
                "roadmap for '{}' already exists",
                user_id
            )));
        }

        let curriculum = self.curriculum.snapshot()?;
        let roadmap =
            RoadmapState::from_curriculum(user_id, goal, &curriculum, OffsetDateTime::now_utc());
        validate(&roadmap)?;
        self.roadmaps.create(&roadmap).await?;
        info!(
            target: "orchestrator",
            user_id = user_id,
            track_id = %curriculum.track_id,
            phases = roadmap.phases.len(),
            "roadmap_initialized"
        );
        Ok(roadmap)
    }

    pub async fn get_roadmap(&self, user_id: &str) -> Result<RoadmapState, EngineError> {
        self.load_roadmap(user_id).await
    }

    pub async fn start_slot(
        &self,
        user_id: &str,
        slot_id: &str,
    ) -> Result<StartSlotResult, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut roadmap = self.load_roadmap(user_id).await?;
        let expected_version = roadmap.version;

        if let Some(active) = roadmap.in_progress_slot() {
            return Err(business_conflict(format!(
                "slot '{}' is already in progress; finish it before starting '{}'",
                active.slot_id, slot_id
            )));
        }
        let slot = roadmap
            .slot(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        let policy = self
            .slot_definition(slot_id)
            .map(|definition| definition.remediation)
            .unwrap_or_default();
        let candidates = self.curriculum.templates_for_slot(slot_id)?;
        let template = resolve_template(slot, &candidates, &policy)?;

        let instance = RoadmapTransitions::start_slot(&mut roadmap, slot_id, &template, now)?;
        validate(&roadmap)?;
        let version = self.roadmaps.commit(&roadmap, expected_version).await?;
        info!(
            target: "orchestrator",
            user_id = user_id,
            slot_id = slot_id,
            task_instance_id = %instance.task_instance_id,
            task_template_id = %instance.task_template_id,
            version = version,
            "slot_started"
        );

        let hint = self.generate_hint(user_id, &instance).await;
        Ok(StartSlotResult {
            slot_id: instance.slot_id,
            task_instance_id: instance.task_instance_id,
            task_template_id: instance.task_template_id,
            difficulty: instance.difficulty,
            question_type: instance.question_type,
            hint,
            version,
        })
    }

    pub async fn submit_slot(
        &self,
        user_id: &str,
        slot_id: &str,
        submission: Submission,
    ) -> Result<SubmitSlotResult, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut roadmap = self.load_roadmap(user_id).await?;
        let expected_version = roadmap.version;

        if roadmap.status != RoadmapStatus::Active {
            return Err(invalid_request(format!(
                "roadmap for '{}' is {:?}; submissions are not accepted",
                user_id, roadmap.status
            )));
        }
        let instance = self.active_instance(&roadmap, slot_id)?;
        let definition = self.slot_definition(slot_id);
        let pass_score = self.pass_score(slot_id, definition.as_ref());
        let policy = definition
            .as_ref()
            .map(|definition| definition.remediation.clone())
            .unwrap_or_default();
        let unlocks = definition
            .as_ref()
            .map(|definition| definition.unlocks.clone())
            .unwrap_or_default();
        let template = self.curriculum.template(&instance.task_template_id)?;

        let slot = roadmap
            .slot_mut(slot_id)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
        let outcome = self
            .pipeline
            .run(slot, &instance, template.as_ref(), &submission, pass_score, now)
            .await?;
        let directional_drift = has_directional_drift(&slot.history_scores());
        let was_remediating = slot.remediation.was_remediated();
        let passed = outcome.evaluation.passed;

        RoadmapTransitions::finish_active_task(&mut roadmap, slot_id, passed, now)?;
        let frozen = self.control.status().is_frozen();
        let mut unlocked = Vec::new();
        let mut remediation = None;
        if passed {
            unlocked = RoadmapTransitions::record_pass(&mut roadmap, slot_id, &unlocks)?;
            if was_remediating {
                unlocked.extend(RemediationPlanner::release_dependents(
                    &mut roadmap,
                    slot_id,
                    frozen,
                ));
            }
        } else {
            let plan = RemediationPlanner::plan(&roadmap, slot_id, &policy, &unlocks)?;
            RemediationPlanner::apply(&mut roadmap, &plan)?;
            remediation = Some(plan);
        }
        if let Some(notice) = &outcome.notice {
            prefix_user_message(&mut roadmap, slot_id, notice);
        }
        let phase_transitions = RoadmapTransitions::resolve_active_phase(&mut roadmap);

        validate(&roadmap)?;
        let version = self.roadmaps.commit(&roadmap, expected_version).await?;

        let evidence = SkillEvidence {
            task_instance_id: instance.task_instance_id.clone(),
            skill: instance.skill.clone(),
            difficulty: instance.difficulty,
            question_type: instance.question_type,
        };
        let skill_update = self
            .apply_skill_update(user_id, &outcome.evaluation, &evidence, &outcome.flags, now)
            .await;

        self.control.record_evaluation(EvaluationSignal {
            score: outcome.evaluation.score,
            confidence: outcome.evaluation.confidence,
            drift_detected: outcome.flags.contains(&SlotFlag::ScoreDriftDetected),
            directional_drift,
            observed_at: now,
        });
        self.telemetry.on_event(EngineTelemetryEvent::EvaluationFinalized {
            user_id: user_id.to_string(),
            slot_id: slot_id.to_string(),
            score: outcome.evaluation.score,
            confidence: outcome.evaluation.confidence,
            passed,
            double_pass_used: outcome.double_pass_used,
        });

        let slot = roadmap
            .slot(slot_id)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
        let decision = match &remediation {
            None => DecisionOutcome::Pass,
            Some(plan) if plan.posture.is_exhausted() => DecisionOutcome::Locked,
            Some(_) => DecisionOutcome::Remediation,
        };
        let trace = DecisionTrace {
            user_id: user_id.to_string(),
            slot_id: slot_id.to_string(),
            task_instance_id: instance.task_instance_id.clone(),
            raw_score: outcome.raw_score,
            final_score: outcome.evaluation.score,
            confidence: outcome.evaluation.confidence,
            pass_score,
            rules_triggered: rules_triggered(
                &outcome,
                remediation.as_ref().map(|plan| &plan.posture),
                !unlocked.is_empty(),
                &phase_transitions,
                &skill_update,
            ),
            flags: outcome.flags.iter().copied().collect(),
            outcome: decision,
            slot_status: slot.status,
            roadmap_status: roadmap.status,
            user_message: slot.user_message.clone(),
        };
        info!(
            target: "orchestrator",
            user_id = user_id,
            slot_id = slot_id,
            outcome = decision.as_str(),
            slot_status = ?slot.status,
            roadmap_status = ?roadmap.status,
            version = version,
            "slot_submission_decided"
        );
        self.telemetry
            .on_event(EngineTelemetryEvent::Decision(Box::new(trace)));

        Ok(SubmitSlotResult {
            slot_id: slot_id.to_string(),
            task_instance_id: instance.task_instance_id,
            outcome: decision,
            slot_status: slot.status,
            roadmap_status: roadmap.status,
            user_message: slot.user_message.clone(),
            evaluation: outcome,
            remediation,
            unlocked,
            phase_transitions,
            skill_update,
            version,
        })
    }

    pub async fn complete_slot(
        &self,
        user_id: &str,
        slot_id: &str,
        success: bool,
    ) -> Result<CompleteSlotResult, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut roadmap = self.load_roadmap(user_id).await?;
        let expected_version = roadmap.version;

        let instance = self.active_instance(&roadmap, slot_id)?;
        let unlocks = self
            .slot_definition(slot_id)
            .map(|definition| definition.unlocks)
            .unwrap_or_default();
        let (was_remediating, flags) = roadmap
            .slot(slot_id)
            .map(|slot| (slot.remediation.was_remediated(), slot.flags.clone()))
            .unwrap_or_default();

        let mut unlocked = Vec::new();
        let previously_locked: Vec<SlotId> = roadmap
            .slots()
            .filter(|slot| slot.status == SlotStatus::Locked)
            .map(|slot| slot.slot_id.clone())
            .collect();
        let (_, mut phase_transitions) =
            RoadmapTransitions::complete_directly(&mut roadmap, slot_id, success, &unlocks, now)?;
        if success && was_remediating {
            let frozen = self.control.status().is_frozen();
            unlocked.extend(RemediationPlanner::release_dependents(
                &mut roadmap,
                slot_id,
                frozen,
            ));
            phase_transitions.extend(RoadmapTransitions::resolve_active_phase(&mut roadmap));
        }
        for slot in roadmap.slots() {
            if slot.status != SlotStatus::Locked
                && previously_locked.contains(&slot.slot_id)
                && !unlocked.contains(&slot.slot_id)
            {
                unlocked.push(slot.slot_id.clone());
            }
        }

        let evaluation = self.manual_evaluation(user_id, &instance, success).await?;
        validate(&roadmap)?;
        let version = self.roadmaps.commit(&roadmap, expected_version).await?;

        let evidence = SkillEvidence {
            task_instance_id: instance.task_instance_id.clone(),
            skill: instance.skill.clone(),
            difficulty: instance.difficulty,
            question_type: instance.question_type,
        };
        let skill_update = self
            .apply_skill_update(user_id, &evaluation, &evidence, &flags, now)
            .await;

        let slot_status = roadmap
            .slot(slot_id)
            .map(|slot| slot.status)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
        info!(
            target: "orchestrator",
            user_id = user_id,
            slot_id = slot_id,
            success = success,
            slot_status = ?slot_status,
            version = version,
            "slot_completed_directly"
        );
        Ok(CompleteSlotResult {
            slot_id: slot_id.to_string(),
            task_instance_id: instance.task_instance_id,
            success,
            slot_status,
            roadmap_status: roadmap.status,
            unlocked,
            phase_transitions,
            skill_update,
            version,
        })
    }

    pub async fn remediate_slot(
        &self,
        user_id: &str,
        slot_id: &str,
    ) -> Result<RemediateSlotResult, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut roadmap = self.load_roadmap(user_id).await?;
        let expected_version = roadmap.version;

        RoadmapTransitions::force_remediation(&mut roadmap, slot_id, now)?;
        validate(&roadmap)?;
        let version = self.roadmaps.commit(&roadmap, expected_version).await?;

        let slot = roadmap
            .slot(slot_id)
            .ok_or_else(|| internal_error(format!("slot '{}' vanished", slot_id)))?;
        Ok(RemediateSlotResult {
            slot_id: slot_id.to_string(),
            slot_status: slot.status,
            user_message: slot.user_message.clone(),
            version,
        })
    }

    pub async fn reinstate_roadmap(&self, user_id: &str) -> Result<ReinstateResult, EngineError> {
        let mut roadmap = self.load_roadmap(user_id).await?;
        let expected_version = roadmap.version;

        let slot_id = RoadmapTransitions::reinstate(&mut roadmap)?;
        validate(&roadmap)?;
        let version = self.roadmaps.commit(&roadmap, expected_version).await?;
        info!(
            target: "orchestrator",
            user_id = user_id,
            slot_id = %slot_id,
            version = version,
            "roadmap_reinstated"
        );
        Ok(ReinstateResult {
            slot_id,
            current_phase: roadmap.current_phase,
            version,
        })
    }

    pub fn system_status(&self) -> Arc<SystemStatus> {
        self.control.status()
    }

    pub fn freeze(&self, reason: impl Into<String>) -> Arc<SystemStatus> {
        self.control.freeze(reason, OffsetDateTime::now_utc())
    }

    pub fn unfreeze(&self, reason: impl Into<String>) -> Arc<SystemStatus> {
        self.control.unfreeze(reason, OffsetDateTime::now_utc())
    }

    pub fn set_dampening(
        &self,
        factor: f64,
        reason: impl Into<String>,
    ) -> Result<Arc<SystemStatus>, EngineError> {
        self.control
            .set_dampening(factor, reason, OffsetDateTime::now_utc())
    }

    async fn load_roadmap(&self, user_id: &str) -> Result<RoadmapState, EngineError> {
        self.roadmaps
            .load(user_id)
            .await?
            .ok_or_else(|| not_found(format!("no roadmap for '{}'", user_id)))
    }

    fn active_instance(
        &self,
        roadmap: &RoadmapState,
        slot_id: &str,
    ) -> Result<TaskInstance, EngineError> {
        let slot = roadmap
            .slot(slot_id)
            .ok_or_else(|| invalid_request(format!("unknown slot '{}'", slot_id)))?;
        if slot.status != SlotStatus::InProgress {
            return Err(invalid_request(format!(
                "slot '{}' is {:?}, not in progress",
                slot_id, slot.status
            )));
        }
        let instance_id = slot.active_task_instance_id.as_deref().ok_or_else(|| {
            internal_error(format!("slot '{}' in progress without task instance", slot_id))
        })?;
        roadmap.task_instance(instance_id).cloned().ok_or_else(|| {
            internal_error(format!(
                "slot '{}' references unknown task instance '{}'",
                slot_id, instance_id
            ))
        })
    }

    fn slot_definition(&self, slot_id: &str) -> Option<SlotDefinition> {
        match self.curriculum.slot_definition(slot_id) {
            Ok(definition) => definition,
            Err(err) => {
                warn!(
                    target: "orchestrator",
                    slot_id = slot_id,
                    error = %err,
                    "slot_definition_lookup_failed"
                );
                None
            }
        }
    }

    fn pass_score(&self, slot_id: &str, definition: Option<&SlotDefinition>) -> f64 {
        match definition {
            Some(definition) => definition.mastery.pass_score,
            None => {
                let fallback = self.pipeline.config().default_pass_score;
                warn!(
                    target: "orchestrator",
                    slot_id = slot_id,
                    pass_score = fallback,
                    "pass_score_fallback_used"
                );
                fallback
            }
        }
    }

    /// Runs after the roadmap commit, so a store failure is reported in the
    /// result instead of failing an action that is already persisted.
    async fn apply_skill_update(
        &self,
        user_id: &str,
        evaluation: &AIEvaluationResult,
        evidence: &SkillEvidence,
        flags: &BTreeSet<SlotFlag>,
        now: OffsetDateTime,
    ) -> SkillUpdate {
        match self
            .try_apply_skill_update(user_id, evaluation, evidence, flags, now)
            .await
        {
            Ok(update) => update,
            Err(err) => {
                warn!(
                    target: "orchestrator",
                    user_id = user_id,
                    skill = %evidence.skill,
                    task_instance_id = %evidence.task_instance_id,
                    error = %err,
                    "skill_update_failed_after_commit"
                );
                SkillUpdate::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn try_apply_skill_update(
        &self,
        user_id: &str,
        evaluation: &AIEvaluationResult,
        evidence: &SkillEvidence,
        flags: &BTreeSet<SlotFlag>,
        now: OffsetDateTime,
    ) -> Result<SkillUpdate, EngineError> {
        let state = self.learning.load(user_id).await?;
        let status = self.control.status();
        let update = SkillUpdateEngine::plan(&state, evaluation, evidence, flags, &status, now);
        match &update {
            SkillUpdate::Applied(plan) => {
                self.learning
                    .apply_entries(user_id, plan.entries.clone(), now)
                    .await?;
                self.telemetry.on_event(EngineTelemetryEvent::SkillUpdateApplied {
                    user_id: user_id.to_string(),
                    skills: plan.entries.len(),
                });
            }
            SkillUpdate::Suppressed { mode, .. } => {
                self.telemetry
                    .on_event(EngineTelemetryEvent::SkillUpdateSuppressed {
                        user_id: user_id.to_string(),
                        mode: *mode,
                    });
            }
            SkillUpdate::Failed { .. } => {}
        }
        Ok(update)
    }

    async fn manual_evaluation(
        &self,
        user_id: &str,
        instance: &TaskInstance,
        success: bool,
    ) -> Result<AIEvaluationResult, EngineError> {
        let state = self.learning.load(user_id).await?;
        let prompt_version = state
            .skill_vector
            .get(&instance.skill)
            .and_then(|entry| entry.evidence_summary.last_prompt_version.clone())
            .unwrap_or_else(|| MANUAL_PROMPT_VERSION.to_string());
        Ok(AIEvaluationResult {
            passed: success,
            score: if success { 1.0 } else { 0.0 },
            confidence: 1.0,
            partial_credit: 0.0,
            feedback: "Completed manually.".to_string(),
            detected_concepts: Vec::new(),
            mistakes: Vec::new(),
            model_name: MANUAL_MODEL_NAME.to_string(),
            model_version: MANUAL_MODEL_NAME.to_string(),
            prompt_version,
            temperature: 0.0,
        })
    }

    async fn generate_hint(&self, user_id: &str, instance: &TaskInstance) -> Option<String> {
        let skill_levels = match self.learning.load(user_id).await {
            Ok(state) => state.levels(),
            Err(err) => {
                warn!(target: "orchestrator", user_id = user_id, error = %err, "hint_skill_levels_unavailable");
                return None;
            }
        };
        let request = HintRequest {
            user_id: user_id.to_string(),
            slot_id: instance.slot_id.clone(),
            skill: instance.skill.clone(),
            difficulty: instance.difficulty,
            task_template_id: instance.task_template_id.clone(),
            skill_levels,
        };
        match self.hints.generate_hint(request).await {
            Ok(hint) => hint,
            Err(err) => {
                warn!(
                    target: "orchestrator",
                    user_id = user_id,
                    slot_id = %instance.slot_id,
                    error = %err,
                    "hint_generation_failed"
                );
                None
            }
        }
    }
}

fn prefix_user_message(roadmap: &mut RoadmapState, slot_id: &str, notice: &str) {
    if let Some(slot) = roadmap.slot_mut(slot_id) {
        slot.user_message = Some(match slot.user_message.take() {
            Some(message) => format!("{notice} {message}"),
            None => notice.to_string(),
        });
    }
}

fn rules_triggered(
    outcome: &EvaluationOutcome,
    posture: Option<&RemediationPosture>,
    unlocked_any: bool,
    phase_transitions: &[PhaseTransition],
    skill_update: &SkillUpdate,
) -> Vec<String> {
    let mut rules = Vec::new();
    if outcome.double_pass_used {
        rules.push("edge_case_double_pass".to_string());
    }
    for flag in &outcome.flags {
        if *flag != SlotFlag::DoublePassUsed {
            rules.push(flag.as_str().to_string());
        }
    }
    if outcome.stability_factor < 1.0 {
        rules.push("confidence_stability_decay".to_string());
    }
    for penalty in &outcome.penalties {
        rules.push(
            match penalty {
                IntegrityPenalty::HintUsed { .. } => "hint_penalty",
                IntegrityPenalty::FastSubmission { .. } => "fast_submission_penalty",
            }
            .to_string(),
        );
    }
    if outcome.near_miss {
        rules.push("near_miss_partial_credit".to_string());
    }
    match posture {
        Some(RemediationPosture::Enter { .. }) => rules.push("remediation_entered".to_string()),
        Some(RemediationPosture::Advance { .. }) => {
            rules.push("remediation_advanced".to_string())
        }
        Some(RemediationPosture::Exhausted { .. }) => {
            rules.push("remediation_exhausted".to_string())
        }
        None => {}
    }
    if unlocked_any {
        rules.push("successors_unlocked".to_string());
    }
    for transition in phase_transitions {
        match transition {
            PhaseTransition::PhaseCompleted { .. } => rules.push("phase_completed".to_string()),
            PhaseTransition::RoadmapCompleted => rules.push("roadmap_completed".to_string()),
            _ => {}
        }
    }
    match skill_update {
        SkillUpdate::Suppressed { .. } => rules.push("skill_update_suppressed".to_string()),
        SkillUpdate::Failed { .. } => rules.push("skill_update_failed".to_string()),
        SkillUpdate::Applied(_) => {}
    }
    rules
}
