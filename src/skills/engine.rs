use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    control::{SystemMode, SystemStatus},
    curriculum::{Difficulty, QuestionType},
    evaluation::{
        AIEvaluationResult,
        consistency::{DRIFT_PENALTY, LOW_CONFIDENCE_PENALTY},
    },
    roadmap::SlotFlag,
    skills::{
        delta::compute_skill_deltas,
        types::{EvidenceSummary, LearningState, SkillDeltas, SkillEntry, SourceMix},
    },
};

pub const PROMPT_VERSION_PENALTY: f64 = 0.9;
pub const MIN_POSITIVE_DELTA: f64 = 0.01;
pub const INITIAL_CONFIDENCE: f64 = 0.1;
pub const CONFIDENCE_STEP: f64 = 0.05;
pub const SOURCE_MIX_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillEvidence {
    pub task_instance_id: String,
    pub skill: String,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaAdjustment {
    StabilityPenalty { flag: SlotFlag, factor: f64 },
    Dampening { factor: f64 },
    PromptVersionShift { skill: String, from: String, to: String },
    MinimumProgress { skill: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillUpdatePlan {
    pub raw_deltas: SkillDeltas,
    pub final_deltas: SkillDeltas,
    pub adjustments: Vec<DeltaAdjustment>,
    #[serde(skip)]
    pub entries: BTreeMap<String, SkillEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SkillUpdate {
    Applied(SkillUpdatePlan),
    Suppressed { mode: SystemMode, reason: String },
    Failed { reason: String },
}

impl SkillUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, SkillUpdate::Applied(_))
    }
}

pub struct SkillUpdateEngine;

impl SkillUpdateEngine {
    pub fn plan(
        state: &LearningState,
        evaluation: &AIEvaluationResult,
        evidence: &SkillEvidence,
        flags: &BTreeSet<SlotFlag>,
        status: &SystemStatus,
        now: OffsetDateTime,
    ) -> SkillUpdate {
        if status.is_frozen() {
            warn!(
                target: "skills",
                user_id = %state.user_id,
                skill = %evidence.skill,
                "skill_update_suppressed_system_frozen"
            );
            return SkillUpdate::Suppressed {
                mode: status.mode,
                reason: status.reason.clone(),
            };
        }

        let raw_deltas = compute_skill_deltas(
            evaluation,
            evidence.difficulty,
            &evidence.skill,
            evidence.question_type,
        );
        let mut adjustments = Vec::new();

        let stability = if flags.contains(&SlotFlag::ScoreDriftDetected) {
            Some((SlotFlag::ScoreDriftDetected, DRIFT_PENALTY))
        } else if flags.contains(&SlotFlag::LowConfidenceEvaluation) {
            Some((SlotFlag::LowConfidenceEvaluation, LOW_CONFIDENCE_PENALTY))
        } else {
            None
        };
        if let Some((flag, factor)) = stability {
            adjustments.push(DeltaAdjustment::StabilityPenalty { flag, factor });
        }
        let dampening = status.dampening_factor;
        if dampening != 1.0 {
            adjustments.push(DeltaAdjustment::Dampening { factor: dampening });
        }

        let mut final_deltas = SkillDeltas::new();
        for (skill, raw) in &raw_deltas {
            let mut delta = *raw;
            if let Some((_, factor)) = stability {
                delta *= factor;
            }
            delta *= dampening;

            let last_version = state
                .skill_vector
                .get(skill)
                .and_then(|entry| entry.evidence_summary.last_prompt_version.as_deref());
            if let Some(last_version) = last_version {
                if last_version != evaluation.prompt_version {
                    delta *= PROMPT_VERSION_PENALTY;
                    adjustments.push(DeltaAdjustment::PromptVersionShift {
                        skill: skill.clone(),
                        from: last_version.to_string(),
                        to: evaluation.prompt_version.clone(),
                    });
                }
            }

            if delta > 0.0 && delta < MIN_POSITIVE_DELTA {
                delta = MIN_POSITIVE_DELTA;
                adjustments.push(DeltaAdjustment::MinimumProgress {
                    skill: skill.clone(),
                });
            }
            final_deltas.insert(skill.clone(), delta);
        }

        let entries = final_deltas
            .iter()
            .map(|(skill, delta)| {
                let entry = match state.skill_vector.get(skill) {
                    Some(existing) => {
                        updated_entry(existing, *delta, evaluation, evidence, now)
                    }
                    None => new_entry(*delta, evaluation, evidence, now),
                };
                (skill.clone(), entry)
            })
            .collect();

        debug!(
            target: "skills",
            user_id = %state.user_id,
            raw = ?raw_deltas,
            final_deltas = ?final_deltas,
            adjustments = adjustments.len(),
            "skill_update_planned"
        );

        SkillUpdate::Applied(SkillUpdatePlan {
            raw_deltas,
            final_deltas,
            adjustments,
            entries,
        })
    }
}

fn new_entry(
    delta: f64,
    evaluation: &AIEvaluationResult,
    evidence: &SkillEvidence,
    now: OffsetDateTime,
) -> SkillEntry {
    let mut entry = SkillEntry {
        level: 0.0,
        confidence: INITIAL_CONFIDENCE,
        last_updated: Some(now),
        evidence_summary: EvidenceSummary {
            total_events: 1,
            weighted_score: evaluation.score,
            last_event_id: Some(evidence.task_instance_id.clone()),
            last_prompt_version: Some(evaluation.prompt_version.clone()),
        },
        source_mix: SourceMix::tasks_only(),
        decay: Default::default(),
    };
    entry.set_level(delta);
    entry
}

fn updated_entry(
    existing: &SkillEntry,
    delta: f64,
    evaluation: &AIEvaluationResult,
    evidence: &SkillEvidence,
    now: OffsetDateTime,
) -> SkillEntry {
    let mut entry = existing.clone();
    entry.set_level(existing.level + delta);
    entry.last_updated = Some(now);
    entry.evidence_summary.total_events += 1;
    entry.evidence_summary.weighted_score += evaluation.score;
    entry.evidence_summary.last_event_id = Some(evidence.task_instance_id.clone());
    entry.evidence_summary.last_prompt_version = Some(evaluation.prompt_version.clone());
    entry.confidence = (entry.confidence + CONFIDENCE_STEP).min(1.0);
    entry.source_mix.shift_toward_tasks(SOURCE_MIX_ALPHA);
    entry
}
