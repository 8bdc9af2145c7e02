use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::curriculum::{Difficulty, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub curriculum: CurriculumConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/roadmap")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

fn default_pass_score() -> f64 {
    0.6
}

fn default_edge_case_band() -> f64 {
    0.05
}

fn default_near_miss_band() -> f64 {
    0.15
}

fn default_hint_penalty() -> f64 {
    0.8
}

fn default_fast_submission_seconds() -> f64 {
    10.0
}

fn default_fast_submission_factor() -> f64 {
    0.5
}

fn default_fast_exempt_question_types() -> Vec<QuestionType> {
    vec![QuestionType::Mcq]
}

fn default_fast_exempt_difficulties() -> Vec<Difficulty> {
    vec![Difficulty::Easy]
}

fn default_low_confidence_threshold() -> f64 {
    0.4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Used only when the curriculum cannot supply a slot's pass score.
    #[serde(default = "default_pass_score")]
    pub default_pass_score: f64,
    #[serde(default = "default_edge_case_band")]
    pub edge_case_band: f64,
    #[serde(default = "default_near_miss_band")]
    pub near_miss_band: f64,
    #[serde(default = "default_hint_penalty")]
    pub hint_penalty: f64,
    #[serde(default = "default_fast_submission_seconds")]
    pub fast_submission_seconds: f64,
    #[serde(default = "default_fast_submission_factor")]
    pub fast_submission_score_factor: f64,
    #[serde(default = "default_fast_submission_factor")]
    pub fast_submission_confidence_factor: f64,
    #[serde(default = "default_fast_exempt_question_types")]
    pub fast_submission_exempt_question_types: Vec<QuestionType>,
    #[serde(default = "default_fast_exempt_difficulties")]
    pub fast_submission_exempt_difficulties: Vec<Difficulty>,
    #[serde(default = "default_enabled_true")]
    pub fast_submission_exempt_reattempts: bool,
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_pass_score: default_pass_score(),
            edge_case_band: default_edge_case_band(),
            near_miss_band: default_near_miss_band(),
            hint_penalty: default_hint_penalty(),
            fast_submission_seconds: default_fast_submission_seconds(),
            fast_submission_score_factor: default_fast_submission_factor(),
            fast_submission_confidence_factor: default_fast_submission_factor(),
            fast_submission_exempt_question_types: default_fast_exempt_question_types(),
            fast_submission_exempt_difficulties: default_fast_exempt_difficulties(),
            fast_submission_exempt_reattempts: true,
            low_confidence_threshold: default_low_confidence_threshold(),
        }
    }
}

fn default_score_std_dev_threshold() -> f64 {
    0.3
}

fn default_confidence_floor() -> f64 {
    0.6
}

fn default_drift_persistence_cycles() -> u32 {
    3
}

fn default_recovery_passes() -> u32 {
    3
}

fn default_drift_free_hours() -> u64 {
    24
}

fn default_min_samples() -> usize {
    10
}

fn default_dampened_factor() -> f64 {
    0.5
}

fn default_safe_mode_factor() -> f64 {
    0.25
}

fn default_signal_window_capacity() -> usize {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_score_std_dev_threshold")]
    pub score_std_dev_threshold: f64,
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    #[serde(default = "default_drift_persistence_cycles")]
    pub drift_persistence_cycles: u32,
    #[serde(default = "default_recovery_passes")]
    pub recovery_passes: u32,
    #[serde(default = "default_drift_free_hours")]
    pub drift_free_hours: u64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_dampened_factor")]
    pub dampened_factor: f64,
    #[serde(default = "default_safe_mode_factor")]
    pub safe_mode_factor: f64,
    #[serde(default = "default_enabled_true")]
    pub freeze_on_golden_failure: bool,
    #[serde(default = "default_signal_window_capacity")]
    pub signal_window_capacity: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            score_std_dev_threshold: default_score_std_dev_threshold(),
            confidence_floor: default_confidence_floor(),
            drift_persistence_cycles: default_drift_persistence_cycles(),
            recovery_passes: default_recovery_passes(),
            drift_free_hours: default_drift_free_hours(),
            min_samples: default_min_samples(),
            dampened_factor: default_dampened_factor(),
            safe_mode_factor: default_safe_mode_factor(),
            freeze_on_golden_failure: true,
            signal_window_capacity: default_signal_window_capacity(),
        }
    }
}

fn default_golden_tolerance() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenTask {
    pub task_id: String,
    #[serde(default)]
    pub description: String,
    pub skill: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub submission: Value,
    pub expected_score: f64,
    #[serde(default = "default_golden_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub is_failure_case: bool,
    #[serde(default)]
    pub evaluator_fingerprint: Option<String>,
}

pub fn default_golden_tasks() -> Vec<GoldenTask> {
    vec![
        GoldenTask {
            task_id: "golden_python_sum_pass".to_string(),
            description: "Simple sum function, correct".to_string(),
            skill: "python_basics".to_string(),
            difficulty: Difficulty::Easy,
            question_type: QuestionType::Coding,
            submission: json!({
                "language": "python",
                "code": "def sum_list(nums):\n    return sum(nums)"
            }),
            expected_score: 1.0,
            tolerance: 0.05,
            is_failure_case: false,
            evaluator_fingerprint: None,
        },
        GoldenTask {
            task_id: "golden_python_sum_fail".to_string(),
            description: "Simple sum function, incorrect logic".to_string(),
            skill: "python_basics".to_string(),
            difficulty: Difficulty::Easy,
            question_type: QuestionType::Coding,
            submission: json!({
                "language": "python",
                "code": "def sum_list(nums):\n    return 0"
            }),
            expected_score: 0.0,
            tolerance: 0.2,
            is_failure_case: true,
            evaluator_fingerprint: None,
        },
        GoldenTask {
            task_id: "golden_explanation_pass".to_string(),
            description: "Explain recursion, good answer".to_string(),
            skill: "computer_science".to_string(),
            difficulty: Difficulty::Medium,
            question_type: QuestionType::Explanation,
            submission: json!({
                "text": "Recursion is when a function calls itself to solve a smaller instance of the problem, until it reaches a base case."
            }),
            expected_score: 0.9,
            tolerance: 0.15,
            is_failure_case: false,
            evaluator_fingerprint: None,
        },
    ]
}

fn default_calibration_interval_seconds() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_golden_tasks")]
    pub golden_tasks: Vec<GoldenTask>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_calibration_interval_seconds(),
            golden_tasks: default_golden_tasks(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_curriculum_path() -> PathBuf {
    PathBuf::from("./curriculum.json5")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumConfig {
    #[serde(default = "default_curriculum_path")]
    pub path: PathBuf,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            path: default_curriculum_path(),
        }
    }
}

fn default_evaluator_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_evaluator_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_evaluator_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize roadmap engine config")?;

        for path in [
            &mut config.logging.dir,
            &mut config.storage.state_dir,
            &mut config.curriculum.path,
        ] {
            if !path.is_absolute() {
                *path = config_base.join(&*path);
            }
        }

        Ok(config)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join("roadmap.schema.json");
    if local_default.exists() {
        return Ok(local_default);
    }

    let crate_default = Path::new(env!("CARGO_MANIFEST_DIR")).join("roadmap.schema.json");
    if crate_default.exists() {
        return Ok(crate_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or roadmap.schema.json next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
