pub mod calibration;
pub mod control_loop;
pub mod rules;
pub mod scheduler;
pub mod signals;
pub mod status;

pub use calibration::{CalibrationReport, CalibrationRunner, GoldenTaskOutcome};
pub use control_loop::{ControlDecision, ControlLoop};
pub use rules::{ControlInputs, ModeDecision, next_mode};
pub use scheduler::spawn_calibration_loop;
pub use signals::{EvaluationSignal, SignalMetrics, SignalWindow};
pub use status::{FreezeOrigin, SystemMode, SystemStatus, SystemStatusHandle};
