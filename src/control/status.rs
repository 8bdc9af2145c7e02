use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    Normal,
    Dampened,
    SafeMode,
    Frozen,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMode::Normal => "NORMAL",
            SystemMode::Dampened => "DAMPENED",
            SystemMode::SafeMode => "SAFE_MODE",
            SystemMode::Frozen => "FROZEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeOrigin {
    Administrative,
    Calibration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub mode: SystemMode,
    pub dampening_factor: f64,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked_at: OffsetDateTime,
    #[serde(default)]
    pub freeze_origin: Option<FreezeOrigin>,
}

impl SystemStatus {
    pub fn startup(now: OffsetDateTime) -> Self {
        Self {
            mode: SystemMode::Normal,
            dampening_factor: 1.0,
            reason: "system startup".to_string(),
            entered_at: now,
            last_checked_at: now,
            freeze_origin: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.mode == SystemMode::Frozen
    }
}

#[derive(Debug, Clone)]
pub struct SystemStatusHandle {
    current: Arc<RwLock<Arc<SystemStatus>>>,
}

impl SystemStatusHandle {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(SystemStatus::startup(now)))),
        }
    }

    pub fn snapshot(&self) -> Arc<SystemStatus> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.snapshot().is_frozen()
    }

    /// Enters `mode`. FROZEN forces the dampening factor to 0 and NORMAL to 1;
    /// other modes take `dampening_factor`, or keep the current one.
    pub fn transition(
        &self,
        mode: SystemMode,
        reason: impl Into<String>,
        dampening_factor: Option<f64>,
        freeze_origin: Option<FreezeOrigin>,
        now: OffsetDateTime,
    ) -> Arc<SystemStatus> {
        let reason = reason.into();
        self.update(|current| {
            let dampening_factor = match mode {
                SystemMode::Frozen => 0.0,
                SystemMode::Normal => 1.0,
                SystemMode::Dampened | SystemMode::SafeMode => dampening_factor
                    .unwrap_or(current.dampening_factor)
                    .clamp(0.0, 1.0),
            };
            SystemStatus {
                mode,
                dampening_factor,
                reason,
                entered_at: now,
                last_checked_at: now,
                freeze_origin: match mode {
                    SystemMode::Frozen => freeze_origin.or(Some(FreezeOrigin::Administrative)),
                    _ => None,
                },
            }
        })
    }

    pub fn mark_checked(&self, now: OffsetDateTime) -> Arc<SystemStatus> {
        self.update(|current| SystemStatus {
            last_checked_at: now,
            ..current.clone()
        })
    }

    fn update(&self, next: impl FnOnce(&SystemStatus) -> SystemStatus) -> Arc<SystemStatus> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let updated = Arc::new(next(&guard));
        *guard = Arc::clone(&updated);
        updated
    }
}

impl Default for SystemStatusHandle {
    fn default() -> Self {
        Self::new(OffsetDateTime::now_utc())
    }
}
