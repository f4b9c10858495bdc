//! Startup settings.
//!
//! Read from `LATCH_*` environment variables. Parsing is a pure function
//! over a key lookup so tests never touch the process environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;

use crate::domain::{CheckpointKey, ConfigError, CoordError, CoordinatedTask, LockName};

pub const PROFILE_ID: &str = "LATCH_PROFILE_ID";
pub const LOCK_NAME: &str = "LATCH_LOCK_NAME";
pub const LOCK_DURATION_SECS: &str = "LATCH_LOCK_DURATION_SECS";
pub const IMPORT_TASK: &str = "LATCH_IMPORT_TASK";
pub const SEED_TASK: &str = "LATCH_SEED_TASK";
pub const QUEUE_NAME: &str = "LATCH_QUEUE_NAME";
pub const BACKFILL_HOURS: &str = "LATCH_BACKFILL_HOURS";
pub const SEED_FILE: &str = "LATCH_SEED_FILE";
pub const BACKEND: &str = "LATCH_BACKEND";
pub const REDIS_URL: &str = "LATCH_REDIS_URL";

const KEYS: [&str; 10] = [
    PROFILE_ID,
    LOCK_NAME,
    LOCK_DURATION_SECS,
    IMPORT_TASK,
    SEED_TASK,
    QUEUE_NAME,
    BACKFILL_HOURS,
    SEED_FILE,
    BACKEND,
    REDIS_URL,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local stores. Only meaningful for a single worker.
    Memory,
    Redis { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatchConfig {
    pub profile_id: String,
    pub lock_name: LockName,
    pub lock_duration: Duration,
    /// Guards seeding so concurrent workers never seed at the same time.
    pub seed_lock: LockName,
    pub import_task: String,
    pub seed_task: String,
    pub queue_name: String,
    pub backfill: chrono::Duration,
    pub seed_file: Option<PathBuf>,
    pub backend: BackendKind,
}

impl LatchConfig {
    pub fn from_env() -> Result<Self, CoordError> {
        let env: Vec<(&str, String)> = KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value)))
            .collect();
        Self::from_lookup(|key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| value.clone())
        })
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoordError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let profile_id = get(PROFILE_ID).ok_or(ConfigError::Missing { key: PROFILE_ID })?;

        let lock_name = LockName::new(or_default(LOCK_NAME, "denylist-import"))?;
        let lock_duration = Duration::from_secs(positive(LOCK_DURATION_SECS, get(LOCK_DURATION_SECS), 300)?);
        let backfill_hours = positive(BACKFILL_HOURS, get(BACKFILL_HOURS), 24)?;
        let backfill = i64::try_from(backfill_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            // the first-run window starts at `now - backfill`, which must be a valid instant
            .filter(|backfill| Utc::now().checked_sub_signed(*backfill).is_some())
            .ok_or_else(|| ConfigError::Invalid {
                key: BACKFILL_HOURS,
                value: backfill_hours.to_string(),
                reason: "out of range".into(),
            })?;

        let seed_task = or_default(SEED_TASK, "denylist-seed");
        let seed_lock = LockName::new(seed_task.clone())?;

        let backend = match get(BACKEND).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("memory") => BackendKind::Memory,
            Some("redis") => BackendKind::Redis {
                url: get(REDIS_URL).ok_or(ConfigError::Missing { key: REDIS_URL })?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: BACKEND,
                    value: other.to_string(),
                    reason: "expected one of: memory, redis".into(),
                }
                .into());
            }
        };

        Ok(Self {
            profile_id,
            lock_name,
            lock_duration,
            seed_lock,
            import_task: or_default(IMPORT_TASK, "denylist-import"),
            seed_task,
            queue_name: or_default(QUEUE_NAME, "suspect-domains"),
            backfill,
            seed_file: get(SEED_FILE).map(PathBuf::from),
            backend,
        })
    }

    /// The lock-guarded import described by these settings.
    pub fn import_task(&self) -> CoordinatedTask {
        CoordinatedTask::new(
            self.lock_name.clone(),
            self.lock_duration,
            CheckpointKey::new(&self.import_task, &self.profile_id),
        )
        .with_backfill(self.backfill)
    }

    pub fn seed_marker(&self) -> CheckpointKey {
        CheckpointKey::new(&self.seed_task, &self.profile_id)
    }
}

fn positive(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".into(),
        }),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: err.to_string(),
        }),
    }
}
