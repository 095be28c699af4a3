use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of outdoor activity being tracked. Selects the polling and
/// staleness preset; a faster sport wants fresher fixes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum_macros::Display, Serialize, Deserialize,
)]
pub enum Activity {
    Walking,
    Running,
    Cycling,
}

impl Activity {
    /// Steady-state polling period once a stable fix exists.
    pub fn update_interval_ms(self) -> u64 {
        match self {
            Activity::Walking => 10_000,
            Activity::Running => 5_000,
            Activity::Cycling => 2_000,
        }
    }

    /// How old a fix may be before it is discarded as stale.
    pub fn max_fix_age_ms(self) -> i64 {
        match self {
            Activity::Walking => 300_000,
            Activity::Running => 120_000,
            Activity::Cycling => 60_000,
        }
    }
}

/// Runtime configuration of the session tracker.
///
/// Set at session creation; setters may be called between fixes but the
/// tracker never mutates it concurrently with fix processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Steady-state polling period commanded to the source once warm-up
    /// completes, milliseconds.
    pub update_interval_ms: u64,
    /// Number of leading accepted fixes discarded before position deltas
    /// are trusted. The first fix after acquisition is frequently the
    /// device's cached last-known position, arbitrarily old.
    pub warmup_count: u32,
    /// Staleness threshold relative to processing time, milliseconds.
    pub max_fix_age_ms: i64,
    /// Hard gate: reject fixes whose accuracy radius exceeds this, meters.
    pub min_horizontal_accuracy_m: Option<f64>,
    /// When true (the default), fixes must carry an accuracy radius and
    /// position deltas below the combined accuracy of both endpoints are
    /// treated as jitter. When false, deltas are taken at face value and
    /// sensor-reported ground speed is preferred for current speed.
    pub accuracy_aware: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 5_000,
            warmup_count: 4,
            max_fix_age_ms: 300_000,
            min_horizontal_accuracy_m: None,
            accuracy_aware: true,
        }
    }
}

impl TrackerConfig {
    pub fn for_activity(activity: Activity) -> Self {
        Self {
            update_interval_ms: activity.update_interval_ms(),
            max_fix_age_ms: activity.max_fix_age_ms(),
            ..Self::default()
        }
    }
}

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub activity: Activity,
    pub update_interval_ms: Option<u64>,
    pub warmup_count: Option<u32>,
    pub min_horizontal_accuracy_m: Option<f64>,
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activity: Activity::Walking,
            update_interval_ms: None,
            warmup_count: None,
            min_horizontal_accuracy_m: None,
            notifications: true,
        }
    }
}

impl Config {
    /// Resolves the activity preset plus any explicit overrides into the
    /// tracker's runtime configuration.
    pub fn tracker_config(&self) -> TrackerConfig {
        let mut tc = TrackerConfig::for_activity(self.activity);
        if let Some(interval) = self.update_interval_ms {
            tc.update_interval_ms = interval;
        }
        if let Some(count) = self.warmup_count {
            tc.warmup_count = count;
        }
        if self.min_horizontal_accuracy_m.is_some() {
            tc.min_horizontal_accuracy_m = self.min_horizontal_accuracy_m;
        }
        tc
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "pacer") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("pacer_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
