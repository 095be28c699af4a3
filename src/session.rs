use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Activity;
use crate::fix::Metrics;

/// One finished session, as appended to the session log. Summaries only;
/// the track itself is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub ended_at: DateTime<Local>,
    pub activity: String,
    pub duration_ms: u64,
    pub distance_m: f64,
    pub average_speed_mps: f64,
    pub altitude_gain_m: f64,
    pub altitude_loss_m: f64,
}

impl SessionSummary {
    pub fn from_metrics(activity: Activity, metrics: &Metrics) -> Self {
        Self {
            ended_at: Local::now(),
            activity: activity.to_string(),
            duration_ms: metrics.duration_ms,
            distance_m: metrics.distance_m,
            average_speed_mps: metrics.average_speed_mps,
            altitude_gain_m: metrics.altitude_gain_m,
            altitude_loss_m: metrics.altitude_loss_m,
        }
    }
}

/// Append-only CSV log of session summaries.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, summary: &SessionSummary) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Emit the header only when creating the file.
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(summary)?;
        writer.flush()?;
        Ok(())
    }

    /// Most recent sessions, newest first. Missing log means no history.
    pub fn recent(&self, limit: usize) -> Vec<SessionSummary> {
        let Ok(mut reader) = csv::Reader::from_path(&self.path) else {
            return Vec::new();
        };
        reader
            .deserialize::<SessionSummary>()
            .filter_map(Result::ok)
            .sorted_by(|a, b| b.ended_at.cmp(&a.ended_at))
            .take(limit)
            .collect()
    }
}
