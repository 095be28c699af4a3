use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::fix::{Coordinate, PositionFix};

/// Discrete events emitted by a position source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    Fix(PositionFix),
    /// The source failed to produce a fix within its polling interval.
    Timeout,
    Error(SourceError),
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum SourceError {
    #[error("no positioning capability on this platform")]
    Unavailable,
    #[error("access to positioning denied")]
    AccessDenied,
    #[error("position source reported error code {0}")]
    Device(i32),
}

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error("failed to read recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse recording: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("recording contains no fixes")]
    Empty,
}

/// External collaborator producing position fixes.
///
/// Events travel out-of-band through the `mpsc::Sender<SourceEvent>` handed
/// to the concrete source at construction; this trait only carries the
/// commands the tracker issues back.
pub trait PositionSource {
    fn start(&mut self);
    fn stop(&mut self);
    /// 0 means continuous/fast acquisition.
    fn set_polling_interval(&mut self, interval_ms: u64);
}

/// Commands recorded by [`ScriptedSource`], for asserting in tests.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceCommand {
    Start,
    Stop,
    SetPollingInterval(u64),
}

/// Test double that records every command and emits nothing by itself;
/// tests push events straight into the tracker.
#[derive(Default)]
pub struct ScriptedSource {
    commands: Rc<RefCell<Vec<SourceCommand>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the command log.
    pub fn commands(&self) -> Rc<RefCell<Vec<SourceCommand>>> {
        Rc::clone(&self.commands)
    }
}

impl PositionSource for ScriptedSource {
    fn start(&mut self) {
        self.commands.borrow_mut().push(SourceCommand::Start);
    }

    fn stop(&mut self) {
        self.commands.borrow_mut().push(SourceCommand::Stop);
    }

    fn set_polling_interval(&mut self, interval_ms: u64) {
        self.commands
            .borrow_mut()
            .push(SourceCommand::SetPollingInterval(interval_ms));
    }
}

/// Demo source emitting plausible fixes around a starting point, so the
/// dashboard can be exercised without positioning hardware.
pub struct SimulatedSource {
    tx: Sender<SourceEvent>,
    running: Arc<AtomicBool>,
    interval_ms: Arc<AtomicU64>,
}

impl SimulatedSource {
    pub fn new(tx: Sender<SourceEvent>) -> Self {
        Self {
            tx,
            running: Arc::new(AtomicBool::new(false)),
            interval_ms: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Floor applied to the simulated emission period; interval 0 would
/// otherwise busy-loop.
const SIM_MIN_PERIOD_MS: u64 = 200;

impl PositionSource for SimulatedSource {
    fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("starting simulated position source");

        let tx = self.tx.clone();
        let running = Arc::clone(&self.running);
        let interval_ms = Arc::clone(&self.interval_ms);

        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            // Somewhere in central Prague, heading roughly north.
            let mut latitude = 50.0755;
            let mut longitude = 14.4378;
            let mut altitude = 200.0;
            let mut heading: f64 = rng.gen_range(0.0..360.0);
            let speed_mps = 2.5;

            while running.load(Ordering::SeqCst) {
                let period = interval_ms.load(Ordering::SeqCst).max(SIM_MIN_PERIOD_MS);
                thread::sleep(Duration::from_millis(period));
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                heading += rng.gen_range(-15.0..15.0);
                let step_m = speed_mps * (period as f64 / 1000.0);
                latitude += step_m * heading.to_radians().cos() / 111_190.0;
                longitude += step_m * heading.to_radians().sin()
                    / (111_190.0 * latitude.to_radians().cos());
                altitude += rng.gen_range(-1.0..1.2);

                let now_ms = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);

                let fix = PositionFix::new(
                    now_ms,
                    Coordinate::with_altitude(latitude, longitude, altitude),
                )
                .with_accuracy(rng.gen_range(3.0..12.0))
                .with_ground_speed(speed_mps);

                if tx.send(SourceEvent::Fix(fix)).is_err() {
                    break;
                }
            }
        });
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_polling_interval(&mut self, interval_ms: u64) {
        self.interval_ms.store(interval_ms, Ordering::SeqCst);
    }
}

/// Source replaying a JSON recording of fixes.
///
/// Timestamps are rebased so the first fix appears current and the original
/// gaps are preserved; emission is paced by those gaps, capped so long
/// recordings replay quickly.
pub struct ReplaySource {
    tx: Sender<SourceEvent>,
    fixes: Vec<PositionFix>,
    running: Arc<AtomicBool>,
}

/// Cap on the pause between replayed fixes.
const REPLAY_MAX_PAUSE_MS: u64 = 1_000;

impl ReplaySource {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        tx: Sender<SourceEvent>,
    ) -> Result<Self, ReplayError> {
        let bytes = fs::read(path)?;
        let fixes: Vec<PositionFix> = serde_json::from_slice(&bytes)?;
        if fixes.is_empty() {
            return Err(ReplayError::Empty);
        }
        Ok(Self {
            tx,
            fixes,
            running: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl PositionSource for ReplaySource {
    fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(fixes = self.fixes.len(), "starting replay source");

        let tx = self.tx.clone();
        let running = Arc::clone(&self.running);
        let fixes = self.fixes.clone();

        thread::spawn(move || {
            let now_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            let origin = fixes[0].timestamp_ms;

            let mut previous_ts = origin;
            for mut fix in fixes {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let gap = (fix.timestamp_ms - previous_ts).max(0) as u64;
                previous_ts = fix.timestamp_ms;
                thread::sleep(Duration::from_millis(gap.min(REPLAY_MAX_PAUSE_MS)));

                fix.timestamp_ms = now_ms + (fix.timestamp_ms - origin);
                if tx.send(SourceEvent::Fix(fix)).is_err() {
                    break;
                }
            }

            if running.load(Ordering::SeqCst) {
                warn!("replay recording exhausted");
                let _ = tx.send(SourceEvent::Timeout);
            }
        });
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_polling_interval(&mut self, _interval_ms: u64) {
        // Replay pacing comes from the recording itself.
    }
}
