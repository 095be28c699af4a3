use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::fix::{Metrics, PositionFix};
use crate::geo;
use crate::source::{PositionSource, SourceError, SourceEvent};

/// Lifecycle phase of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Not tracking.
    Idle,
    /// Acquiring a trustworthy baseline; fixes are counted but contribute
    /// nothing to the metrics.
    Warmup,
    /// Accumulating distance, speed and altitude from accepted fixes.
    Active,
}

/// Observer notified after a state mutation that changed something a
/// presentation layer would show. Pull model: the observer reads the
/// current [`Metrics`] snapshot on demand.
pub trait MetricsObserver {
    fn on_refresh(&mut self);
}

/// Observer forwarding refresh signals into an mpsc channel, for event
/// loops that drain notifications alongside other events.
pub struct ChannelObserver {
    tx: Sender<()>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<()>) -> Self {
        Self { tx }
    }
}

impl MetricsObserver for ChannelObserver {
    fn on_refresh(&mut self) {
        let _ = self.tx.send(());
    }
}

/// Turns a stream of noisy, intermittent position fixes into session
/// metrics: active duration, cumulative distance, current and average
/// speed, cumulative ascent and descent.
///
/// Fixes are filtered for staleness and accuracy, the first
/// `warmup_count` accepted fixes only establish a baseline, and position
/// deltas below the combined accuracy radius of both endpoints are
/// discarded as jitter. Processing is single-threaded: one event at a
/// time, to completion.
pub struct SessionTracker<C: Clock> {
    config: TrackerConfig,
    clock: C,
    /// None when the platform has no positioning capability; the tracker
    /// then runs in disabled mode where every operation is a no-op.
    source: Option<Box<dyn PositionSource>>,

    phase: TrackerPhase,
    warmup_remaining: u32,
    /// Last fix used as the accumulation baseline.
    baseline: Option<PositionFix>,
    /// Monotonic instant the baseline was accepted at.
    baseline_at_mono: u64,

    partial_duration_ms: u64,
    active_since_mono: Option<u64>,

    distance_m: f64,
    current_speed_mps: f64,
    altitude_gain_m: f64,
    altitude_loss_m: f64,
    fixes_received: u64,

    notifications: bool,
    observers: Vec<Box<dyn MetricsObserver>>,
    last_error: Option<SourceError>,
}

impl<C: Clock> SessionTracker<C> {
    pub fn new(config: TrackerConfig, source: Box<dyn PositionSource>, clock: C) -> Self {
        Self::build(config, Some(source), clock)
    }

    /// Tracker for a platform without positioning capability. Every
    /// operation is a safe no-op and every query returns zero/default.
    pub fn disabled(config: TrackerConfig, clock: C) -> Self {
        warn!("position source unavailable, tracker is disabled");
        Self::build(config, None, clock)
    }

    fn build(config: TrackerConfig, source: Option<Box<dyn PositionSource>>, clock: C) -> Self {
        Self {
            config,
            clock,
            source,
            phase: TrackerPhase::Idle,
            warmup_remaining: 0,
            baseline: None,
            baseline_at_mono: 0,
            partial_duration_ms: 0,
            active_since_mono: None,
            distance_m: 0.0,
            current_speed_mps: 0.0,
            altitude_gain_m: 0.0,
            altitude_loss_m: 0.0,
            fixes_received: 0,
            notifications: true,
            observers: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.source.is_none()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn warmup_remaining(&self) -> u32 {
        self.warmup_remaining
    }

    pub fn fixes_received(&self) -> u64 {
        self.fixes_received
    }

    pub fn last_accuracy_m(&self) -> Option<f64> {
        self.baseline.and_then(|fix| fix.horizontal_accuracy_m)
    }

    pub fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }

    pub fn add_observer(&mut self, observer: Box<dyn MetricsObserver>) {
        self.observers.push(observer);
    }

    pub fn update_interval_ms(&self) -> u64 {
        self.config.update_interval_ms
    }

    /// Takes effect at the next warm-up completion, not retroactively.
    pub fn set_update_interval_ms(&mut self, interval_ms: u64) {
        self.config.update_interval_ms = interval_ms;
    }

    pub fn notifications(&self) -> bool {
        self.notifications
    }

    /// Enabling notifications immediately raises one refresh so the
    /// observer can resynchronize.
    pub fn set_notifications(&mut self, enabled: bool) {
        debug!(enabled, "setting refresh notifications");
        self.notifications = enabled;
        if enabled {
            self.notify();
        }
    }

    /// Starts or pauses tracking. Starting begins a new warm-up with fast
    /// polling; pausing flushes the running duration segment. Accumulated
    /// distance and duration persist across pause/resume within one
    /// session; only [`Self::reset`] clears them.
    pub fn enable(&mut self, enable: bool) {
        if self.is_disabled() {
            warn!("tracker is disabled, ignoring enable({enable})");
            return;
        }

        if enable {
            debug!("enabling position updates");
            self.begin_warmup();
            if self.active_since_mono.is_none() {
                self.active_since_mono = Some(self.clock.monotonic_ms());
            }
            if let Some(source) = self.source.as_mut() {
                source.start();
                source.set_polling_interval(0);
            }
            self.notify();
        } else {
            debug!("disabling position updates");
            if let Some(source) = self.source.as_mut() {
                source.stop();
            }
            // Idempotent: flushing with no running segment changes nothing.
            if let Some(since) = self.active_since_mono.take() {
                self.partial_duration_ms += self.clock.monotonic_ms().saturating_sub(since);
            }
            if self.phase != TrackerPhase::Idle {
                self.phase = TrackerPhase::Idle;
                self.notify();
            }
        }
    }

    /// Ends the current session: stops tracking and clears every
    /// accumulated metric, leaving the tracker ready for a fresh start.
    pub fn reset(&mut self) {
        if self.is_disabled() {
            return;
        }
        debug!("resetting session");
        self.enable(false);
        self.partial_duration_ms = 0;
        self.distance_m = 0.0;
        self.current_speed_mps = 0.0;
        self.altitude_gain_m = 0.0;
        self.altitude_loss_m = 0.0;
        self.fixes_received = 0;
        self.baseline = None;
        self.last_error = None;
        self.notify();
    }

    /// Dispatches one source event. Exactly one event is processed to
    /// completion at a time.
    pub fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Fix(fix) => self.handle_fix(fix),
            SourceEvent::Timeout => self.handle_timeout(),
            SourceEvent::Error(err) => self.handle_error(err),
        }
    }

    pub fn handle_fix(&mut self, fix: PositionFix) {
        if self.is_disabled() || self.phase == TrackerPhase::Idle {
            return;
        }
        self.fixes_received += 1;

        if !self.filter_accepts(&fix) {
            return;
        }

        match self.phase {
            TrackerPhase::Warmup => self.consume_warmup_fix(fix),
            TrackerPhase::Active => self.accumulate(fix),
            TrackerPhase::Idle => {}
        }
    }

    /// A lost fix stream means the next fix cannot be trusted as a
    /// contiguous baseline; force re-acquisition. The duration timer keeps
    /// running.
    pub fn handle_timeout(&mut self) {
        if self.is_disabled() || self.phase == TrackerPhase::Idle {
            return;
        }
        warn!("position update timeout, returning to warm-up");
        self.baseline = None;
        self.begin_warmup();
        if let Some(source) = self.source.as_mut() {
            source.set_polling_interval(0);
        }
        self.notify();
    }

    /// Non-fatal; session state is unchanged and tracking continues with
    /// whatever baseline exists.
    pub fn handle_error(&mut self, err: SourceError) {
        warn!(%err, "position source error");
        self.last_error = Some(err);
    }

    /// Current metrics snapshot. All zeroes while disabled.
    pub fn metrics(&self) -> Metrics {
        if self.is_disabled() {
            return Metrics::default();
        }
        let duration_ms = self.duration_ms();
        let average_speed_mps = if duration_ms > 0 {
            self.distance_m / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };
        Metrics {
            distance_m: self.distance_m,
            duration_ms,
            current_speed_mps: self.current_speed_mps,
            average_speed_mps,
            altitude_gain_m: self.altitude_gain_m,
            altitude_loss_m: self.altitude_loss_m,
        }
    }

    fn duration_ms(&self) -> u64 {
        match self.active_since_mono {
            Some(since) => {
                self.partial_duration_ms + self.clock.monotonic_ms().saturating_sub(since)
            }
            None => self.partial_duration_ms,
        }
    }

    fn begin_warmup(&mut self) {
        self.warmup_remaining = self.config.warmup_count;
        if self.warmup_remaining == 0 {
            self.enter_active();
        } else {
            self.phase = TrackerPhase::Warmup;
        }
    }

    fn enter_active(&mut self) {
        debug!(
            interval_ms = self.config.update_interval_ms,
            "position considered valid, switching to steady-state polling"
        );
        self.phase = TrackerPhase::Active;
        if let Some(source) = self.source.as_mut() {
            source.set_polling_interval(self.config.update_interval_ms);
        }
    }

    /// Pure acceptance predicate; no side effects beyond diagnostics.
    fn filter_accepts(&self, fix: &PositionFix) -> bool {
        let now = self.clock.wall_ms();
        if now - fix.timestamp_ms > self.config.max_fix_age_ms {
            debug!(
                age_ms = now - fix.timestamp_ms,
                "fix is too old, ignoring event"
            );
            return false;
        }

        match fix.horizontal_accuracy_m {
            None if self.config.accuracy_aware => {
                debug!("horizontal accuracy is missing, ignoring event");
                false
            }
            Some(accuracy) => {
                if let Some(gate) = self.config.min_horizontal_accuracy_m {
                    if accuracy > gate {
                        debug!(accuracy, gate, "fix accuracy exceeds gate, ignoring event");
                        return false;
                    }
                }
                true
            }
            None => true,
        }
    }

    fn consume_warmup_fix(&mut self, fix: PositionFix) {
        // Warm-up fixes establish (or replace) the baseline but contribute
        // nothing; the first fix after acquisition is frequently the
        // device's cached position, physically unrelated to here.
        self.baseline = Some(fix);
        self.baseline_at_mono = self.clock.monotonic_ms();
        self.warmup_remaining -= 1;
        debug!(remaining = self.warmup_remaining, "warm-up fix consumed");

        if self.warmup_remaining == 0 {
            self.enter_active();
            self.notify();
        }
    }

    fn accumulate(&mut self, fix: PositionFix) {
        let Some(baseline) = self.baseline else {
            // Only reachable with warmup_count = 0: the first accepted fix
            // becomes the baseline without producing a delta.
            self.baseline = Some(fix);
            self.baseline_at_mono = self.clock.monotonic_ms();
            return;
        };

        let raw_delta = geo::distance_m(&baseline.coordinate, &fix.coordinate);

        if self.config.accuracy_aware {
            let gate = baseline.horizontal_accuracy_m.unwrap_or(0.0)
                + fix.horizontal_accuracy_m.unwrap_or(0.0);
            if raw_delta <= gate {
                // Positional jitter. The baseline is deliberately NOT
                // updated, so noise cannot accumulate a drifted reference.
                debug!(raw_delta, gate, "delta within accuracy radius, ignoring event");
                return;
            }
        }

        let now_mono = self.clock.monotonic_ms();
        let elapsed_ms = now_mono.saturating_sub(self.baseline_at_mono);

        self.distance_m += raw_delta;

        if !self.config.accuracy_aware && fix.ground_speed_mps.is_some() {
            self.current_speed_mps = fix.ground_speed_mps.unwrap_or(0.0);
        } else if elapsed_ms > 0 {
            self.current_speed_mps = raw_delta / (elapsed_ms as f64 / 1000.0);
        }

        if let (Some(from), Some(to)) = (baseline.coordinate.altitude, fix.coordinate.altitude) {
            let delta = to - from;
            if delta > 0.0 {
                self.altitude_gain_m += delta;
            } else {
                // Signed accumulation: losses stay <= 0.
                self.altitude_loss_m += delta;
            }
        }

        self.baseline = Some(fix);
        self.baseline_at_mono = now_mono;
        self.notify();
    }

    fn notify(&mut self) {
        if self.notifications {
            for observer in &mut self.observers {
                observer.on_refresh();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fix::Coordinate;
    use crate::source::{ScriptedSource, SourceCommand};
    use assert_matches::assert_matches;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct CountingObserver {
        count: Rc<Cell<u32>>,
    }

    impl MetricsObserver for CountingObserver {
        fn on_refresh(&mut self) {
            self.count.set(self.count.get() + 1);
        }
    }

    fn config(warmup: u32) -> TrackerConfig {
        TrackerConfig {
            warmup_count: warmup,
            max_fix_age_ms: 60_000,
            min_horizontal_accuracy_m: Some(100.0),
            ..TrackerConfig::default()
        }
    }

    fn tracker(
        cfg: TrackerConfig,
    ) -> (
        SessionTracker<Rc<ManualClock>>,
        Rc<ManualClock>,
        Rc<RefCell<Vec<SourceCommand>>>,
    ) {
        let clock = Rc::new(ManualClock::new(1_000_000));
        let source = ScriptedSource::new();
        let commands = source.commands();
        let tracker = SessionTracker::new(cfg, Box::new(source), Rc::clone(&clock));
        (tracker, clock, commands)
    }

    fn fix_at(clock: &ManualClock, lat: f64, lon: f64, accuracy: f64) -> PositionFix {
        PositionFix::new(clock.wall_ms(), Coordinate::new(lat, lon)).with_accuracy(accuracy)
    }

    #[test]
    fn starts_idle_with_zero_metrics() {
        let (tracker, _clock, _cmds) = tracker(config(4));
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.metrics(), Metrics::default());
    }

    #[test]
    fn fixes_are_ignored_while_idle() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        assert_eq!(tracker.metrics().distance_m, 0.0);
        assert_eq!(tracker.fixes_received(), 0);
    }

    #[test]
    fn enable_starts_source_with_fast_polling() {
        let (mut tracker, _clock, cmds) = tracker(config(4));
        tracker.enable(true);
        assert_eq!(tracker.phase(), TrackerPhase::Warmup);
        assert_eq!(
            *cmds.borrow(),
            vec![SourceCommand::Start, SourceCommand::SetPollingInterval(0)]
        );
    }

    #[test]
    fn warmup_completion_switches_to_steady_state_polling() {
        let mut cfg = config(2);
        cfg.update_interval_ms = 7_000;
        let (mut tracker, clock, cmds) = tracker(cfg);
        tracker.enable(true);

        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        assert_eq!(tracker.phase(), TrackerPhase::Warmup);
        assert_eq!(tracker.warmup_remaining(), 1);

        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));
        assert_eq!(tracker.phase(), TrackerPhase::Active);
        assert_eq!(
            cmds.borrow().last(),
            Some(&SourceCommand::SetPollingInterval(7_000))
        );
    }

    #[test]
    fn warmup_fixes_contribute_no_distance() {
        // Four fixes with large artificial jumps, then a fifth: distance
        // must stay zero until the fifth is processed.
        let (mut tracker, clock, _cmds) = tracker(config(4));
        tracker.enable(true);

        for i in 0..4 {
            tracker.handle_fix(fix_at(&clock, 50.0 + i as f64, 14.4, 5.0));
            clock.advance(1_000);
            assert_eq!(tracker.metrics().distance_m, 0.0);
        }

        tracker.handle_fix(fix_at(&clock, 53.001, 14.4, 5.0));
        assert!(tracker.metrics().distance_m > 0.0);
    }

    #[test]
    fn stale_fix_changes_nothing_and_raises_no_notification() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        let count = Rc::new(Cell::new(0));
        tracker.add_observer(Box::new(CountingObserver {
            count: Rc::clone(&count),
        }));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        let before = tracker.metrics();
        let notifications_before = count.get();

        let stale = PositionFix::new(clock.wall_ms() - 60_001, Coordinate::new(51.0, 14.4))
            .with_accuracy(5.0);
        tracker.handle_fix(stale);

        assert_eq!(tracker.metrics(), before);
        assert_eq!(count.get(), notifications_before);
    }

    #[test]
    fn fix_without_accuracy_is_rejected_in_accuracy_aware_mode() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(5_000);

        tracker.handle_fix(PositionFix::new(clock.wall_ms(), Coordinate::new(50.01, 14.4)));
        assert_eq!(tracker.metrics().distance_m, 0.0);
    }

    #[test]
    fn fix_exceeding_hard_accuracy_gate_is_rejected() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(5_000);

        tracker.handle_fix(fix_at(&clock, 50.01, 14.4, 150.0));
        assert_eq!(tracker.metrics().distance_m, 0.0);
    }

    #[test]
    fn jitter_below_combined_accuracy_is_ignored() {
        // ~3 m apart with 10 m accuracy each: 3 < 10 + 10.
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 10.0));
        clock.advance(5_000);

        tracker.handle_fix(fix_at(&clock, 50.000027, 14.4, 10.0));
        assert_eq!(tracker.metrics().distance_m, 0.0);
    }

    #[test]
    fn rejected_jitter_does_not_move_the_baseline() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 10.0));
        clock.advance(5_000);

        // Many small steps, each within the noise gate relative to the
        // original baseline. If rejection updated the baseline, the
        // reference would silently drift and a later step could register.
        for i in 1..=5 {
            tracker.handle_fix(fix_at(&clock, 50.0 + 0.000_02 * i as f64, 14.4, 10.0));
            clock.advance(1_000);
        }
        assert_eq!(tracker.metrics().distance_m, 0.0);
    }

    #[test]
    fn clear_movement_advances_distance() {
        // ~25 m apart with 5 m accuracy each: 25 > 5 + 5.
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(5_000);

        tracker.handle_fix(fix_at(&clock, 50.000225, 14.4, 5.0));
        let distance = tracker.metrics().distance_m;
        assert!((distance - 25.0).abs() < 0.2, "got {distance}");
    }

    #[test]
    fn altitude_deltas_accumulate_with_signed_loss() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);

        let base = PositionFix::new(clock.wall_ms(), Coordinate::with_altitude(50.0, 14.4, 200.0))
            .with_accuracy(5.0);
        tracker.handle_fix(base);
        clock.advance(10_000);

        let up = PositionFix::new(
            clock.wall_ms(),
            Coordinate::with_altitude(50.001, 14.4, 212.5),
        )
        .with_accuracy(5.0);
        tracker.handle_fix(up);
        clock.advance(10_000);

        let down = PositionFix::new(
            clock.wall_ms(),
            Coordinate::with_altitude(50.002, 14.4, 207.5),
        )
        .with_accuracy(5.0);
        tracker.handle_fix(down);

        let metrics = tracker.metrics();
        assert!((metrics.altitude_gain_m - 12.5).abs() < 1e-9);
        assert!((metrics.altitude_loss_m - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn duration_accumulates_only_while_enabled() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        clock.advance(5_000);
        assert_eq!(tracker.metrics().duration_ms, 5_000);

        tracker.enable(false);
        clock.advance(60_000);
        assert_eq!(tracker.metrics().duration_ms, 5_000);

        tracker.enable(true);
        clock.advance(2_000);
        assert_eq!(tracker.metrics().duration_ms, 7_000);
    }

    #[test]
    fn double_stop_is_idempotent() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        clock.advance(3_000);
        tracker.enable(false);
        let after_first = tracker.metrics().duration_ms;

        clock.advance(10_000);
        tracker.enable(false);
        assert_eq!(tracker.metrics().duration_ms, after_first);
    }

    #[test]
    fn rapid_start_stop_pairs_leave_duration_unchanged() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        clock.advance(4_000);
        tracker.enable(false);

        // Zero elapsed time between each pair.
        tracker.enable(true);
        tracker.enable(false);
        tracker.enable(true);
        tracker.enable(false);
        assert_eq!(tracker.metrics().duration_ms, 4_000);
    }

    #[test]
    fn distance_persists_across_pause_and_resume() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));
        let distance = tracker.metrics().distance_m;
        assert!(distance > 100.0);

        tracker.enable(false);
        tracker.enable(true);
        assert_eq!(tracker.metrics().distance_m, distance);
    }

    #[test]
    fn reset_clears_metrics_for_a_new_session() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));
        assert!(tracker.metrics().distance_m > 0.0);

        tracker.reset();
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.metrics(), Metrics::default());
        assert_eq!(tracker.fixes_received(), 0);
    }

    #[test]
    fn average_speed_is_zero_at_zero_duration() {
        let (tracker, _clock, _cmds) = tracker(config(1));
        assert_eq!(tracker.metrics().average_speed_mps, 0.0);
    }

    #[test]
    fn monotonic_duration_survives_wall_clock_step() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        clock.advance(5_000);
        clock.shift_wall(-3_600_000);
        assert_eq!(tracker.metrics().duration_ms, 5_000);
    }

    #[test]
    fn timeout_forces_reacquisition_without_stopping_timer() {
        let mut cfg = config(2);
        cfg.update_interval_ms = 9_000;
        let (mut tracker, clock, cmds) = tracker(cfg);
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        tracker.handle_fix(fix_at(&clock, 50.0001, 14.4, 5.0));
        assert_eq!(tracker.phase(), TrackerPhase::Active);
        clock.advance(5_000);

        tracker.handle_timeout();
        assert_eq!(tracker.phase(), TrackerPhase::Warmup);
        assert_eq!(tracker.warmup_remaining(), 2);
        assert_eq!(
            cmds.borrow().last(),
            Some(&SourceCommand::SetPollingInterval(0))
        );

        // Timer kept running through the re-acquisition.
        clock.advance(3_000);
        assert_eq!(tracker.metrics().duration_ms, 8_000);
    }

    #[test]
    fn source_error_leaves_state_unchanged() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));
        let before = tracker.metrics();

        tracker.handle_event(SourceEvent::Error(SourceError::Device(3)));
        assert_eq!(tracker.metrics(), before);
        assert_matches!(tracker.last_error(), Some(SourceError::Device(3)));
        assert_eq!(tracker.phase(), TrackerPhase::Active);
    }

    #[test]
    fn disabled_tracker_is_inert() {
        let clock = Rc::new(ManualClock::new(1_000_000));
        let mut tracker = SessionTracker::disabled(config(1), Rc::clone(&clock));
        assert!(tracker.is_disabled());

        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        tracker.handle_timeout();

        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.metrics(), Metrics::default());
    }

    #[test]
    fn accepted_fix_raises_a_notification() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        let count = Rc::new(Cell::new(0));
        tracker.add_observer(Box::new(CountingObserver {
            count: Rc::clone(&count),
        }));

        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        let before = count.get();

        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));
        assert_eq!(count.get(), before + 1);
    }

    #[test]
    fn enabling_notifications_raises_one_immediately() {
        let (mut tracker, _clock, _cmds) = tracker(config(1));
        let count = Rc::new(Cell::new(0));
        tracker.add_observer(Box::new(CountingObserver {
            count: Rc::clone(&count),
        }));

        tracker.set_notifications(false);
        tracker.enable(true);
        assert_eq!(count.get(), 0);

        tracker.set_notifications(true);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn update_interval_change_applies_at_next_warmup_completion() {
        let (mut tracker, clock, cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.set_update_interval_ms(2_500);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        assert_eq!(
            cmds.borrow().last(),
            Some(&SourceCommand::SetPollingInterval(2_500))
        );
    }

    #[test]
    fn end_to_end_single_leg() {
        // warmupCount = 1, fix A as baseline, fix B 0.001 deg due north
        // ten seconds later: ~111.19 m, ~11.12 m/s, 10 s duration.
        let mut cfg = config(1);
        cfg.max_fix_age_ms = 60_000;
        cfg.min_horizontal_accuracy_m = Some(100.0);
        let (mut tracker, clock, _cmds) = tracker(cfg);
        tracker.enable(true);

        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));
        clock.advance(10_000);
        tracker.handle_fix(fix_at(&clock, 50.001, 14.4, 5.0));

        let metrics = tracker.metrics();
        assert!((metrics.distance_m - 111.19).abs() < 0.1, "{metrics:?}");
        assert!(
            (metrics.current_speed_mps - 11.119).abs() < 0.01,
            "{metrics:?}"
        );
        assert_eq!(metrics.duration_ms, 10_000);
        assert!((metrics.average_speed_mps - 11.119).abs() < 0.01);
    }

    #[test]
    fn ground_speed_is_used_when_accuracy_model_is_off() {
        let mut cfg = config(1);
        cfg.accuracy_aware = false;
        let (mut tracker, clock, _cmds) = tracker(cfg);
        tracker.enable(true);

        tracker.handle_fix(PositionFix::new(clock.wall_ms(), Coordinate::new(50.0, 14.4)));
        clock.advance(10_000);
        tracker.handle_fix(
            PositionFix::new(clock.wall_ms(), Coordinate::new(50.001, 14.4))
                .with_ground_speed(3.3),
        );

        let metrics = tracker.metrics();
        assert!(metrics.distance_m > 100.0);
        assert_eq!(metrics.current_speed_mps, 3.3);
    }

    #[test]
    fn metrics_are_monotonic_while_active() {
        let (mut tracker, clock, _cmds) = tracker(config(1));
        tracker.enable(true);
        tracker.handle_fix(fix_at(&clock, 50.0, 14.4, 5.0));

        let mut previous = tracker.metrics();
        for i in 1..=10 {
            clock.advance(5_000);
            tracker.handle_fix(fix_at(&clock, 50.0 + 0.0005 * i as f64, 14.4, 5.0));
            let current = tracker.metrics();
            assert!(current.distance_m >= previous.distance_m);
            assert!(current.duration_ms >= previous.duration_ms);
            assert!(current.altitude_gain_m >= previous.altitude_gain_m);
            previous = current;
        }
    }
}
