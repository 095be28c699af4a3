use std::cell::Cell;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time source injected into the tracker.
///
/// Two distinct readings are needed: wall-clock time for comparing against
/// fix timestamps (which are wall-clock by nature), and a monotonic reading
/// for measuring active duration, immune to wall-clock adjustment.
pub trait Clock {
    /// Current wall-clock time, epoch milliseconds.
    fn wall_ms(&self) -> i64;

    /// Monotonic milliseconds since an arbitrary fixed origin.
    fn monotonic_ms(&self) -> u64;
}

impl<C: Clock> Clock for std::rc::Rc<C> {
    fn wall_ms(&self) -> i64 {
        (**self).wall_ms()
    }

    fn monotonic_ms(&self) -> u64 {
        (**self).monotonic_ms()
    }
}

/// Production clock backed by `SystemTime` and `Instant`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for deterministic tests.
pub struct ManualClock {
    wall: Cell<i64>,
    mono: Cell<u64>,
}

impl ManualClock {
    pub fn new(wall_ms: i64) -> Self {
        Self {
            wall: Cell::new(wall_ms),
            mono: Cell::new(0),
        }
    }

    /// Advances both wall and monotonic time together.
    pub fn advance(&self, ms: u64) {
        self.wall.set(self.wall.get() + ms as i64);
        self.mono.set(self.mono.get() + ms);
    }

    /// Shifts only the wall clock, e.g. to model an NTP step.
    pub fn shift_wall(&self, ms: i64) {
        self.wall.set(self.wall.get() + ms);
    }
}

impl Clock for ManualClock {
    fn wall_ms(&self) -> i64 {
        self.wall.get()
    }

    fn monotonic_ms(&self) -> u64 {
        self.mono.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_both_readings() {
        let clock = ManualClock::new(1_000_000);
        assert_eq!(clock.wall_ms(), 1_000_000);
        assert_eq!(clock.monotonic_ms(), 0);

        clock.advance(2_500);
        assert_eq!(clock.wall_ms(), 1_002_500);
        assert_eq!(clock.monotonic_ms(), 2_500);
    }

    #[test]
    fn wall_shift_leaves_monotonic_untouched() {
        let clock = ManualClock::new(0);
        clock.advance(100);
        clock.shift_wall(-5_000);
        assert_eq!(clock.wall_ms(), -4_900);
        assert_eq!(clock.monotonic_ms(), 100);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_ms();
        let b = clock.monotonic_ms();
        assert!(b >= a);
        assert!(clock.wall_ms() > 0);
    }
}
