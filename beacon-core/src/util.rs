use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time for session bookkeeping.
///
/// The default implementation reads the system clock; tests inject a fixed
/// clock so durations and sequence numbers become deterministic.
pub trait TimeProvider: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_millis(&self) -> i64;

    /// The current wall-clock time.
    fn now(&self) -> SystemTime {
        let millis = self.now_millis().max(0) as u64;
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}

/// The production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Source of uniform random values in `[0, 1)` for sampling decisions.
pub trait RandomSource: Send + Sync {
    /// Draws the next value.
    fn next_f64(&self) -> f64;
}

/// The production randomness source, backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLocalRandom;

impl RandomSource for ThreadLocalRandom {
    fn next_f64(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// A clock pinned to a fixed instant, advanced manually.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a clock reading the given unix-epoch milliseconds.
    pub fn new(millis: i64) -> FixedClock {
        FixedClock {
            millis: AtomicI64::new(millis),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: Duration) {
        self.millis
            .fetch_add(delta.as_millis() as i64, Ordering::SeqCst);
    }
}

impl TimeProvider for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// A randomness source that always draws the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}
