use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Monotonic nanosecond clock, read-only from the orchestrator's perspective.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time, used in `demo` and `live` modes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_nanos() as u64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A manually-advanced clock for backtests: time only moves when the replay driver feeds the
/// next quote's timestamp, so `sleep` resolves instantly rather than blocking wall-time.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now_ns: AtomicU64,
}

impl SimulatedClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now_ns: AtomicU64::new(start_ns),
        }
    }

    pub fn advance_to(&self, ts: u64) {
        self.now_ns.fetch_max(ts, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    async fn sleep(&self, _duration: Duration) {
        // Backtests never actually wait wall-time; the replay driver advances `now` directly.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clock_only_moves_forward() {
        let clock = SimulatedClock::new(100);
        clock.advance_to(50);
        assert_eq!(clock.now(), 100);
        clock.advance_to(200);
        assert_eq!(clock.now(), 200);
    }

    #[tokio::test]
    async fn system_clock_sleep_returns() {
        let clock = SystemClock;
        let before = clock.now();
        clock.sleep(Duration::from_millis(1)).await;
        assert!(clock.now() >= before);
    }
}
