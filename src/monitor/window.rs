use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::monitor::error::MonitorError;

/// Short smoothing window with an O(1) running sum.
///
/// The buffer starts zero-filled and the average always divides by the full
/// length, so the output ramps up over the first `len` samples and is exact
/// once the window has been filled.
pub struct MovingAverage {
    buf: Vec<f32>,
    idx: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(len: usize) -> Result<Self, MonitorError> {
        if len == 0 {
            return Err(MonitorError::InvalidMovingAverage);
        }
        Ok(Self {
            buf: vec![0.0; len],
            idx: 0,
            sum: 0.0,
        })
    }

    /// Push one sample, evicting the oldest, and return the current average.
    pub fn push(&mut self, value: f32) -> f32 {
        self.sum -= self.buf[self.idx];
        self.buf[self.idx] = value;
        self.sum += value;
        self.idx = (self.idx + 1) % self.buf.len();
        self.average()
    }

    pub fn average(&self) -> f32 {
        self.sum / self.buf.len() as f32
    }
}

/// Sliding analysis window of fixed capacity.
///
/// Samples keep flowing in; the buffer is never cleared by an epoch. A
/// snapshot is only handed out once the window holds exactly its capacity,
/// in chronological order.
pub struct AnalysisWindow {
    buf: VecDeque<f32>,
    capacity: usize,
}

impl AnalysisWindow {
    pub fn new(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::InvalidWindow);
        }
        Ok(Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn push(&mut self, value: f32) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Copy out the window contents, oldest sample first.
    pub fn snapshot(&self) -> Result<Vec<f32>, MonitorError> {
        if !self.is_full() {
            return Err(MonitorError::WindowNotFull {
                have: self.buf.len(),
                need: self.capacity,
            });
        }
        Ok(self.buf.iter().copied().collect())
    }
}

/// Time source for the epoch trigger, injectable so boundary behavior is
/// testable without real sleeps.
pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for tests and deterministic playback.
#[derive(Clone)]
pub struct ManualClock {
    start: Instant,
    offset_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

/// Decides when an analysis epoch has elapsed.
///
/// `Count` fires after a fixed number of accepted samples and is immune to
/// timer drift; `Time` fires on elapsed wall time, decoupled from the
/// sampler, and can therefore race the window fill at the boundary.
pub enum EpochTrigger {
    Count { target: usize, seen: usize },
    Time { period: Duration, last_fire: Instant },
}

impl EpochTrigger {
    pub fn count(target: usize) -> Self {
        EpochTrigger::Count { target, seen: 0 }
    }

    pub fn time(period: Duration, now: Instant) -> Self {
        EpochTrigger::Time {
            period,
            last_fire: now,
        }
    }

    /// Record one accepted sample. Only meaningful for the count strategy.
    pub fn on_sample(&mut self) {
        if let EpochTrigger::Count { seen, .. } = self {
            *seen += 1;
        }
    }

    /// Check whether an epoch has elapsed, consuming the fire if so.
    pub fn poll(&mut self, clock: &dyn Clock) -> bool {
        match self {
            EpochTrigger::Count { target, seen } => {
                if *seen >= *target {
                    *seen = 0;
                    true
                } else {
                    false
                }
            }
            EpochTrigger::Time { period, last_fire } => {
                let now = clock.now();
                if now.duration_since(*last_fire) >= *period {
                    *last_fire = now;
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_exact_after_fill() {
        let mut ma = MovingAverage::new(10).unwrap();
        let mut avg = 0.0;
        for _ in 0..10 {
            avg = ma.push(0.5);
        }
        assert_eq!(avg, 0.5);
    }

    #[test]
    fn moving_average_evicts_oldest() {
        let mut ma = MovingAverage::new(4).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0] {
            ma.push(v);
        }
        // 5 replaces 1: (2 + 3 + 4 + 5) / 4
        assert_eq!(ma.push(5.0), 3.5);
    }

    #[test]
    fn zero_length_moving_average_rejected() {
        assert!(matches!(
            MovingAverage::new(0),
            Err(MonitorError::InvalidMovingAverage)
        ));
    }

    #[test]
    fn snapshot_is_chronological_and_full() {
        let mut window = AnalysisWindow::new(4).unwrap();
        for v in 0..6 {
            window.push(v as f32);
        }
        assert_eq!(window.snapshot().unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn snapshot_before_full_is_an_error() {
        let mut window = AnalysisWindow::new(4).unwrap();
        window.push(1.0);
        assert!(matches!(
            window.snapshot(),
            Err(MonitorError::WindowNotFull { have: 1, need: 4 })
        ));
    }

    #[test]
    fn count_trigger_fires_every_target_samples() {
        let clock = ManualClock::new();
        let mut trigger = EpochTrigger::count(3);
        for round in 0..2 {
            for i in 0..3 {
                assert!(!trigger.poll(&clock), "round {round} sample {i}");
                trigger.on_sample();
            }
            assert!(trigger.poll(&clock));
        }
    }

    #[test]
    fn time_trigger_follows_injected_clock() {
        let clock = ManualClock::new();
        let mut trigger = EpochTrigger::time(Duration::from_secs(3), clock.now());
        assert!(!trigger.poll(&clock));
        clock.advance(Duration::from_millis(2999));
        assert!(!trigger.poll(&clock));
        clock.advance(Duration::from_millis(1));
        assert!(trigger.poll(&clock));
        // fire consumed; needs another full period
        assert!(!trigger.poll(&clock));
        clock.advance(Duration::from_secs(3));
        assert!(trigger.poll(&clock));
    }

    #[test]
    fn time_trigger_ignores_sample_count() {
        let clock = ManualClock::new();
        let mut trigger = EpochTrigger::time(Duration::from_secs(1), clock.now());
        for _ in 0..100 {
            trigger.on_sample();
        }
        assert!(!trigger.poll(&clock));
    }
}
