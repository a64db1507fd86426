use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

/// Periodic sample-tick producer.
///
/// A timer thread sets a single-slot ready flag at the sample cadence; the
/// main loop consumes it with [`SampleTicker::take`]. There is no queue: a
/// tick that lands while the previous one is still unserviced overwrites it
/// (latest tick wins) and is counted as coalesced. The consumer therefore
/// must finish one tick's work within a sample period or silently lose
/// samples.
pub struct SampleTicker {
    ready: Arc<AtomicBool>,
    coalesced: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SampleTicker {
    pub fn start(period: Duration) -> Self {
        let ready = Arc::new(AtomicBool::new(false));
        let coalesced = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let ready = Arc::clone(&ready);
            let coalesced = Arc::clone(&coalesced);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                // fixed deadlines rather than sleep-after-work, so the
                // cadence does not drift with scheduling jitter
                let mut next = Instant::now() + period;
                while !stop.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if now < next {
                        thread::sleep(next - now);
                    }
                    next += period;
                    if ready.swap(true, Ordering::AcqRel) {
                        coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        };
        Self {
            ready,
            coalesced,
            stop,
            handle: Some(handle),
        }
    }

    /// Consume the ready flag. Returns true at most once per tick.
    pub fn take(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    /// Ticks that were overwritten before the consumer serviced them.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl Drop for SampleTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let lost = self.coalesced();
        if lost > 0 {
            debug!("sample ticker stopped; {lost} ticks were coalesced");
        }
    }
}
