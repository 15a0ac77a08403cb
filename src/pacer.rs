//! Request pacing
//!
//! The RequestPacer spaces requests to the remote service by a minimum interval,
//! shared across every worker of a sweep, using a lock-free slot reservation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Minimum inter-request spacing shared by all workers
///
/// # Algorithm
///
/// - `next_slot` holds the earliest instant the next request may start
/// - Each caller atomically claims `max(next_slot, now)` and pushes
///   `next_slot` forward by one interval
/// - The caller then sleeps until its claimed slot
///
/// Concurrent callers therefore receive distinct, evenly spaced slots, and a
/// sequential caller only waits for whatever part of the interval has not
/// already elapsed doing useful work.
///
/// # Implementation
///
/// Uses an AtomicU64 for lock-free tracking of `next_slot`, the earliest
/// start of the next request (nanoseconds since an arbitrary epoch). Clones
/// share it.
#[derive(Clone, Debug)]
pub struct RequestPacer {
    /// Minimum spacing in nanoseconds (0 = unpaced)
    interval_nanos: u64,
    /// Earliest start of the next request
    next_slot: Arc<AtomicU64>,
}

impl RequestPacer {
    /// Create a pacer with the given minimum spacing
    ///
    /// # Examples
    ///
    /// ```
    /// use gfi_sweep::pacer::RequestPacer;
    /// use std::time::Duration;
    ///
    /// // At most 50 requests per second
    /// let pacer = RequestPacer::new(Duration::from_millis(20));
    ///
    /// // No pacing at all
    /// let unpaced = RequestPacer::new(Duration::ZERO);
    /// assert!(unpaced.interval().is_zero());
    /// ```
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_nanos: duration_nanos(interval),
            next_slot: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current minimum spacing
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos)
    }

    /// Wait until the caller may issue its next request
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gfi_sweep::pacer::RequestPacer;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let pacer = RequestPacer::new(Duration::from_millis(20));
    ///
    /// // Before every request
    /// pacer.acquire().await;
    /// // ... send request ...
    /// # }
    /// ```
    pub async fn acquire(&self) {
        let interval = self.interval_nanos;

        // Fast path: unpaced
        if interval == 0 {
            return;
        }

        let now = Self::now_nanos();
        let mut current = self.next_slot.load(Ordering::SeqCst);
        let slot = loop {
            let slot = current.max(now);
            match self.next_slot.compare_exchange_weak(
                current,
                slot.saturating_add(interval),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break slot,
                Err(actual) => current = actual,
            }
        };

        if slot > now {
            tokio::time::sleep(Duration::from_nanos(slot - now)).await;
        }
    }

    /// Get current monotonic time in nanoseconds
    ///
    /// The epoch is arbitrary but consistent within a process lifetime.
    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unpaced_acquire_returns_immediately() {
        let pacer = RequestPacer::new(Duration::ZERO);

        let start = Instant::now();
        for _ in 0..100 {
            pacer.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let pacer = RequestPacer::new(Duration::from_secs(10));

        let start = Instant::now();
        pacer.acquire().await;

        assert!(
            start.elapsed() < Duration::from_millis(50),
            "first acquire should not wait, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn sequential_acquires_are_spaced_by_interval() {
        let pacer = RequestPacer::new(Duration::from_millis(50));

        let start = Instant::now();
        for _ in 0..4 {
            pacer.acquire().await;
        }
        let elapsed = start.elapsed();

        // Three gaps of 50ms after the free first slot
        assert!(
            elapsed >= Duration::from_millis(145),
            "expected >= ~150ms, got {elapsed:?}"
        );
        assert!(
            elapsed < Duration::from_millis(1000),
            "pacing overshot: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_schedule() {
        let pacer = RequestPacer::new(Duration::from_millis(40));

        let start = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move {
                    pacer.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        let last = finished.iter().max().unwrap().duration_since(start);

        // Five callers on a shared 40ms schedule need at least four gaps
        assert!(
            last >= Duration::from_millis(155),
            "callers were not serialized: last started after {last:?}"
        );
    }

    #[tokio::test]
    async fn elapsed_work_counts_towards_the_interval() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        pacer.acquire().await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let start = Instant::now();
        pacer.acquire().await;
        assert!(
            start.elapsed() < Duration::from_millis(20),
            "slot was already due, waited {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn interval_is_reported_and_shared_by_clones() {
        let pacer = RequestPacer::new(Duration::from_millis(250));
        assert_eq!(pacer.interval(), Duration::from_millis(250));
        assert_eq!(pacer.clone().interval(), Duration::from_millis(250));
        assert!(RequestPacer::new(Duration::ZERO).interval().is_zero());
    }
}
