//! Write-queue accounting with high/low-water marks
//!
//! The queue counts outstanding bytes: bytes accepted by `write` whose
//! underlying write has not completed yet. It is full when outstanding bytes
//! reach the high-water mark, and it reports a drain exactly once per full
//! episode, when outstanding bytes fall back to the low-water mark (half the
//! high-water mark).

use futures::channel::oneshot;

/// Default high-water mark in bytes
pub const DEFAULT_MAX_SIZE: usize = 128 * 1024;

/// Outstanding-write accounting for a stream sink
#[derive(Debug)]
pub struct WriteQueue {
    /// Bytes written but not yet completed
    outstanding: usize,
    /// High-water mark
    max_size: usize,
    /// Set when the queue reached `max_size`, cleared when drain is reported
    full_latched: bool,
    /// Waiters notified when `outstanding` reaches 0
    empty_waiters: Vec<oneshot::Sender<()>>,
}

impl WriteQueue {
    /// Create a queue with the given high-water mark
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self {
            outstanding: 0,
            max_size,
            full_latched: false,
            empty_waiters: Vec::new(),
        }
    }

    /// Current high-water mark
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Low-water mark at or below which a full queue reports drain
    #[must_use]
    pub const fn low_water_mark(&self) -> usize {
        self.max_size / 2
    }

    /// Bytes currently outstanding
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Whether outstanding bytes are at or above the high-water mark
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.outstanding >= self.max_size
    }

    /// Change the high-water mark
    ///
    /// Returns `true` if the change releases a full episode, in which case the
    /// caller must fire its drain handler.
    pub fn set_max_size(&mut self, max_size: usize) -> bool {
        self.max_size = max_size;
        // An idle queue has no episode to end, even at max 0
        if self.outstanding > 0 && self.is_full() {
            self.full_latched = true;
        }
        self.check_drain()
    }

    /// Account for `len` newly queued bytes
    pub fn push(&mut self, len: usize) {
        self.outstanding += len;
        if self.is_full() {
            self.full_latched = true;
        }
    }

    /// Account for `len` bytes whose write completed
    ///
    /// Returns `true` exactly when this completion ends a full episode; the
    /// caller must then fire its drain handler once.
    pub fn complete(&mut self, len: usize) -> bool {
        self.outstanding = self.outstanding.saturating_sub(len);
        if self.outstanding == 0 {
            for waiter in self.empty_waiters.drain(..) {
                // Receiver may have gone away; nothing to notify then
                let _ = waiter.send(());
            }
        }
        self.check_drain()
    }

    /// Get a receiver that resolves once no writes are outstanding
    pub fn when_empty(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if self.outstanding == 0 {
            let _ = tx.send(());
        } else {
            self.empty_waiters.push(tx);
        }
        rx
    }

    fn check_drain(&mut self) -> bool {
        if self.full_latched && self.outstanding <= self.low_water_mark() {
            self.full_latched = false;
            true
        } else {
            false
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_zero_max_on_idle_queue_reports_no_drain() {
        let mut queue = WriteQueue::new(8);
        assert!(!queue.set_max_size(0));
        assert!(queue.is_full());

        // The first real write starts an episode that ends on completion
        queue.push(1);
        assert!(queue.complete(1));
        assert!(!queue.set_max_size(0));
    }

    #[test]
    fn test_full_after_reaching_max() {
        let mut queue = WriteQueue::new(2);
        queue.push(1);
        assert!(!queue.is_full());
        queue.push(1);
        assert!(queue.is_full());
        queue.push(1);
        assert!(queue.is_full());
        assert_eq!(queue.outstanding(), 3);
    }

    #[test]
    fn test_drain_reported_once_per_episode() {
        let mut queue = WriteQueue::new(2);
        queue.push(1);
        queue.push(1);
        queue.push(1);

        // 3 -> 2: still full, no drain
        assert!(!queue.complete(1));
        // 2 -> 1: at low-water mark, drain
        assert!(queue.complete(1));
        // 1 -> 0: episode already released
        assert!(!queue.complete(1));
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_no_drain_without_full_episode() {
        let mut queue = WriteQueue::new(10);
        queue.push(3);
        assert!(!queue.complete(3));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(10, 5)]
    #[case(11, 5)]
    fn test_low_water_mark(#[case] max: usize, #[case] expected: usize) {
        assert_eq!(WriteQueue::new(max).low_water_mark(), expected);
    }

    #[test]
    fn test_zero_max_is_always_full() {
        let mut queue = WriteQueue::new(0);
        assert!(queue.is_full());
        queue.push(4);
        assert!(queue.complete(4));
    }

    #[test]
    fn test_raising_max_releases_full_episode() {
        let mut queue = WriteQueue::new(2);
        queue.push(2);
        assert!(queue.is_full());
        assert!(queue.set_max_size(8));
        assert!(!queue.is_full());
    }

    #[test]
    fn test_when_empty() {
        let mut queue = WriteQueue::new(4);
        let mut ready = queue.when_empty();
        assert_eq!(ready.try_recv(), Ok(Some(())));

        queue.push(2);
        let mut pending = queue.when_empty();
        assert_eq!(pending.try_recv(), Ok(None));
        queue.complete(2);
        assert_eq!(pending.try_recv(), Ok(Some(())));
    }
}
