//! Bounded frame buffer between the capture and encode stages.
//!
//! Fixed capacity, FIFO, drop-newest: when the buffer is full the
//! incoming frame is discarded and the queued frames are left untouched.
//! This bounds end-to-end latency under sustained overload at the cost of
//! sending older content.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::frame::RawFrame;

/// Default number of frames held between capture and encode.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Result of [`FrameBuffer::try_push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// Buffer full (or closed); the pushed frame was discarded.
    Dropped,
}

/// Result of [`FrameBuffer::pop`].
#[derive(Debug)]
pub enum PopOutcome {
    Frame(RawFrame),
    /// Nothing arrived before the deadline. Not an error.
    Timeout,
    /// The buffer was closed at shutdown.
    Closed,
}

/// Fixed-capacity FIFO of raw frames with a drop-on-full policy.
///
/// `try_push` never blocks; `pop` waits up to a timeout. Intended for a
/// single producer and a single consumer sharing it through an `Arc`.
pub struct FrameBuffer {
    queue: Mutex<VecDeque<RawFrame>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl FrameBuffer {
    /// Create a buffer holding at most `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame buffer capacity must be non-zero");
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue `frame` unless the buffer is full or closed.
    pub fn try_push(&self, frame: RawFrame) -> PushOutcome {
        // Closed pushes are discarded but not counted as drops.
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Dropped;
        }

        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                drop(queue);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return PushOutcome::Dropped;
            }
            queue.push_back(frame);
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        PushOutcome::Accepted
    }

    /// Dequeue the oldest frame, waiting up to `timeout` for one.
    pub async fn pop(&self, timeout: Duration) -> PopOutcome {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return PopOutcome::Closed;
            }
            if let Some(frame) = self.queue.lock().pop_front() {
                return PopOutcome::Frame(frame);
            }

            // `notify_one` leaves a permit when nobody is waiting, so a push
            // between the check above and this await is not lost.
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                if self.is_closed() {
                    return PopOutcome::Closed;
                }
                return match self.queue.lock().pop_front() {
                    Some(frame) => PopOutcome::Frame(frame),
                    None => PopOutcome::Timeout,
                };
            }
        }
    }

    /// Close the buffer: queued frames are discarded, waiters wake with
    /// [`PopOutcome::Closed`] and later pushes are dropped. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.lock().clear();
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames accepted since construction.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Frames discarded by the drop-on-full policy since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn frame(seq: u64) -> RawFrame {
        let mut f = RawFrame::new(1, 1, PixelFormat::Rgb8, vec![0; 3]);
        f.sequence = seq;
        f
    }

    fn seq_of(outcome: PopOutcome) -> u64 {
        match outcome {
            PopOutcome::Frame(f) => f.sequence,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fifo_order() {
        let buf = FrameBuffer::new(4);
        for seq in 0..3 {
            assert_eq!(buf.try_push(frame(seq)), PushOutcome::Accepted);
        }
        for seq in 0..3 {
            assert_eq!(seq_of(buf.pop(Duration::from_millis(10)).await), seq);
        }
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn full_buffer_drops_newest() {
        let buf = FrameBuffer::new(2);
        assert_eq!(buf.try_push(frame(0)), PushOutcome::Accepted);
        assert_eq!(buf.try_push(frame(1)), PushOutcome::Accepted);
        assert_eq!(buf.try_push(frame(2)), PushOutcome::Dropped);

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.dropped(), 1);
        assert_eq!(seq_of(buf.pop(Duration::from_millis(10)).await), 0);
        assert_eq!(seq_of(buf.pop(Duration::from_millis(10)).await), 1);

        // Room again.
        assert_eq!(buf.try_push(frame(3)), PushOutcome::Accepted);
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_buffer() {
        let buf = FrameBuffer::new(1);
        let started = std::time::Instant::now();
        assert!(matches!(
            buf.pop(Duration::from_millis(30)).await,
            PopOutcome::Timeout
        ));
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let buf = Arc::new(FrameBuffer::new(1));
        let consumer = {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move { buf.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        buf.try_push(frame(7));
        assert_eq!(seq_of(consumer.await.unwrap()), 7);
    }

    #[tokio::test]
    async fn close_wakes_blocked_pop() {
        let buf = Arc::new(FrameBuffer::new(1));
        let consumer = {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move { buf.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        buf.close();

        let outcome = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop not woken by close")
            .unwrap();
        assert!(matches!(outcome, PopOutcome::Closed));
    }

    #[tokio::test]
    async fn closed_buffer_rejects_pushes() {
        let buf = FrameBuffer::new(2);
        buf.try_push(frame(0));
        buf.close();
        buf.close();
        assert!(buf.is_empty());
        assert_eq!(buf.try_push(frame(1)), PushOutcome::Dropped);
        assert!(matches!(
            buf.pop(Duration::from_millis(5)).await,
            PopOutcome::Closed
        ));
    }

    #[test]
    fn pushes_after_close_are_not_counted_as_drops() {
        let buf = FrameBuffer::new(1);
        buf.try_push(frame(0));
        assert_eq!(buf.try_push(frame(1)), PushOutcome::Dropped);
        assert_eq!(buf.dropped(), 1);

        buf.close();
        for seq in 2..5 {
            assert_eq!(buf.try_push(frame(seq)), PushOutcome::Dropped);
        }
        assert_eq!(buf.dropped(), 1);
        assert_eq!(buf.accepted(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_preserves_order(
            capacity in 1usize..8,
            ops in proptest::collection::vec(op(), 0..64),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let buf = FrameBuffer::new(capacity);
                let mut model: VecDeque<u64> = VecDeque::new();
                let mut next = 0u64;

                for op in &ops {
                    match op {
                        Op::Push => {
                            let outcome = buf.try_push(frame(next));
                            if model.len() < capacity {
                                prop_assert_eq!(outcome, PushOutcome::Accepted);
                                model.push_back(next);
                            } else {
                                prop_assert_eq!(outcome, PushOutcome::Dropped);
                            }
                            next += 1;
                        }
                        Op::Pop => match buf.pop(Duration::ZERO).await {
                            PopOutcome::Frame(f) => {
                                prop_assert_eq!(Some(f.sequence), model.pop_front());
                            }
                            PopOutcome::Timeout => prop_assert!(model.is_empty()),
                            PopOutcome::Closed => prop_assert!(false, "buffer closed"),
                        },
                    }
                    prop_assert!(buf.len() <= capacity);
                    prop_assert_eq!(buf.len(), model.len());
                }
                Ok(())
            })?;
        }
    }
}
