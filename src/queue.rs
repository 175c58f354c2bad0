//! Tone Queue (spec §4.3): a bounded, thread-safe producer/consumer ring of
//! `Tone`s with low-water callback and wait/flush primitives.
//!
//! The C original packs this as a fixed array plus one mutex/condvar pair
//! serving double duty (state changes and internal hand-off). Here the
//! buffer and its invariants live behind a `parking_lot::Mutex`, and two
//! condvars separate the two kinds of waiter spec §4.3 distinguishes:
//! `wait_cv` for length-based waits (`wait_for_level`), `dequeue_cv` for
//! "a real dequeue transition happened" (`wait_for_end_of_current_tone`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::consts::QUEUE_CAPACITY_MAX;
use crate::error::{CwError, CwResult};
use crate::tone::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Empty,
    Nonempty,
}

#[derive(Debug, Clone, Copy)]
pub enum DequeueResult {
    /// Nothing was queued.
    Empty,
    /// A tone was returned; the queue is non-empty afterward.
    Nonempty(Tone),
    /// A tone was returned; the queue became empty as a result.
    JustEmptied(Tone),
}

impl DequeueResult {
    pub fn tone(&self) -> Option<Tone> {
        match self {
            DequeueResult::Empty => None,
            DequeueResult::Nonempty(t) | DequeueResult::JustEmptied(t) => Some(*t),
        }
    }
}

/// Callbacks must be non-blocking with respect to the generator: they run
/// on the worker thread, between sink writes, with no lock held.
pub type LowWaterCallback = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    buffer: Vec<Tone>,
    capacity: usize,
    head: usize,
    tail: usize,
    length: usize,
    state: QueueState,
    high_water: usize,
    low_water: usize,
    low_water_cb: Option<LowWaterCallback>,
    /// Bumped on every *real* (non-peek) dequeue; lets
    /// `wait_for_end_of_current_tone` detect a transition without missing
    /// one to a spurious wakeup.
    dequeue_generation: u64,
}

pub struct ToneQueue {
    inner: Mutex<Inner>,
    wait_cv: Condvar,
    dequeue_cv: Condvar,
}

impl ToneQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY_MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(QUEUE_CAPACITY_MAX).max(1);
        ToneQueue {
            inner: Mutex::new(Inner {
                buffer: vec![
                    Tone::new(0, 0, crate::tone::SlopeMode::NoSlopes).unwrap();
                    capacity
                ],
                capacity,
                head: 0,
                tail: 0,
                length: 0,
                state: QueueState::Empty,
                high_water: capacity,
                low_water: 0,
                low_water_cb: None,
                dequeue_generation: 0,
            }),
            wait_cv: Condvar::new(),
            dequeue_cv: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Shrinks the logical capacity (never grows beyond `QUEUE_CAPACITY_MAX`
    /// or the backing buffer's allocated size). Only safe to call on an
    /// empty queue.
    pub fn set_capacity(&self, capacity: usize) -> CwResult<()> {
        let mut inner = self.inner.lock();
        if inner.length != 0 {
            return Err(CwError::OutOfRange(
                "cannot resize a non-empty tone queue".into(),
            ));
        }
        let capacity = capacity.min(QUEUE_CAPACITY_MAX).max(1);
        inner.buffer = vec![Tone::new(0, 0, crate::tone::SlopeMode::NoSlopes).unwrap(); capacity];
        inner.capacity = capacity;
        inner.head = 0;
        inner.tail = 0;
        if inner.high_water > capacity {
            inner.high_water = capacity;
        }
        Ok(())
    }

    pub fn set_high_water_mark(&self, level: usize) {
        let mut inner = self.inner.lock();
        inner.high_water = level.min(inner.capacity);
    }

    pub fn high_water_mark(&self) -> usize {
        self.inner.lock().high_water
    }

    pub fn length(&self) -> usize {
        self.inner.lock().length
    }

    pub fn is_full(&self) -> bool {
        let inner = self.inner.lock();
        inner.length >= inner.capacity
    }

    pub fn is_nonempty(&self) -> bool {
        self.inner.lock().state == QueueState::Nonempty
    }

    pub fn is_at_or_above_high_water(&self) -> bool {
        let inner = self.inner.lock();
        inner.length >= inner.high_water
    }

    pub fn enqueue(&self, tone: Tone) -> CwResult<()> {
        tone.validate()?;
        let mut inner = self.inner.lock();
        if inner.length >= inner.capacity {
            return Err(CwError::QueueFull);
        }
        let tail = inner.tail;
        inner.buffer[tail] = tone;
        inner.tail = (inner.tail + 1) % inner.capacity;
        inner.length += 1;
        inner.state = QueueState::Nonempty;
        self.wait_cv.notify_all();
        Ok(())
    }

    /// See the module doc: a forever tone at the head is peeked (left in
    /// place, length unchanged) only while it is the sole queued item.
    /// Once another tone has been enqueued behind it, the next dequeue
    /// removes it for real and the worker moves on.
    pub fn dequeue(&self) -> DequeueResult {
        let mut inner = self.inner.lock();
        if inner.length == 0 {
            inner.state = QueueState::Empty;
            return DequeueResult::Empty;
        }

        let head_tone = inner.buffer[inner.head];
        if head_tone.is_forever && inner.length == 1 {
            return DequeueResult::Nonempty(head_tone);
        }

        inner.head = (inner.head + 1) % inner.capacity;
        inner.length -= 1;
        inner.dequeue_generation = inner.dequeue_generation.wrapping_add(1);

        let low_water = inner.low_water;
        let crossed_low_water = inner.length <= low_water;
        let cb = if crossed_low_water {
            inner.low_water_cb.clone()
        } else {
            None
        };

        let result = if inner.length == 0 {
            inner.state = QueueState::Empty;
            DequeueResult::JustEmptied(head_tone)
        } else {
            DequeueResult::Nonempty(head_tone)
        };

        drop(inner);
        self.wait_cv.notify_all();
        self.dequeue_cv.notify_all();

        if let Some(cb) = cb {
            cb();
        }

        result
    }

    /// Registers (or, with `None`, removes) the low-water callback and its
    /// trigger level.
    pub fn register_low_water_callback(&self, cb: Option<LowWaterCallback>, level: usize) {
        let mut inner = self.inner.lock();
        inner.low_water = level;
        inner.low_water_cb = cb;
    }

    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.head = 0;
        inner.tail = 0;
        inner.length = 0;
        inner.state = QueueState::Empty;
        inner.dequeue_generation = inner.dequeue_generation.wrapping_add(1);
        drop(inner);
        self.wait_cv.notify_all();
        self.dequeue_cv.notify_all();
    }

    /// Blocks until the queue has at least one tone, or `keep_waiting`
    /// (the worker's `do_work` flag) goes false. Used by a worker that
    /// just saw `Empty` and has nothing left to do but wait; woken by
    /// `flush`/`wake_waiters` so a `stop()` can unblock a worker that's
    /// sitting here with nothing queued without leaving it parked on a
    /// queue that is, by design, still empty afterward.
    pub fn wait_for_nonempty(&self, keep_waiting: &AtomicBool) {
        let mut inner = self.inner.lock();
        while inner.length == 0 && keep_waiting.load(Ordering::Acquire) {
            self.wait_cv.wait(&mut inner);
        }
    }

    /// Pings both condvars without touching queue contents or state.
    /// Lets a caller wake a parked waiter (e.g. `wait_for_nonempty`)
    /// without discarding tones the worker hasn't had a chance to act on
    /// yet, unlike `flush`.
    pub fn wake_waiters(&self) {
        self.wait_cv.notify_all();
        self.dequeue_cv.notify_all();
    }

    /// Blocks until `length() <= level`. Spurious wakeups are tolerated.
    pub fn wait_for_level(&self, level: usize) {
        let mut inner = self.inner.lock();
        while inner.length > level {
            self.wait_cv.wait(&mut inner);
        }
    }

    /// Blocks until the next real (non-peek) dequeue happens.
    pub fn wait_for_end_of_current_tone(&self) {
        let mut inner = self.inner.lock();
        let start = inner.dequeue_generation;
        while inner.dequeue_generation == start {
            self.dequeue_cv.wait(&mut inner);
        }
    }

    /// Same as `wait_for_level` but gives up after `timeout` and reports
    /// whether the condition was actually met.
    pub fn wait_for_level_timeout(&self, level: usize, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        let deadline = std::time::Instant::now() + timeout;
        while inner.length > level {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return inner.length <= level;
            }
            self.wait_cv.wait_for(&mut inner, remaining);
        }
        true
    }

    /// Walks back from the tail, removing tones until (and including) the
    /// one flagged `is_first_of_character`. Safe to call concurrently with
    /// a worker dequeuing: the tone already copied out by the worker into
    /// its local playing state is unaffected, only queued-but-unplayed
    /// tones are touched.
    pub fn remove_last_character(&self) {
        let mut inner = self.inner.lock();
        while inner.length > 0 {
            let last_index = (inner.tail + inner.capacity - 1) % inner.capacity;
            let was_first = inner.buffer[last_index].is_first_of_character;
            inner.tail = last_index;
            inner.length -= 1;
            if inner.length == 0 {
                inner.state = QueueState::Empty;
            }
            if was_first {
                break;
            }
        }
        drop(inner);
        self.wait_cv.notify_all();
    }
}

impl Default for ToneQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::SlopeMode;

    fn tone(freq: u32, dur: i64) -> Tone {
        Tone::new(freq, dur, SlopeMode::Standard).unwrap()
    }

    #[test]
    fn new_queue_is_empty() {
        let q = ToneQueue::new();
        assert_eq!(q.length(), 0);
        assert_eq!(q.capacity(), QUEUE_CAPACITY_MAX);
        assert!(matches!(q.dequeue(), DequeueResult::Empty));
    }

    #[test]
    fn fills_to_capacity_then_rejects() {
        let q = ToneQueue::with_capacity(4);
        for _ in 0..4 {
            q.enqueue(tone(500, 100)).unwrap();
        }
        assert_eq!(q.length(), 4);
        assert!(matches!(q.enqueue(tone(500, 100)), Err(CwError::QueueFull)));
        assert_eq!(q.length(), 4);
    }

    #[test]
    fn dequeue_order_matches_enqueue_order() {
        let q = ToneQueue::with_capacity(8);
        let tones: Vec<Tone> = (1..=5).map(|i| tone(500, i * 10)).collect();
        for t in &tones {
            q.enqueue(*t).unwrap();
        }
        for (i, expected) in tones.iter().enumerate() {
            let result = q.dequeue();
            let got = result.tone().unwrap();
            assert_eq!(got.duration_us, expected.duration_us);
            if i == tones.len() - 1 {
                assert!(matches!(result, DequeueResult::JustEmptied(_)));
            } else {
                assert!(matches!(result, DequeueResult::Nonempty(_)));
            }
        }
    }

    #[test]
    fn forever_tone_is_peeked_while_alone() {
        let q = ToneQueue::with_capacity(8);
        let f = Tone::forever(600, SlopeMode::Standard).unwrap();
        q.enqueue(f).unwrap();
        for _ in 0..5 {
            let r = q.dequeue();
            assert!(matches!(r, DequeueResult::Nonempty(_)));
            assert_eq!(q.length(), 1);
        }
        // a new tone arrives behind it
        q.enqueue(tone(700, 100)).unwrap();
        let r = q.dequeue();
        // the forever tone is now removed for real
        assert!(matches!(r, DequeueResult::Nonempty(t) if t.is_forever));
        assert_eq!(q.length(), 1);
        let r2 = q.dequeue();
        assert!(matches!(r2, DequeueResult::JustEmptied(t) if t.frequency == 700));
    }

    #[test]
    fn flush_empties_the_queue() {
        let q = ToneQueue::with_capacity(8);
        for _ in 0..3 {
            q.enqueue(tone(500, 100)).unwrap();
        }
        q.flush();
        assert_eq!(q.length(), 0);
        assert!(matches!(q.dequeue(), DequeueResult::Empty));
    }

    #[test]
    fn low_water_callback_fires_on_crossing() {
        let q = ToneQueue::with_capacity(8);
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired2 = fired.clone();
        q.register_low_water_callback(Some(Arc::new(move || {
            fired2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })), 1);
        for _ in 0..3 {
            q.enqueue(tone(500, 100)).unwrap();
        }
        q.dequeue(); // 3 -> 2, no crossing
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 0);
        q.dequeue(); // 2 -> 1, crosses
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_last_character_walks_back_to_first_flag() {
        let q = ToneQueue::with_capacity(8);
        let mut mark = tone(600, 50);
        mark.is_first_of_character = true;
        q.enqueue(mark).unwrap();
        q.enqueue(tone(0, 20)).unwrap(); // ims, not first
        q.enqueue(tone(0, 20)).unwrap(); // ics, not first
        assert_eq!(q.length(), 3);
        q.remove_last_character();
        assert_eq!(q.length(), 0);
    }
}
