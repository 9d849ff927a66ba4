//! # Work Queue
//!
//! A bounded FIFO that moves ownership of work units from the producing main
//! thread to the worker pool.
//!
//! The queue is a fixed ring of `capacity` slots guarded by one mutex. The
//! non-blocking operations ([`WorkQueue::try_enqueue`], [`WorkQueue::try_dequeue`])
//! fail fast on a full or empty ring. The policy-aware operations
//! ([`WorkQueue::enqueue`], [`WorkQueue::dequeue_timeout`]) may wait, but only on a
//! condition variable, which releases the lock while parked.
//!
//! Closing the queue wakes every waiter. A closed queue accepts and hands out
//! nothing; whatever is left in it is reclaimed with [`WorkQueue::drain`].

use std::{
    fmt,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, warn};

/// What [`WorkQueue::enqueue`] does when the ring is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Reject the item immediately.
    FailFast,
    /// Wait up to `timeout` for a free slot, then reject.
    Block {
        /// Longest time a producer waits for space.
        timeout: Duration,
    },
    /// Evict the item at the front to make room, handing it back to the caller.
    DropOldest,
}

/// Returned when a work item could not be queued. The item is handed back.
pub enum EnqueueError<T> {
    /// The queue is at capacity.
    Full(T),
    /// The queue has been closed.
    Closed(T),
}

impl<T> EnqueueError<T> {
    /// Recovers the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Full(item) | EnqueueError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.write_str("Full(..)"),
            EnqueueError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.write_str("work queue is full"),
            EnqueueError::Closed(_) => f.write_str("work queue is closed"),
        }
    }
}

impl<T> std::error::Error for EnqueueError<T> {}

/// Returned when no work item could be taken from the queue.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    /// Nothing is queued.
    #[error("work queue is empty")]
    Empty,
    /// The queue has been closed.
    #[error("work queue is closed")]
    Closed,
}

struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    front: usize,
    size: usize,
    closed: bool,
}

impl<T> RingBuffer<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    fn push_back(&mut self, item: T) {
        debug_assert!(!self.is_full());
        let slot = (self.front + self.size) % self.capacity();
        self.slots[slot] = Some(item);
        self.size += 1;
    }

    fn pop_front(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        let item = self.slots[self.front].take();
        self.front = (self.front + 1) % self.capacity();
        self.size -= 1;
        item
    }
}

/// Bounded, thread-safe FIFO of work units.
pub struct WorkQueue<T> {
    state: Mutex<RingBuffer<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    policy: QueuePolicy,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue with room for `capacity` items (at least one).
    pub fn new(capacity: usize, policy: QueuePolicy) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.resize_with(capacity.max(1), || None);
        Self {
            state: Mutex::new(RingBuffer {
                slots,
                front: 0,
                size: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `item` without waiting.
    ///
    /// # Errors
    /// [`EnqueueError::Full`] when the queue is at capacity, leaving it unchanged,
    /// and [`EnqueueError::Closed`] after [`WorkQueue::close`].
    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(EnqueueError::Closed(item));
        }
        if state.is_full() {
            return Err(EnqueueError::Full(item));
        }
        state.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Queues `item` according to the queue's [`QueuePolicy`].
    ///
    /// Returns the evicted item when [`QueuePolicy::DropOldest`] had to make room.
    ///
    /// # Errors
    /// [`EnqueueError::Full`] when the queue is still full after the policy ran
    /// (immediately for `FailFast`, after the timeout for `Block`), and
    /// [`EnqueueError::Closed`] once the queue is closed.
    pub fn enqueue(&self, item: T) -> Result<Option<T>, EnqueueError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(EnqueueError::Closed(item));
        }

        let mut evicted = None;
        if state.is_full() {
            match self.policy {
                QueuePolicy::FailFast => return Err(EnqueueError::Full(item)),
                QueuePolicy::Block { timeout } => {
                    let (guard, wait) = self
                        .not_full
                        .wait_timeout_while(state, timeout, |s| s.is_full() && !s.closed)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                    if state.closed {
                        return Err(EnqueueError::Closed(item));
                    }
                    if wait.timed_out() && state.is_full() {
                        warn!(
                            target: "work-queue",
                            "No slot freed within {:?}, rejecting work item",
                            timeout
                        );
                        return Err(EnqueueError::Full(item));
                    }
                }
                QueuePolicy::DropOldest => {
                    evicted = state.pop_front();
                    debug!(target: "work-queue", "Queue full, evicted oldest work item");
                }
            }
        }

        state.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(evicted)
    }

    /// Takes the item at the front without waiting.
    ///
    /// # Errors
    /// [`DequeueError::Empty`] when nothing is queued, and
    /// [`DequeueError::Closed`] after [`WorkQueue::close`].
    pub fn try_dequeue(&self) -> Result<T, DequeueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DequeueError::Closed);
        }
        let item = state.pop_front().ok_or(DequeueError::Empty)?;
        drop(state);
        self.not_full.notify_one();
        Ok(item)
    }

    /// Takes the item at the front, waiting up to `timeout` for one to arrive.
    ///
    /// # Errors
    /// [`DequeueError::Empty`] if the timeout elapses first, and
    /// [`DequeueError::Closed`] as soon as the queue is closed.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T, DequeueError> {
        let state = self.lock();
        let (mut state, _) = self
            .not_empty
            .wait_timeout_while(state, timeout, |s| s.size == 0 && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(DequeueError::Closed);
        }
        let item = state.pop_front().ok_or(DequeueError::Empty)?;
        drop(state);
        self.not_full.notify_one();
        Ok(item)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().size
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// The policy applied by [`WorkQueue::enqueue`].
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Stops the queue and wakes every blocked producer and consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether [`WorkQueue::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Removes and returns every queued item in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let mut items = Vec::with_capacity(state.size);
        while let Some(item) = state.pop_front() {
            items.push(item);
        }
        drop(state);
        self.not_full.notify_all();
        items
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("WorkQueue")
            .field("size", &state.size)
            .field("capacity", &state.capacity())
            .field("closed", &state.closed)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Instant};

    use super::*;

    #[test]
    fn items_come_out_in_submission_order() {
        let queue = WorkQueue::new(4, QueuePolicy::FailFast);
        for item in ['A', 'B', 'C'] {
            queue.try_enqueue(item).unwrap();
        }
        assert_eq!(queue.try_dequeue(), Ok('A'));
        assert_eq!(queue.try_dequeue(), Ok('B'));
        assert_eq!(queue.try_dequeue(), Ok('C'));
    }

    #[test]
    fn full_queue_rejects_without_changing_size() {
        let queue = WorkQueue::new(2, QueuePolicy::FailFast);
        queue.try_enqueue(1).unwrap();
        queue.try_enqueue(2).unwrap();

        match queue.try_enqueue(3) {
            Err(EnqueueError::Full(item)) => assert_eq!(item, 3),
            other => panic!("expected Full, got {other:?}"),
        }
        assert!(matches!(queue.enqueue(4), Err(EnqueueError::Full(4))));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn empty_queue_reports_empty_without_changing_size() {
        let queue: WorkQueue<u32> = WorkQueue::new(2, QueuePolicy::FailFast);
        assert_eq!(queue.try_dequeue(), Err(DequeueError::Empty));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn ring_wraps_around_capacity() {
        let queue = WorkQueue::new(3, QueuePolicy::FailFast);
        for round in 0..10 {
            queue.try_enqueue(round * 2).unwrap();
            queue.try_enqueue(round * 2 + 1).unwrap();
            assert_eq!(queue.try_dequeue(), Ok(round * 2));
            assert_eq!(queue.try_dequeue(), Ok(round * 2 + 1));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 3);
    }

    #[test]
    fn drop_oldest_evicts_front() {
        let queue = WorkQueue::new(2, QueuePolicy::DropOldest);
        assert_eq!(queue.enqueue(1).unwrap(), None);
        assert_eq!(queue.enqueue(2).unwrap(), None);
        assert_eq!(queue.enqueue(3).unwrap(), Some(1));
        assert_eq!(queue.drain(), vec![2, 3]);
    }

    #[test]
    fn blocking_enqueue_times_out_when_nothing_is_consumed() {
        let timeout = Duration::from_millis(20);
        let queue = WorkQueue::new(1, QueuePolicy::Block { timeout });
        queue.enqueue(1).unwrap();

        let started = Instant::now();
        assert!(matches!(queue.enqueue(2), Err(EnqueueError::Full(2))));
        assert!(started.elapsed() >= timeout);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn blocking_enqueue_resumes_when_a_slot_frees() {
        let queue = Arc::new(WorkQueue::new(
            1,
            QueuePolicy::Block {
                timeout: Duration::from_secs(5),
            },
        ));
        queue.enqueue(1).unwrap();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                queue.try_dequeue()
            })
        };

        assert_eq!(queue.enqueue(2).unwrap(), None);
        assert_eq!(consumer.join().unwrap(), Ok(1));
        assert_eq!(queue.try_dequeue(), Ok(2));
    }

    #[test]
    fn close_wakes_waiting_consumer() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new(1, QueuePolicy::FailFast));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(10));
        queue.close();
        assert_eq!(consumer.join().unwrap(), Err(DequeueError::Closed));
        assert!(queue.is_closed());
        assert!(matches!(queue.try_enqueue(7), Err(EnqueueError::Closed(7))));
    }

    #[test]
    fn drain_after_close_returns_leftovers() {
        let queue = WorkQueue::new(4, QueuePolicy::FailFast);
        queue.try_enqueue("a").unwrap();
        queue.try_enqueue("b").unwrap();
        queue.close();
        assert_eq!(queue.try_dequeue(), Err(DequeueError::Closed));
        assert_eq!(queue.drain(), vec!["a", "b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producer_and_consumers_see_every_item_once() {
        const ITEMS: usize = 1_000;
        let queue = Arc::new(WorkQueue::new(
            8,
            QueuePolicy::Block {
                timeout: Duration::from_secs(5),
            },
        ));

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match queue.dequeue_timeout(Duration::from_millis(5)) {
                            Ok(item) => seen.push(item),
                            Err(DequeueError::Empty) => continue,
                            Err(DequeueError::Closed) => break seen,
                        }
                    }
                })
            })
            .collect();

        for item in 0..ITEMS {
            queue.enqueue(item).unwrap();
        }
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        queue.close();

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|consumer| consumer.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    }
}
