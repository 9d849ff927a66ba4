//! # Task Management System
//!
//! This module runs work off the main thread on a fixed pool of worker threads.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: owns the pool, publishes tasks and collects their outputs
//! - `Task`: a unit of work executed on a worker
//! - `WorkQueue`: the bounded FIFO the workers drain
//!
//! The main thread is the only producer. Each worker loops on
//! [`WorkQueue::dequeue_timeout`], so an idle worker parks on a condition
//! variable instead of spinning, and wakes immediately when the queue closes.
//! Outputs come back over an `mpsc` channel and are only read on the main thread.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. If the queue is full the task waits in a local backlog
//! 3. `process_queued_tasks()` moves backlogged tasks into the queue as slots free up
//! 4. Workers process tasks and send their outputs back
//! 5. Outputs are collected on the main thread in `process_completed_tasks()`
//!
//! ## Shutdown
//! Dropping the manager closes the queue, releases any items still in it and
//! joins every worker.
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut task_manager = TaskManager::new(num_workers, 64, QueuePolicy::FailFast);
//! task_manager.publish_task(MyTask::new(...));
//!
//! // In your main loop:
//! task_manager.process_queued_tasks();
//! for output in task_manager.process_completed_tasks() {
//!     // ...
//! }
//! ```

pub mod task;
pub mod work_queue;

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, warn};
use task::Task;
use work_queue::{DequeueError, EnqueueError, QueuePolicy, WorkQueue};

/// How long an idle worker parks before re-checking the queue.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Manages a pool of worker threads draining a shared [`WorkQueue`].
///
/// # Fields
/// - `queue`: work shared with every worker
/// - `result_receiver`: outputs sent back by the workers
/// - `queued_tasks`: tasks that did not fit in the queue yet
/// - `dropped_tasks`: tasks evicted or rejected for good, awaiting the caller
/// - `num_tasks_in_flight`: tasks in the queue or being processed
pub struct TaskManager<T: Task> {
    queue: Arc<WorkQueue<T>>,
    result_receiver: Receiver<T::Output>,
    workers: Vec<JoinHandle<()>>,
    queued_tasks: VecDeque<T>,
    dropped_tasks: Vec<T>,
    num_tasks_in_flight: usize,
    lost_tasks: Arc<AtomicUsize>,
}

impl<T: Task> TaskManager<T> {
    /// Creates a `TaskManager` with `num_workers` threads (at least one)
    /// sharing a queue of `queue_capacity` slots.
    pub fn new(num_workers: usize, queue_capacity: usize, policy: QueuePolicy) -> Self {
        let num_workers = num_workers.max(1);
        let queue = Arc::new(WorkQueue::new(queue_capacity, policy));
        let (result_tx, result_rx) = channel::<T::Output>();
        let lost_tasks = Arc::new(AtomicUsize::new(0));

        info!(
            target: "work-queue",
            "Starting {} workers, queue capacity {}, policy {:?} (available parallelism: {:?})",
            num_workers,
            queue.capacity(),
            policy,
            thread::available_parallelism()
        );

        let workers = (0..num_workers)
            .map(|index| {
                let queue = Arc::clone(&queue);
                let result_tx = result_tx.clone();
                let lost_tasks = Arc::clone(&lost_tasks);
                thread::spawn(move || worker_loop(index, &queue, &result_tx, &lost_tasks))
            })
            .collect();

        TaskManager {
            queue,
            result_receiver: result_rx,
            workers,
            queued_tasks: VecDeque::new(),
            dropped_tasks: Vec::new(),
            num_tasks_in_flight: 0,
            lost_tasks,
        }
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task entered the work queue
    /// - `false` if it was kept in the backlog because the queue is full, or
    ///   moved to the dropped list because the queue is closed
    ///
    /// Under [`QueuePolicy::DropOldest`] a task evicted to make room is moved to
    /// the dropped list; collect it with [`TaskManager::take_dropped_tasks`].
    pub fn publish_task(&mut self, task: T) -> bool {
        if !self.queued_tasks.is_empty() {
            self.queued_tasks.push_back(task);
            return false;
        }
        self.try_send_task(task)
    }

    /// Puts a task back at the end of the backlog, for instance one evicted
    /// from the queue under [`QueuePolicy::DropOldest`]. It is sent again by
    /// [`TaskManager::process_queued_tasks`].
    pub fn requeue_task(&mut self, task: T) {
        self.queued_tasks.push_back(task);
    }

    fn try_send_task(&mut self, task: T) -> bool {
        let result = self.queue.enqueue(task);
        self.accept_enqueue_result(result)
    }

    fn try_fill_free_slot(&mut self, task: T) -> bool {
        let result = self.queue.try_enqueue(task).map(|()| None);
        self.accept_enqueue_result(result)
    }

    fn accept_enqueue_result(&mut self, result: Result<Option<T>, EnqueueError<T>>) -> bool {
        match result {
            Ok(evicted) => {
                self.num_tasks_in_flight += 1;
                if let Some(evicted) = evicted {
                    self.num_tasks_in_flight -= 1;
                    self.dropped_tasks.push(evicted);
                }
                true
            }
            Err(EnqueueError::Full(task)) => {
                debug!(target: "work-queue", "Queue full, task kept in backlog");
                self.queued_tasks.push_front(task);
                false
            }
            Err(EnqueueError::Closed(task)) => {
                warn!(target: "work-queue", "Queue closed, task dropped");
                self.dropped_tasks.push(task);
                false
            }
        }
    }

    /// Moves backlogged tasks into the work queue until it is full again.
    ///
    /// Under [`QueuePolicy::DropOldest`] backlogged tasks only take free slots
    /// and never evict queued work.
    ///
    /// Call this periodically (typically once per frame).
    pub fn process_queued_tasks(&mut self) {
        let drop_oldest = self.queue.policy() == QueuePolicy::DropOldest;
        while let Some(task) = self.queued_tasks.pop_front() {
            let sent = if drop_oldest {
                self.try_fill_free_slot(task)
            } else {
                self.try_send_task(task)
            };
            if !sent {
                break;
            }
        }
    }

    /// Collects every output the workers have sent back so far, without waiting.
    pub fn process_completed_tasks(&mut self) -> Vec<T::Output> {
        self.reclaim_lost_tasks();
        let mut outputs = Vec::new();
        while let Ok(output) = self.result_receiver.try_recv() {
            self.num_tasks_in_flight = self.num_tasks_in_flight.saturating_sub(1);
            outputs.push(output);
        }
        outputs
    }

    /// Waits up to `timeout` for the next output.
    ///
    /// # Returns
    /// - `Ok(Some(output))` when a task finished
    /// - `Ok(None)` when the timeout elapsed
    /// - `Err(RecvTimeoutError::Disconnected)` when every worker has exited
    pub fn wait_for_completed_task(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<T::Output>, RecvTimeoutError> {
        self.reclaim_lost_tasks();
        match self.result_receiver.recv_timeout(timeout) {
            Ok(output) => {
                self.num_tasks_in_flight = self.num_tasks_in_flight.saturating_sub(1);
                Ok(Some(output))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(RecvTimeoutError::Disconnected),
        }
    }

    fn reclaim_lost_tasks(&mut self) {
        let lost = self.lost_tasks.swap(0, Ordering::AcqRel);
        if lost > 0 {
            self.num_tasks_in_flight = self.num_tasks_in_flight.saturating_sub(lost);
        }
    }

    /// Removes every task that has not been picked up by a worker yet, from the
    /// backlog and from the work queue. Tasks already being processed still
    /// complete and report back.
    pub fn cancel_queued_tasks(&mut self) -> Vec<T> {
        let mut cancelled: Vec<T> = self.queued_tasks.drain(..).collect();
        let drained = self.queue.drain();
        self.num_tasks_in_flight = self.num_tasks_in_flight.saturating_sub(drained.len());
        cancelled.extend(drained);
        cancelled
    }

    /// Tasks that were evicted from, or rejected by, the work queue since the
    /// last call.
    pub fn take_dropped_tasks(&mut self) -> Vec<T> {
        std::mem::take(&mut self.dropped_tasks)
    }

    /// Tasks published but not yet reported back: backlog, queue and in progress.
    pub fn pending_tasks(&self) -> usize {
        self.queued_tasks.len() + self.num_tasks_in_flight
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// The shared work queue.
    pub fn queue(&self) -> &WorkQueue<T> {
        &self.queue
    }

    /// Closes the queue, releases what is left in it and joins every worker.
    pub fn shutdown(&mut self) {
        self.queue.close();
        let leftovers = self.queue.drain().len() + self.queued_tasks.len();
        self.queued_tasks.clear();
        if leftovers > 0 {
            debug!(target: "work-queue", "Released {} unprocessed tasks", leftovers);
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!(target: "work-queue", "Worker thread panicked during shutdown");
            }
        }
        self.num_tasks_in_flight = 0;
    }
}

impl<T: Task> Drop for TaskManager<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<T: Task>(
    index: usize,
    queue: &WorkQueue<T>,
    result_tx: &Sender<T::Output>,
    lost_tasks: &AtomicUsize,
) {
    loop {
        match queue.dequeue_timeout(WORKER_POLL_INTERVAL) {
            Ok(task) => match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
                Ok(output) => {
                    if result_tx.send(output).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    error!(target: "work-queue", "Worker {} lost a task to a panic", index);
                    lost_tasks.fetch_add(1, Ordering::AcqRel);
                }
            },
            Err(DequeueError::Empty) => continue,
            Err(DequeueError::Closed) => break,
        }
    }
    debug!(target: "work-queue", "Worker {} exiting", index);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    struct Square(u64);

    impl Task for Square {
        type Output = u64;

        fn process(self) -> u64 {
            self.0 * self.0
        }
    }

    struct Sleepy(Duration);

    impl Task for Sleepy {
        type Output = ();

        fn process(self) {
            thread::sleep(self.0);
        }
    }

    struct Explode;

    impl Task for Explode {
        type Output = ();

        fn process(self) {
            panic!("task failure");
        }
    }

    fn collect_all<T: Task>(manager: &mut TaskManager<T>) -> Vec<T::Output> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut outputs = Vec::new();
        while manager.pending_tasks() > 0 && Instant::now() < deadline {
            manager.process_queued_tasks();
            if let Ok(Some(output)) = manager.wait_for_completed_task(Duration::from_millis(20)) {
                outputs.push(output);
            }
        }
        outputs
    }

    #[test]
    fn every_published_task_reports_back() {
        let mut manager = TaskManager::new(4, 8, QueuePolicy::FailFast);
        for n in 0..100 {
            manager.publish_task(Square(n));
        }
        let mut outputs = collect_all(&mut manager);
        outputs.sort_unstable();
        assert_eq!(outputs, (0..100).map(|n| n * n).collect::<Vec<_>>());
        assert_eq!(manager.pending_tasks(), 0);
    }

    #[test]
    fn full_queue_backlogs_tasks() {
        let mut manager = TaskManager::new(1, 1, QueuePolicy::FailFast);
        let published: Vec<bool> = (0..4)
            .map(|_| manager.publish_task(Sleepy(Duration::from_millis(20))))
            .collect();
        assert!(published[0]);
        assert!(!published[3]);
        assert_eq!(manager.pending_tasks(), 4);
        assert_eq!(collect_all(&mut manager).len(), 4);
    }

    #[test]
    fn evicted_tasks_requeued_all_report_back() {
        let mut manager = TaskManager::new(1, 2, QueuePolicy::DropOldest);
        for n in 0..10 {
            manager.publish_task(Square(n));
        }
        for task in manager.take_dropped_tasks() {
            manager.requeue_task(task);
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut outputs = Vec::new();
        while manager.pending_tasks() > 0 && Instant::now() < deadline {
            manager.process_queued_tasks();
            assert!(manager.take_dropped_tasks().is_empty());
            if let Ok(Some(output)) = manager.wait_for_completed_task(Duration::from_millis(20)) {
                outputs.push(output);
            }
        }
        outputs.sort_unstable();
        assert_eq!(outputs, (0..10).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn cancel_removes_unstarted_tasks() {
        let mut manager = TaskManager::new(1, 16, QueuePolicy::FailFast);
        manager.publish_task(Sleepy(Duration::from_millis(50)));
        thread::sleep(Duration::from_millis(10));
        for _ in 0..5 {
            manager.publish_task(Sleepy(Duration::from_millis(50)));
        }

        let cancelled = manager.cancel_queued_tasks();
        assert_eq!(cancelled.len(), 5);
        assert_eq!(manager.pending_tasks(), 1);
        assert_eq!(collect_all(&mut manager).len(), 1);
    }

    #[test]
    fn panicking_task_does_not_stall_the_pool() {
        let mut manager = TaskManager::new(1, 4, QueuePolicy::FailFast);
        manager.publish_task(Explode);
        manager.publish_task(Explode);
        let outputs = collect_all(&mut manager);
        assert!(outputs.is_empty());
        assert_eq!(manager.pending_tasks(), 0);
    }

    #[test]
    fn shutdown_joins_workers() {
        let mut manager = TaskManager::new(3, 4, QueuePolicy::FailFast);
        assert_eq!(manager.num_workers(), 3);
        manager.publish_task(Square(2));
        manager.shutdown();
        assert_eq!(manager.num_workers(), 0);
        assert!(manager.queue().is_closed());
        assert!(!manager.publish_task(Square(3)));
        assert_eq!(manager.take_dropped_tasks().len(), 1);
    }
}
