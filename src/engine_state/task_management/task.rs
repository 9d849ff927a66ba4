//! # Task System Core Trait
//!
//! ## Task Lifecycle
//! 1. A `Task` is created on the main thread and published via `TaskManager::publish_task()`
//! 2. A worker thread takes it from the work queue and calls `process()`
//! 3. The returned `Output` travels back over a channel
//! 4. The main thread collects it in `TaskManager::process_completed_tasks()`
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - `Output` must be `Send` to be transferred back to the main thread
//! - Tasks own everything they work on; nothing is shared with the main thread
//!   until the output is handed back

/// A unit of work that runs on a background worker.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Should own its data rather than borrow state that the main thread mutates
/// - Must not touch GPU resources; uploads belong to the main thread
pub trait Task: Send + 'static {
    /// What the worker hands back to the main thread.
    type Output: Send + 'static;

    /// Performs the work. Consumes the task so its data moves into the output.
    ///
    /// Errors are part of `Output`; a failing task still produces a value so the
    /// main thread can account for it.
    fn process(self) -> Self::Output;
}
