//! Job queue shared between submitters and worker threads.
//!
//! [`TaskQueue`] is an unbounded multi-producer, multi-consumer FIFO guarded
//! by a single mutex and condition variable. Workers block in
//! [`TaskQueue::pop`] until a job arrives or the queue is closed; a closed
//! queue keeps handing out jobs until it is empty, so closing drains rather
//! than discards pending work.
//!
//! # Example
//!
//! ```rust
//! use fifo_pool::core::ClosureJob;
//! use fifo_pool::queue::TaskQueue;
//!
//! let queue = TaskQueue::new();
//! queue.push(Box::new(ClosureJob::new(|| Ok(()))));
//! queue.close();
//!
//! // Queued work is still returned after close
//! assert!(queue.pop().is_some());
//! // Closed and empty: workers stop here
//! assert!(queue.pop().is_none());
//! ```

mod task_queue;

pub use task_queue::TaskQueue;

use crate::core::BoxedJob;

/// Errors returned by queue operations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue is closed; the rejected job is handed back
    #[error("Queue is closed")]
    Closed(BoxedJob),
}

impl QueueError {
    /// Recover the job that could not be queued
    pub fn into_job(self) -> BoxedJob {
        match self {
            QueueError::Closed(job) => job,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
