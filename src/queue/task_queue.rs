//! Unbounded FIFO queue built on a mutex and condition variable.

use super::{QueueError, QueueResult};
use crate::core::BoxedJob;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<BoxedJob>,
    closing: bool,
}

/// An unbounded FIFO job queue with a close signal.
///
/// Jobs are dequeued in insertion order. Each job is handed to exactly one
/// caller of [`pop`](Self::pop).
#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job to the tail and wakes one waiting consumer.
    ///
    /// Never fails, even after [`close`](Self::close); use
    /// [`try_push`](Self::try_push) to reject work once closing has begun.
    pub fn push(&self, job: BoxedJob) {
        self.state.lock().jobs.push_back(job);
        self.available.notify_one();
    }

    /// Appends a job unless the queue is closing.
    ///
    /// The closed check and the append happen under the same lock, so a job
    /// accepted here is guaranteed to be seen by consumers draining the queue.
    pub fn try_push(&self, job: BoxedJob) -> QueueResult<()> {
        {
            let mut state = self.state.lock();
            if state.closing {
                return Err(QueueError::Closed(job));
            }
            state.jobs.push_back(job);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a job is available or the queue is closed and empty.
    ///
    /// Returns `None` only when the queue is closed and has no jobs left.
    pub fn pop(&self) -> Option<BoxedJob> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closing {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Like [`pop`](Self::pop), but gives up after `timeout`.
    ///
    /// Returns `None` on timeout as well as when closed and empty; use
    /// [`is_closed`](Self::is_closed) to tell them apart.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<BoxedJob> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closing {
                return None;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return state.jobs.pop_front();
            }
        }
    }

    /// Marks the queue as closing and wakes every waiter. Idempotent.
    pub fn close(&self) {
        self.state.lock().closing = true;
        self.available.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closing
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Whether no jobs are queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("len", &state.jobs.len())
            .field("closing", &state.closing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClosureJob, Job};
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use std::thread;

    fn recording_job(log: &Arc<PlMutex<Vec<usize>>>, id: usize) -> BoxedJob {
        let log = Arc::clone(log);
        Box::new(ClosureJob::new(move || {
            log.lock().push(id);
            Ok(())
        }))
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        for id in 0..5 {
            queue.push(recording_job(&log, id));
        }
        assert_eq!(queue.len(), 5);

        while let Some(mut job) = queue.pop_timeout(Duration::from_millis(1)) {
            job.execute().unwrap();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_close_drains_remaining_jobs() {
        let queue = TaskQueue::new();
        queue.push(Box::new(ClosureJob::new(|| Ok(()))));
        queue.push(Box::new(ClosureJob::new(|| Ok(()))));

        queue.close();
        queue.close();
        assert!(queue.is_closed());

        assert!(queue.pop().is_some());
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_push_after_close_is_accepted() {
        let queue = TaskQueue::new();
        queue.close();
        queue.push(Box::new(ClosureJob::new(|| Ok(()))));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_try_push_rejects_after_close() {
        let queue = TaskQueue::new();
        assert!(queue
            .try_push(Box::new(ClosureJob::with_name(|| Ok(()), "accepted")))
            .is_ok());

        queue.close();
        let err = queue
            .try_push(Box::new(ClosureJob::with_name(|| Ok(()), "rejected")))
            .unwrap_err();
        assert_eq!(err.into_job().job_type(), "rejected");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop().map(|job| job.job_type().to_string()))
        };

        thread::sleep(Duration::from_millis(50));
        queue.push(Box::new(ClosureJob::with_name(|| Ok(()), "late")));

        assert_eq!(consumer.join().unwrap().as_deref(), Some("late"));
    }

    #[test]
    fn test_close_wakes_all_waiters() {
        let queue = Arc::new(TaskQueue::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop().is_none())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for consumer in consumers {
            assert!(consumer.join().unwrap());
        }
    }

    #[test]
    fn test_pop_timeout_on_empty_queue() {
        let queue = TaskQueue::new();
        assert!(queue.pop_timeout(Duration::from_millis(10)).is_none());
        assert!(!queue.is_closed());
    }

    #[test]
    fn test_each_job_popped_once() {
        let queue = Arc::new(TaskQueue::new());
        let log = Arc::new(PlMutex::new(Vec::new()));
        for id in 0..1000 {
            queue.push(recording_job(&log, id));
        }
        queue.close();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    while let Some(mut job) = queue.pop() {
                        job.execute().unwrap();
                    }
                })
            })
            .collect();
        for consumer in consumers {
            consumer.join().unwrap();
        }

        let mut ids = log.lock().clone();
        ids.sort_unstable();
        assert_eq!(ids, (0..1000).collect::<Vec<_>>());
    }
}
