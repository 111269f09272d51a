//! Worker thread implementation

use crate::core::error::panic_message;
use crate::core::{BoxedJob, Result, ThreadError};
use crate::queue::TaskQueue;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(not(feature = "tracing"))]
use log::{debug, error, warn};
#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of jobs that completed successfully
    pub jobs_processed: AtomicU64,
    /// Total number of jobs that returned an error
    pub jobs_failed: AtomicU64,
    /// Total number of jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Total time spent processing jobs (microseconds)
    pub total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment jobs processed counter
    pub fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs failed counter
    pub fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs panicked counter
    pub fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Add processing time
    pub fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total jobs processed
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Get total jobs failed
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Get total jobs run, whatever their outcome
    pub fn get_jobs_run(&self) -> u64 {
        self.get_jobs_processed() + self.get_jobs_failed() + self.get_jobs_panicked()
    }

    /// Get average processing time per job in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_run();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Take a plain-data copy of the counters
    pub fn snapshot(&self) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            jobs_processed: self.get_jobs_processed(),
            jobs_failed: self.get_jobs_failed(),
            jobs_panicked: self.get_jobs_panicked(),
            total_processing_time_us: self.total_processing_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatSnapshot {
    /// Jobs that completed successfully
    pub jobs_processed: u64,
    /// Jobs that returned an error
    pub jobs_failed: u64,
    /// Jobs that panicked
    pub jobs_panicked: u64,
    /// Time spent running jobs (microseconds)
    pub total_processing_time_us: u64,
}

/// Number of worker threads that have not exited yet
///
/// Each worker thread holds a registration for its whole lifetime and
/// releases it on exit, including when the thread unwinds.
#[derive(Debug, Default)]
pub struct LiveWorkers {
    count: Mutex<usize>,
    exited: Condvar,
}

impl LiveWorkers {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads still running
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until every registered worker thread has exited
    pub fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.exited.wait(&mut count);
        }
    }

    fn register(self: &Arc<Self>) -> LiveGuard {
        *self.count.lock() += 1;
        LiveGuard(Arc::clone(self))
    }
}

struct LiveGuard(Arc<LiveWorkers>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            drop(count);
            self.0.exited.notify_all();
        }
    }
}

/// A worker thread that runs jobs from a shared queue
///
/// The worker does not own the queue; it exits once the queue is closed
/// and empty. The owning pool joins it at shutdown.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread named `{name_prefix}-{id}`
    ///
    /// The thread is counted in `live` until it exits.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::SpawnError`] if the OS refuses to create the thread.
    pub fn new(
        id: usize,
        queue: Arc<TaskQueue>,
        live: &Arc<LiveWorkers>,
        name_prefix: &str,
        stack_size: Option<usize>,
    ) -> Result<Self> {
        let live_guard = live.register();
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let mut builder = thread::Builder::new().name(format!("{}-{}", name_prefix, id));
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let thread = builder
            .spawn(move || {
                let _live = live_guard;
                Self::run(id, &queue, &stats_clone);
            })
            .map_err(|e| ThreadError::spawn_with_source(id, e.to_string(), e))?;

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// OS thread id of the worker, if it has not been joined
    pub fn thread_id(&self) -> Option<thread::ThreadId> {
        self.thread.as_ref().map(|t| t.thread().id())
    }

    /// Whether the calling thread is this worker's thread
    pub fn is_current(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }

    /// Wait for the worker thread to exit
    ///
    /// The queue must already be closed, or this blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::JoinError`] when called from the worker's own
    /// thread (the thread is detached instead) or if the thread panicked.
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return Err(ThreadError::join(
                    self.id,
                    "cannot join a worker from its own thread",
                ));
            }
            thread.join().map_err(|payload| {
                ThreadError::join(self.id, panic_message(payload.as_ref()))
            })?;
        }
        Ok(())
    }

    /// Worker loop: run jobs until the queue is closed and empty
    fn run(id: usize, queue: &TaskQueue, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("worker {} started", id);

        while let Some(mut job) = queue.pop() {
            Self::execute_job(id, &mut job, stats);
        }

        debug!(
            "worker {} shutting down ({} processed, {} failed, {} panicked)",
            id,
            stats.get_jobs_processed(),
            stats.get_jobs_failed(),
            stats.get_jobs_panicked()
        );
    }

    /// Execute a single job with panic protection
    fn execute_job(id: usize, job: &mut BoxedJob, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let job_span = span!(Level::DEBUG, "job_execution", job_type = job.job_type());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let start = std::time::Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                stats.increment_processed();
                #[cfg(feature = "tracing")]
                debug!(duration_ms = elapsed.as_millis() as u64, "job completed");
            }
            Ok(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    worker = id,
                    error = %e,
                    duration_ms = elapsed.as_millis() as u64,
                    "job failed"
                );
                #[cfg(not(feature = "tracing"))]
                warn!("worker {}: job {} failed: {}", id, job.job_type(), e);
                stats.increment_failed();
            }
            Err(payload) => {
                let panic_msg = panic_message(payload.as_ref());
                #[cfg(feature = "tracing")]
                tracing::error!(
                    worker = id,
                    panic_message = %panic_msg,
                    duration_ms = elapsed.as_millis() as u64,
                    "job panicked"
                );
                #[cfg(not(feature = "tracing"))]
                error!("worker {}: job {} panicked: {}", id, job.job_type(), panic_msg);
                stats.increment_panicked();
            }
        }

        stats.add_processing_time(elapsed.as_micros() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureJob;
    use std::time::Duration;

    fn wait_for(stats: &WorkerStats, jobs: u64) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while stats.get_jobs_run() < jobs && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_worker_creation() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());

        let worker = Worker::new(0, Arc::clone(&queue), &live, "worker", None)
            .expect("Failed to create worker");
        assert_eq!(worker.id(), 0);
        assert!(!worker.is_current());

        queue.close();
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_thread_name() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        let worker = Worker::new(3, Arc::clone(&queue), &live, "named", None)
            .expect("Failed to create worker");

        let (tx, rx) = std::sync::mpsc::channel();
        queue.push(Box::new(ClosureJob::new(move || {
            tx.send(thread::current().name().map(str::to_string))
                .map_err(|e| ThreadError::other(e.to_string()))
        })));

        let name = rx.recv_timeout(Duration::from_secs(5)).expect("job did not run");
        assert_eq!(name.as_deref(), Some("named-3"));

        queue.close();
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_job_execution() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        let worker = Worker::new(0, Arc::clone(&queue), &live, "worker", None)
            .expect("Failed to create worker");
        let stats = worker.stats();

        queue.push(Box::new(ClosureJob::new(|| Ok(()))));
        queue.push(Box::new(ClosureJob::new(|| Err(ThreadError::other("nope")))));
        wait_for(&stats, 2);

        assert_eq!(stats.get_jobs_processed(), 1);
        assert_eq!(stats.get_jobs_failed(), 1);

        queue.close();
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_panic_handling() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        let worker = Worker::new(0, Arc::clone(&queue), &live, "worker", None)
            .expect("Failed to create worker");
        let stats = worker.stats();

        queue.push(Box::new(ClosureJob::new(|| {
            panic!("Intentional panic for testing");
        })));
        wait_for(&stats, 1);

        assert_eq!(stats.get_jobs_panicked(), 1);
        assert_eq!(stats.get_jobs_processed(), 0);

        // The worker survives the panic
        queue.push(Box::new(ClosureJob::new(|| Ok(()))));
        wait_for(&stats, 2);
        assert_eq!(stats.get_jobs_processed(), 1);

        queue.close();
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_drains_queue_after_close() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        for _ in 0..20 {
            queue.push(Box::new(ClosureJob::new(|| Ok(()))));
        }
        queue.close();

        let worker = Worker::new(0, Arc::clone(&queue), &live, "worker", None)
            .expect("Failed to create worker");
        let stats = worker.stats();
        worker.join().expect("Failed to join worker");

        assert_eq!(stats.get_jobs_processed(), 20);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_live_workers_tracks_exit() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        let workers: Vec<_> = (0..3)
            .map(|id| {
                Worker::new(id, Arc::clone(&queue), &live, "worker", None)
                    .expect("Failed to create worker")
            })
            .collect();
        assert_eq!(live.count(), 3);

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        queue.push(Box::new(ClosureJob::new(move || {
            let _ = release_rx.recv();
            Ok(())
        })));
        queue.close();

        // Detached workers are still counted until their thread exits
        drop(workers);
        thread::sleep(Duration::from_millis(50));
        assert!(live.count() >= 1);

        release_tx.send(()).expect("job dropped its receiver");
        live.wait_idle();
        assert_eq!(live.count(), 0);
    }

    #[test]
    fn test_failed_spawn_is_not_counted() {
        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());

        let result = Worker::new(
            0,
            Arc::clone(&queue),
            &live,
            "worker",
            Some(usize::MAX / 2),
        );
        assert!(matches!(result, Err(ThreadError::SpawnError { .. })));
        assert_eq!(live.count(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = WorkerStats::new();
        stats.increment_processed();
        stats.increment_processed();
        stats.increment_panicked();
        stats.add_processing_time(30);

        let snap = stats.snapshot();
        assert_eq!(snap.jobs_processed, 2);
        assert_eq!(snap.jobs_panicked, 1);
        assert_eq!(snap.total_processing_time_us, 30);
        assert!((stats.get_average_processing_time_us() - 10.0).abs() < f64::EPSILON);
    }
}
