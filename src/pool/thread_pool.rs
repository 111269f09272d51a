//! Thread pool implementation

use crate::core::result::ResultJob;
use crate::core::{result_channel, BoxedJob, ClosureJob, Job, JobHandle, JobId, Result, ThreadError};
use crate::pool::worker::{LiveWorkers, Worker, WorkerStatSnapshot, WorkerStats};
use crate::queue::TaskQueue;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Configuration for thread pool
///
/// Missing fields fall back to their defaults when deserialized, so a
/// config file only needs to name what it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Number of worker threads. Defaults to the number of CPUs; must be at least 1.
    pub num_threads: usize,
    /// Thread name prefix; workers are named `{prefix}-{id}`
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes (platform default when `None`)
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: "worker".to_string(),
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    /// Create a new configuration with specified number of threads
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(ThreadError::invalid_config(
                "num_threads",
                "Number of threads must be greater than 0",
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(ThreadError::invalid_config(
                "thread_name_prefix",
                "Thread names may not contain NUL bytes",
            ));
        }
        if self.stack_size == Some(0) {
            return Err(ThreadError::invalid_config(
                "stack_size",
                "Stack size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a [`ThreadPool`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    /// Accepting and running jobs
    Running,
    /// Rejecting new jobs while workers finish the queued ones
    Draining,
    /// All workers have exited
    Stopped,
}

/// Point-in-time statistics for a [`ThreadPool`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Lifecycle state when the snapshot was taken
    pub state: PoolState,
    /// Number of worker threads
    pub num_threads: usize,
    /// Jobs waiting in the queue
    pub queued_jobs: usize,
    /// Jobs accepted by the pool
    pub jobs_submitted: u64,
    /// Jobs that completed successfully
    pub jobs_processed: u64,
    /// Jobs that returned an error
    pub jobs_failed: u64,
    /// Jobs that panicked
    pub jobs_panicked: u64,
    /// Per-worker counters, indexed by worker id
    pub workers: Vec<WorkerStatSnapshot>,
}

/// A fixed-size pool of worker threads fed by a single FIFO queue
///
/// All workers are spawned at construction and live until shutdown. Jobs are
/// dequeued in submission order; completion order across workers is not
/// guaranteed.
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown), or dropping the pool, closes the queue and
/// joins every worker. Every submission that returned `Ok` runs before
/// shutdown returns; submissions made once draining has started are rejected
/// with [`ThreadError::ShuttingDown`]. The pool reports
/// [`PoolState::Stopped`] only once every worker thread has exited.
///
/// The pool is not `Clone`; share it between threads with `Arc<ThreadPool>`.
pub struct ThreadPool {
    config: ThreadPoolConfig,
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<Worker>>,
    worker_threads: Vec<ThreadId>,
    worker_stats: Vec<Arc<WorkerStats>>,
    live: Arc<LiveWorkers>,
    state: RwLock<PoolState>,
    total_jobs_submitted: AtomicU64,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("live_workers", &self.live.count())
            .field("queue", &self.queue)
            .field(
                "total_jobs_submitted",
                &self.total_jobs_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl ThreadPool {
    /// Create a thread pool with one worker per CPU
    pub fn new() -> Result<Self> {
        Self::with_config(ThreadPoolConfig::default())
    }

    /// Create a thread pool with specified number of threads
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::InvalidConfig`] if `num_threads` is 0.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(ThreadPoolConfig::new(num_threads))
    }

    /// Create a thread pool with custom configuration and spawn its workers
    ///
    /// If any worker fails to spawn, the workers already started are shut
    /// down and the error is returned; no partially staffed pool is produced.
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::new());
        let live = Arc::new(LiveWorkers::new());
        let mut workers = Vec::with_capacity(config.num_threads);
        for id in 0..config.num_threads {
            match Worker::new(
                id,
                Arc::clone(&queue),
                &live,
                &config.thread_name_prefix,
                config.stack_size,
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(
                        "thread pool '{}': failed to spawn worker {}: {}",
                        config.thread_name_prefix, id, e
                    );
                    queue.close();
                    for worker in workers {
                        if let Err(join_err) = worker.join() {
                            error!("thread pool '{}': {}", config.thread_name_prefix, join_err);
                        }
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "thread pool '{}' started with {} workers",
            config.thread_name_prefix, config.num_threads
        );

        let worker_threads = workers.iter().filter_map(Worker::thread_id).collect();
        let worker_stats = workers.iter().map(Worker::stats).collect();
        Ok(Self {
            config,
            queue,
            workers: Mutex::new(workers),
            worker_threads,
            worker_stats,
            live,
            state: RwLock::new(PoolState::Running),
            total_jobs_submitted: AtomicU64::new(0),
        })
    }

    fn push_job(&self, job: BoxedJob) -> Result<()> {
        // Counted before the push so a fast worker never finishes an uncounted job
        self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
        self.queue.try_push(job).map_err(|_| {
            self.total_jobs_submitted.fetch_sub(1, Ordering::Relaxed);
            ThreadError::shutting_down(&self.config.thread_name_prefix, self.queue.len())
        })
    }

    /// Index of the worker running on the calling thread, if any
    fn current_worker(&self) -> Option<usize> {
        let current = thread::current().id();
        self.worker_threads.iter().position(|&id| id == current)
    }

    /// Submit a job to the pool
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::ShuttingDown`] once shutdown has begun.
    pub fn submit_job<J: Job + 'static>(&self, job: J) -> Result<()> {
        self.push_job(Box::new(job))
    }

    /// Submit a closure as a job; an `Err` it returns is logged and counted
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit_job(ClosureJob::new(f))
    }

    /// Fire-and-forget: queue a closure with no way to observe its completion
    ///
    /// A panic inside the closure is caught and logged by the worker.
    pub fn enqueue<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(move || {
            f();
            Ok(())
        })
    }

    /// Queue a closure and get a handle to its return value
    ///
    /// If the closure panics, [`JobHandle::get`] returns
    /// [`ThreadError::JobPanicked`]; the worker keeps running.
    ///
    /// # Example
    ///
    /// ```
    /// use fifo_pool::prelude::*;
    ///
    /// # fn main() -> Result<()> {
    /// let pool = ThreadPool::with_threads(2)?;
    /// let handle = pool.submit(|| 3 + 4)?;
    /// assert_eq!(handle.get()?, 7);
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit<F, T>(&self, f: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_fallible(move || Ok(f()))
    }

    /// Queue a function together with the arguments to call it with
    ///
    /// The arguments are moved into the job, so nothing borrowed from the
    /// caller outlives the call.
    ///
    /// ```
    /// use fifo_pool::prelude::*;
    ///
    /// # fn main() -> Result<()> {
    /// let pool = ThreadPool::with_threads(2)?;
    /// let handle = pool.submit_with((3, 4), |(a, b): (i32, i32)| a + b)?;
    /// assert_eq!(handle.get()?, 7);
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit_with<A, F, T>(&self, args: A, f: F) -> Result<JobHandle<T>>
    where
        A: Send + 'static,
        F: FnOnce(A) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move || f(args))
    }

    /// Queue a fallible closure; an `Err` it returns is delivered through the handle
    pub fn submit_fallible<F, T>(&self, f: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let job_id = JobId::new();
        let (completer, handle) = result_channel(job_id);
        self.push_job(Box::new(ResultJob::new(f, completer)))?;
        debug!("submitted job {}", job_id);
        Ok(handle)
    }

    /// Get the pool configuration
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Get the number of worker threads
    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    /// Get the current lifecycle state
    ///
    /// A draining pool whose worker threads have all exited is reported as
    /// [`PoolState::Stopped`].
    pub fn state(&self) -> PoolState {
        match *self.state.read() {
            PoolState::Draining if self.live.count() == 0 => PoolState::Stopped,
            state => state,
        }
    }

    /// Number of worker threads that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.live.count()
    }

    /// Check if the pool is accepting jobs
    pub fn is_running(&self) -> bool {
        self.state() == PoolState::Running
    }

    /// Get total number of jobs submitted
    pub fn total_jobs_submitted(&self) -> u64 {
        self.total_jobs_submitted.load(Ordering::Relaxed)
    }

    /// Get current queue size
    ///
    /// The value may change as soon as it is returned.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Get statistics for all workers
    pub fn get_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.clone()
    }

    /// Get total jobs processed across all workers
    pub fn total_jobs_processed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_processed()).sum()
    }

    /// Get total jobs failed across all workers
    pub fn total_jobs_failed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_failed()).sum()
    }

    /// Get total jobs panicked across all workers
    pub fn total_jobs_panicked(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_panicked()).sum()
    }

    /// Take a serialisable snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state(),
            num_threads: self.num_threads(),
            queued_jobs: self.queue_size(),
            jobs_submitted: self.total_jobs_submitted(),
            jobs_processed: self.total_jobs_processed(),
            jobs_failed: self.total_jobs_failed(),
            jobs_panicked: self.total_jobs_panicked(),
            workers: self.worker_stats.iter().map(|s| s.snapshot()).collect(),
        }
    }

    /// Shutdown the thread pool and wait for all workers to finish
    ///
    /// # Graceful Shutdown
    ///
    /// 1. Moves to [`PoolState::Draining`] and closes the queue, so new
    ///    submissions are rejected
    /// 2. Waits for the workers to run every queued job and exit
    /// 3. Moves to [`PoolState::Stopped`]
    ///
    /// # Thread Safety
    ///
    /// Only the first call closes the queue and joins the workers. Later or
    /// concurrent calls block until every worker thread has exited, so
    /// whichever call returns `Ok(())` first, the queue has been drained.
    ///
    /// # Calling from a job
    ///
    /// A worker cannot wait for itself. Called from inside a job, the calling
    /// worker is detached and keeps draining the queue, the other workers are
    /// joined, and [`ThreadError::JoinError`] is returned. The pool stays in
    /// [`PoolState::Draining`] until the detached worker exits; a later
    /// `shutdown` or the pool's `Drop` on any other thread waits for it.
    pub fn shutdown(&self) -> Result<()> {
        let first = {
            let mut state = self.state.write();
            if *state == PoolState::Running {
                *state = PoolState::Draining;
                true
            } else {
                false
            }
        };
        if !first {
            return self.wait_stopped();
        }

        debug!(
            "thread pool '{}' draining {} queued jobs",
            self.config.thread_name_prefix,
            self.queue.len()
        );
        self.queue.close();

        let workers = std::mem::take(&mut *self.workers.lock());
        let mut result = Ok(());
        for worker in workers {
            if let Err(e) = worker.join() {
                error!("thread pool '{}': {}", self.config.thread_name_prefix, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if self.current_worker().is_none() {
            self.wait_stopped()?;
        }
        result
    }

    /// Block until every worker thread has exited, then mark the pool stopped
    fn wait_stopped(&self) -> Result<()> {
        if let Some(id) = self.current_worker() {
            return Err(ThreadError::join(
                id,
                "cannot wait for the pool to drain from one of its own workers",
            ));
        }

        self.live.wait_idle();

        let mut state = self.state.write();
        if *state != PoolState::Stopped {
            *state = PoolState::Stopped;
            info!(
                "thread pool '{}' stopped after {} jobs",
                self.config.thread_name_prefix,
                self.total_jobs_submitted()
            );
        }
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(
                "Failed to shutdown thread pool '{}' during drop: {}",
                self.config.thread_name_prefix, e
            );
        }
    }
}
