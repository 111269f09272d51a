//! One-shot result channel between a submitted job and its caller
//!
//! [`result_channel`] creates a [`Completer`] / [`JobHandle`] pair that share
//! a single slot. The completer travels with the job to a worker thread; the
//! handle stays with the caller. Either side may be dropped first: the slot
//! lives as long as one of them still refers to it.
//!
//! # Example
//!
//! ```rust
//! use fifo_pool::core::{result_channel, JobId};
//!
//! let (completer, handle) = result_channel::<u32>(JobId::new());
//! std::thread::spawn(move || completer.complete(7));
//!
//! assert_eq!(handle.get().unwrap(), 7);
//! // Reading again returns the stored value without re-running anything
//! assert_eq!(handle.get().unwrap(), 7);
//! ```

use crate::core::error::{panic_message, Result, ThreadError};
use crate::core::job::Job;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier of a result-bearing job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// How a job failed to produce a value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The job returned an error
    Error,
    /// The job panicked
    Panic,
    /// The job was dropped without running to completion
    Abandoned,
}

/// A captured job failure, stored in the result slot
///
/// Kept separate from [`ThreadError`] so that the slot can be read any
/// number of times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobFailure {
    kind: FailureKind,
    message: String,
}

impl JobFailure {
    /// Failure caused by the job returning an error
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Error,
            message: message.into(),
        }
    }

    /// Failure caused by a panic inside the job
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panic,
            message: message.into(),
        }
    }

    fn abandoned() -> Self {
        Self {
            kind: FailureKind::Abandoned,
            message: String::new(),
        }
    }

    /// Kind of failure
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    fn to_error(&self, job_id: JobId) -> ThreadError {
        match self.kind {
            FailureKind::Error => ThreadError::execution(job_id.to_string(), &self.message),
            FailureKind::Panic => ThreadError::panicked(job_id.to_string(), &self.message),
            FailureKind::Abandoned => ThreadError::result_lost(job_id.to_string()),
        }
    }
}

enum Slot<T> {
    Pending,
    Value(T),
    Failure(JobFailure),
    Taken,
}

impl<T> Slot<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Create a connected completer/handle pair for the given job id
pub fn result_channel<T>(job_id: JobId) -> (Completer<T>, JobHandle<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    let completer = Completer {
        shared: Some(Arc::clone(&shared)),
        job_id,
    };
    let handle = JobHandle { shared, job_id };
    (completer, handle)
}

/// Writing side of a result channel
///
/// Both [`complete`](Self::complete) and [`fail`](Self::fail) consume the
/// completer, so a slot is written at most once. Dropping an unused completer
/// stores an "abandoned" failure, which wakes every waiter.
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
    job_id: JobId,
}

impl<T> Completer<T> {
    /// Id of the job this completer belongs to
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Store the computed value
    pub fn complete(mut self, value: T) {
        self.finish(Slot::Value(value));
    }

    /// Store a failure
    pub fn fail(mut self, failure: JobFailure) {
        self.finish(Slot::Failure(failure));
    }

    fn finish(&mut self, outcome: Slot<T>) {
        if let Some(shared) = self.shared.take() {
            {
                let mut slot = shared.slot.lock();
                if slot.is_pending() {
                    *slot = outcome;
                }
            }
            shared.ready.notify_all();
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.finish(Slot::Failure(JobFailure::abandoned()));
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("job_id", &self.job_id)
            .field("used", &self.shared.is_none())
            .finish()
    }
}

/// Caller-facing handle to the eventual result of a submitted job
///
/// Dropping the handle does not cancel the job; it still runs and its result
/// is discarded.
pub struct JobHandle<T> {
    shared: Arc<Shared<T>>,
    job_id: JobId,
}

impl<T> JobHandle<T> {
    /// Id of the job behind this handle
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Whether the job has finished (successfully or not)
    pub fn is_finished(&self) -> bool {
        !self.shared.slot.lock().is_pending()
    }

    /// Block until the job has finished
    pub fn wait(&self) {
        let mut slot = self.shared.slot.lock();
        while slot.is_pending() {
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Block until the job has finished or the timeout elapses
    ///
    /// Returns `true` if the job finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while slot.is_pending() {
            if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                return !slot.is_pending();
            }
        }
        true
    }

    /// Block until the job has finished and move its result out
    ///
    /// # Errors
    ///
    /// Returns the failure captured while the job ran.
    pub fn join(self) -> Result<T> {
        let mut slot = self.shared.slot.lock();
        while slot.is_pending() {
            self.shared.ready.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Failure(failure) => Err(failure.to_error(self.job_id)),
            Slot::Pending | Slot::Taken => Err(ThreadError::result_lost(self.job_id.to_string())),
        }
    }
}

impl<T: Clone> JobHandle<T> {
    /// Block until the job has finished and return a copy of its result
    ///
    /// Can be called any number of times; the job itself runs only once.
    ///
    /// # Errors
    ///
    /// Returns the failure captured while the job ran.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.shared.slot.lock();
        while slot.is_pending() {
            self.shared.ready.wait(&mut slot);
        }
        self.read(&slot)
            .unwrap_or_else(|| Err(ThreadError::result_lost(self.job_id.to_string())))
    }

    /// Non-blocking poll; `None` while the job is still pending
    pub fn try_get(&self) -> Option<Result<T>> {
        let slot = self.shared.slot.lock();
        self.read(&slot)
    }

    fn read(&self, slot: &Slot<T>) -> Option<Result<T>> {
        match slot {
            Slot::Pending => None,
            Slot::Value(value) => Some(Ok(value.clone())),
            Slot::Failure(failure) => Some(Err(failure.to_error(self.job_id))),
            Slot::Taken => Some(Err(ThreadError::result_lost(self.job_id.to_string()))),
        }
    }
}

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// A job that computes a value and writes it into a result channel
///
/// Panics are stored as failures and then resumed, so the worker still
/// accounts for them.
pub(crate) struct ResultJob<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    closure: Option<F>,
    completer: Option<Completer<T>>,
    name: String,
}

impl<F, T> ResultJob<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    pub(crate) fn new(closure: F, completer: Completer<T>) -> Self {
        Self {
            name: format!("ResultJob({})", completer.job_id()),
            closure: Some(closure),
            completer: Some(completer),
        }
    }
}

impl<F, T> Job for ResultJob<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    fn execute(&mut self) -> Result<()> {
        let (closure, completer) = match (self.closure.take(), self.completer.take()) {
            (Some(closure), Some(completer)) => (closure, completer),
            _ => {
                return Err(ThreadError::other(
                    "ResultJob already executed - cannot execute twice",
                ))
            }
        };
        let job_id = completer.job_id();

        match catch_unwind(AssertUnwindSafe(closure)) {
            Ok(Ok(value)) => {
                completer.complete(value);
                Ok(())
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                completer.fail(JobFailure::error(&message));
                Err(ThreadError::execution(job_id.to_string(), message))
            }
            Err(payload) => {
                completer.fail(JobFailure::panic(panic_message(payload.as_ref())));
                resume_unwind(payload)
            }
        }
    }

    fn job_type(&self) -> &str {
        &self.name
    }
}
