//! Core types and traits for the thread pool

pub mod error;
pub mod job;
pub mod result;

pub use error::{Result, ThreadError};
pub use job::{BoxedJob, ClosureJob, Job};
pub use result::{result_channel, Completer, FailureKind, JobFailure, JobHandle, JobId};
