//! Convenient re-exports for common types and traits

pub use crate::core::{BoxedJob, ClosureJob, Job, JobHandle, JobId, Result, ThreadError};
pub use crate::pool::{PoolState, PoolStats, ThreadPool, ThreadPoolConfig, WorkerStats};
