//! # FIFO Pool
//!
//! A fixed-size worker thread pool fed by a single FIFO queue.
//!
//! ## Features
//!
//! - **Fixed worker set**: `n` OS threads spawned at construction, one per worker
//! - **FIFO dispatch**: jobs are dequeued in submission order
//! - **Fire-and-forget jobs**: [`ThreadPool::enqueue`] and [`ThreadPool::execute`]
//! - **Result handles**: [`ThreadPool::submit`] returns a [`JobHandle`] that blocks
//!   until the job's value (or its failure) is available
//! - **Panic isolation**: a panicking job never takes down its worker
//! - **Graceful shutdown**: queued jobs are drained before workers are joined
//!
//! ## Quick Start
//!
//! ```rust
//! use fifo_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::with_threads(4)?;
//!
//! // Fire-and-forget
//! for i in 0..10 {
//!     pool.enqueue(move || {
//!         println!("Job {} executing", i);
//!     })?;
//! }
//!
//! // With a result
//! let sum = pool.submit(|| (1..=10).sum::<u32>())?;
//! assert_eq!(sum.get()?, 55);
//!
//! // Drains the queue and joins the workers; dropping the pool does the same
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Pool Configuration
//!
//! ```rust
//! use fifo_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = ThreadPoolConfig::new(8).with_thread_name_prefix("my-worker");
//!
//! let pool = ThreadPool::with_config(config)?;
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! ```rust
//! use fifo_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::with_threads(2)?;
//! let handle = pool.submit(|| -> u32 { panic!("bad input") })?;
//!
//! assert!(matches!(handle.get(), Err(ThreadError::JobPanicked { .. })));
//! // The pool keeps working
//! assert_eq!(pool.submit(|| 1)?.get()?, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;

pub use crate::core::{BoxedJob, ClosureJob, Job, JobHandle, JobId, Result, ThreadError};
pub use crate::pool::{PoolState, PoolStats, ThreadPool, ThreadPoolConfig, WorkerStats};
