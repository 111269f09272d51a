//! Thread pool and worker implementations

pub mod thread_pool;
pub mod worker;

pub use thread_pool::{PoolState, PoolStats, ThreadPool, ThreadPoolConfig};
pub use worker::{LiveWorkers, Worker, WorkerStatSnapshot, WorkerStats};
