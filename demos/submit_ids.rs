//! Result-bearing demo
//!
//! Submits 20 jobs to an 8-worker pool, each returning the id it was given,
//! then reads every handle.
//!
//! Run with: cargo run --example submit_ids

use fifo_pool::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let pool = ThreadPool::with_threads(8)?;
    let console = Arc::new(Mutex::new(()));

    let handles = (1..=20)
        .map(|id| {
            let console = Arc::clone(&console);
            pool.submit_with(id, move |id: u32| {
                if id % 2 == 1 {
                    thread::sleep(Duration::from_millis(200));
                }
                let _guard = console.lock();
                println!("id : {} (thread {:?})", id, thread::current().id());
                id
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let total: u32 = handles
        .into_iter()
        .map(JobHandle::join)
        .sum::<Result<u32>>()?;
    println!("sum of ids: {}", total);

    pool.shutdown()?;
    Ok(())
}
