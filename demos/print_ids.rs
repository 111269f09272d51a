//! Fire-and-forget demo
//!
//! Queues 20 jobs on a default-sized pool. Odd ids sleep for 200ms before
//! printing, so the output order differs from the submission order.
//!
//! Run with: cargo run --example print_ids

use fifo_pool::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let pool = ThreadPool::new()?;
    // The pool does not serialise output; the jobs share their own lock
    let console = Arc::new(Mutex::new(()));

    for id in 1..=20 {
        let console = Arc::clone(&console);
        pool.enqueue(move || {
            if id % 2 == 1 {
                thread::sleep(Duration::from_millis(200));
            }
            let _guard = console.lock();
            println!("id : {} (thread {:?})", id, thread::current().id());
        })?;
    }

    // Dropping the pool drains the queue
    Ok(())
}
