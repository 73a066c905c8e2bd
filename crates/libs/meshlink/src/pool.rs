//! Worker event-loop pool.
//!
//! Owns a fixed set of independent tokio runtimes, one worker thread each.
//! Components take a [`Handle`] at startup and spawn their I/O and timer
//! tasks onto it, spreading peers across threads. A panic inside a spawned
//! task is contained by the task boundary and never takes down the pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::error::PoolError;

pub struct ServicePool {
    runtimes: Vec<Runtime>,
    next: AtomicUsize,
    stop: CancellationToken,
}

impl ServicePool {
    /// Start `size` worker loops. `size` must be non-zero.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroSize);
        }

        let mut runtimes = Vec::with_capacity(size);
        for index in 0..size {
            let runtime = Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name(format!("meshlink-worker-{index}"))
                .enable_all()
                .build()?;
            runtimes.push(runtime);
        }

        Ok(Self {
            runtimes,
            next: AtomicUsize::new(0),
            stop: CancellationToken::new(),
        })
    }

    /// Hand out a loop handle, round-robin across the pool.
    pub fn handle(&self) -> Handle {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.runtimes.len();
        self.runtimes[index].handle().clone()
    }

    pub fn size(&self) -> usize {
        self.runtimes.len()
    }

    /// Token observed by everything spawned through this pool; cancelled by
    /// [`shutdown`](Self::shutdown).
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Block the calling thread until [`shutdown`](Self::shutdown) is
    /// called. The worker loops keep running on their own threads the whole
    /// time. Returns as soon as the stop is observed, without draining:
    /// tasks still queued on the loops run only until the pool is dropped.
    pub fn run(&self) {
        self.runtimes[0].block_on(self.stop.cancelled());
    }

    /// Request a stop. Returns immediately; `run` unblocks and dropping the
    /// pool then winds the worker loops down, discarding work still queued.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(ServicePool::new(0), Err(PoolError::ZeroSize)));
    }

    #[test]
    fn distributes_handles_round_robin() {
        let pool = ServicePool::new(2).expect("pool");
        assert_eq!(pool.size(), 2);

        // Each loop has exactly one worker thread, so the worker's thread id
        // identifies the loop. Four consecutive grabs must alternate.
        let driver = Builder::new_current_thread().build().expect("runtime");
        let ids: Vec<_> = (0..4)
            .map(|_| {
                let join = pool.handle().spawn(async { std::thread::current().id() });
                driver.block_on(join).expect("task")
            })
            .collect();
        assert_eq!(ids[0], ids[2]);
        assert_eq!(ids[1], ids[3]);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn spawned_work_runs_on_the_pool() {
        let pool = ServicePool::new(2).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));

        let mut joins = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            joins.push(pool.handle().spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        // Drive the join handles from a throwaway runtime thread.
        let driver = Builder::new_current_thread().build().expect("runtime");
        driver.block_on(async {
            for join in joins {
                join.await.expect("task");
            }
        });

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn task_panic_does_not_take_down_the_pool() {
        let pool = ServicePool::new(1).expect("pool");
        let join = pool.handle().spawn(async {
            panic!("task failure");
        });
        let driver = Builder::new_current_thread().build().expect("runtime");
        driver.block_on(async {
            assert!(join.await.is_err());
        });

        // The loop is still alive and accepts new work.
        let join = pool.handle().spawn(async { 7usize });
        assert_eq!(driver.block_on(join).expect("task"), 7);
    }

    #[test]
    fn run_returns_after_shutdown() {
        let pool = Arc::new(ServicePool::new(1).expect("pool"));
        let runner = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.run())
        };
        pool.shutdown();
        runner.join().expect("run thread");
    }
}
