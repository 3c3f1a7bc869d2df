//! Fixed-size worker pool draining an unbounded FIFO task queue.
//!
//! The shape here — a `Mutex`-guarded queue plus a pair of `Condvar`s, one for "work is
//! available" and one for "the pool has drained" — is the same shared-state discipline the
//! teacher crate uses elsewhere for cross-thread handoff (`sessions.rs`'s `Mutex`-wrapped
//! stream/buffers), just applied to a task queue instead of a socket. The teacher's own worker
//! dispatch (`src/worker.rs`) hands connections to workers over a `crossbeam_channel` rather than
//! a condvar-guarded queue; that's a fine design too, but the spec calls for the explicit
//! FIFO-plus-two-condvars shape, so this module is a fresh implementation in that idiom rather
//! than a port of the channel-based one.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct State {
    tasks: VecDeque<Task>,
    shutdown: bool,
    alive: usize,
    working: usize,
}

struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    all_idle: Condvar,
}

/// A fixed pool of worker threads draining a shared task queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `n` worker threads, all initially blocked waiting for work.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "worker pool must have at least one thread");

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                tasks: VecDeque::new(),
                shutdown: false,
                alive: n,
                working: 0,
            }),
            work_available: Condvar::new(),
            all_idle: Condvar::new(),
        });

        let workers = (0..n)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared))
            })
            .collect();

        WorkerPool { shared, workers }
    }

    /// Pool size recommended by spec §4.3: cores × 64, sized for I/O-bound tasks that spend most
    /// of their time blocked in `read`/`write` rather than burning CPU.
    pub fn size_for_available_parallelism(threads_per_core: usize) -> usize {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        cores * threads_per_core
    }

    /// Appends a task to the FIFO queue and wakes one idle worker. Never blocks — the queue is
    /// unbounded.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        let mut state = self.shared.state.lock().unwrap();
        state.tasks.push_back(Box::new(task));
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Blocks until the queue is empty and no worker is mid-task.
    pub fn wait_idle(&self) {
        let state = self.shared.state.lock().unwrap();
        let _guard = self
            .shared
            .all_idle
            .wait_while(state, |s| !s.tasks.is_empty() || s.working > 0)
            .unwrap();
    }

    /// Signals shutdown, wakes every worker, and joins them all. Blocks until every in-flight
    /// task has finished.
    pub fn destroy(mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        self.shared.work_available.notify_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let mut state = shared.state.lock().unwrap();

        state = shared
            .work_available
            .wait_while(state, |s| s.tasks.is_empty() && !s.shutdown)
            .unwrap();

        let Some(task) = state.tasks.pop_front() else {
            // Queue empty and shutdown requested: this worker is done.
            state.alive -= 1;
            shared.all_idle.notify_all();
            return;
        };

        state.working += 1;
        drop(state);

        task();

        let mut state = shared.state.lock().unwrap();
        state.working -= 1;
        if state.tasks.is_empty() && state.working == 0 {
            shared.all_idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn submitted_tasks_all_run() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        pool.destroy();
    }

    #[test]
    fn wait_idle_returns_only_after_drain() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        pool.destroy();
    }

    #[test]
    fn destroy_joins_all_workers_without_leaking() {
        let pool = WorkerPool::new(8);
        pool.destroy();
    }

    #[test]
    fn size_for_available_parallelism_scales_by_threads_per_core() {
        let n = WorkerPool::size_for_available_parallelism(64);
        assert!(n >= 64);
        assert_eq!(n % 64, 0);
    }
}
