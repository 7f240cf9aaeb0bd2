//! Worker pool: the job-submission contract and a bounded thread pool
//!
//! The scheduler and the bus only require [`WorkerPool`]: submit a job
//! with an advisory priority, learn immediately whether it was accepted.
//! Submitted jobs eventually run; nothing more is guaranteed.
//!
//! [`ThreadPool`] is the standard implementation: a fixed set of worker
//! threads draining a bounded queue ordered by priority (prioritised jobs
//! before unprioritised, higher first, FIFO within a priority).
//! `try_add_work` refuses when the queue is full or the pool has stopped.

use crate::component::{Category, ComponentFactory, ComponentRef, ComponentResolver};
use crate::config;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as MemOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tether_data::Data;
use tracing::trace;

/// A unit of work for the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Job-submission contract consumed by the scheduler and the bus.
pub trait WorkerPool: Send + Sync {
    /// Submit a job with an advisory priority; false when the pool
    /// cannot accept it.
    fn try_add_work(&self, job: Job, priority: Option<i32>) -> bool;
}

struct QueuedJob {
    priority: Option<i32>,
    seq: u64,
    job: Job,
}

impl QueuedJob {
    // Prioritised jobs rank above unprioritised ones
    fn rank(&self) -> (bool, i32) {
        match self.priority {
            Some(p) => (true, p),
            None => (false, i32::MIN),
        }
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &QueuedJob) -> Ordering {
        // Max-heap: higher rank first, then earlier submission first
        self.rank().cmp(&other.rank()).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &QueuedJob) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &QueuedJob) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

struct PoolState {
    queue: BinaryHeap<QueuedJob>,
    running: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    available: Condvar,
    max_jobs: usize,
    seq: AtomicU64,
}

struct PoolGuard {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().expect("pool state poisoned");
            state.running = false;
        }
        self.inner.available.notify_all();
        for handle in self.workers.lock().expect("pool workers poisoned").drain(..) {
            let _ = handle.join();
        }
    }
}

/// Fixed-size priority thread pool. Cloning shares the pool; the workers
/// stop and drain when the last handle is dropped (queued jobs still run).
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    _guard: Arc<PoolGuard>,
}

impl ThreadPool {
    pub const DEFAULT_THREADS: u32 = 2;
    pub const DEFAULT_MAX_JOBS: u32 = 64;

    pub fn new(threads: u32, max_jobs: u32) -> ThreadPool {
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState { queue: BinaryHeap::new(), running: true }),
            available: Condvar::new(),
            max_jobs: max_jobs as usize,
            seq: AtomicU64::new(0),
        });
        let workers = (0..threads.max(1))
            .map(|_| {
                let inner = inner.clone();
                std::thread::spawn(move || worker_loop(inner))
            })
            .collect();
        ThreadPool {
            _guard: Arc::new(PoolGuard { inner: inner.clone(), workers: Mutex::new(workers) }),
            inner,
        }
    }

    /// Jobs currently queued (not yet picked up by a worker).
    pub fn pending(&self) -> usize {
        self.inner.state.lock().expect("pool state poisoned").queue.len()
    }

    pub fn factory() -> ComponentFactory {
        ComponentFactory {
            type_name: "tether::pool",
            category: Category::Core,
            configure: |_resolver: &dyn ComponentResolver, map: &Data| {
                let threads =
                    config::config_u32(map, "Threads").unwrap_or(ThreadPool::DEFAULT_THREADS);
                let max_jobs =
                    config::config_u32(map, "MaxJobs").unwrap_or(ThreadPool::DEFAULT_MAX_JOBS);
                Some(Arc::new(ThreadPool::new(threads, max_jobs)) as ComponentRef)
            },
        }
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        let job = {
            let mut state = inner.state.lock().expect("pool state poisoned");
            loop {
                if let Some(next) = state.queue.pop() {
                    break next;
                }
                if !state.running {
                    return;
                }
                state = inner.available.wait(state).expect("pool state poisoned");
            }
        };
        trace!(seq = job.seq, "running pool job");
        // Callbacks must not panic; a panicking job takes its worker down
        (job.job)();
    }
}

impl WorkerPool for ThreadPool {
    fn try_add_work(&self, job: Job, priority: Option<i32>) -> bool {
        let mut state = self.inner.state.lock().expect("pool state poisoned");
        if !state.running || state.queue.len() >= self.inner.max_jobs {
            return false;
        }
        let seq = self.inner.seq.fetch_add(1, MemOrdering::Relaxed);
        state.queue.push(QueuedJob { priority, seq, job });
        drop(state);
        self.inner.available.notify_one();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_jobs_run() {
        let pool = ThreadPool::new(4, 64);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..32 {
            let counter = counter.clone();
            assert!(pool.try_add_work(
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                None,
            ));
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 32 {
            assert!(std::time::Instant::now() < deadline, "jobs did not drain");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_bounded_queue_refuses() {
        // One worker wedged on a gate so the queue fills
        let pool = ThreadPool::new(1, 2);
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let g = gate.clone();
        assert!(pool.try_add_work(
            Box::new(move || {
                let (lock, cond) = &*g;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cond.wait(open).unwrap();
                }
            }),
            None,
        ));
        // Wait for the worker to pick the blocker up
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.pending() > 0 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::yield_now();
        }
        assert!(pool.try_add_work(Box::new(|| {}), None));
        assert!(pool.try_add_work(Box::new(|| {}), None));
        // Queue now at capacity
        assert!(!pool.try_add_work(Box::new(|| {}), None));

        let (lock, cond) = &*gate;
        *lock.lock().unwrap() = true;
        cond.notify_all();
    }

    #[test]
    fn test_priority_order() {
        // Single wedged worker; queued jobs then drain by priority
        let pool = ThreadPool::new(1, 64);
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let order = Arc::new(Mutex::new(Vec::new()));

        let g = gate.clone();
        pool.try_add_work(
            Box::new(move || {
                let (lock, cond) = &*g;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cond.wait(open).unwrap();
                }
            }),
            None,
        );
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.pending() > 0 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::yield_now();
        }

        for (label, priority) in
            [("none-1", None), ("low", Some(1)), ("high", Some(9)), ("none-2", None)]
        {
            let order = order.clone();
            pool.try_add_work(
                Box::new(move || order.lock().unwrap().push(label)),
                priority,
            );
        }
        let (lock, cond) = &*gate;
        *lock.lock().unwrap() = true;
        cond.notify_all();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            {
                let seen = order.lock().unwrap();
                if seen.len() == 4 {
                    assert_eq!(*seen, vec!["high", "low", "none-1", "none-2"]);
                    break;
                }
            }
            assert!(std::time::Instant::now() < deadline, "jobs did not drain");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_drop_drains_queued_jobs() {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let pool = ThreadPool::new(2, 64);
            for _ in 0..16 {
                let counter = counter.clone();
                pool.try_add_work(
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                    None,
                );
            }
        }
        // Drop joined the workers; accepted jobs all ran
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_factory_configuration() {
        use crate::component::NoComponents;
        let factory = ThreadPool::factory();
        assert_eq!(factory.type_name, "tether::pool");
        let map = Data::from_json(r#"{"Threads": 1, "MaxJobs": 4}"#).unwrap();
        let component = (factory.configure)(&NoComponents, &map).unwrap();
        let pool = component.downcast_ref::<ThreadPool>().unwrap();
        assert!(pool.try_add_work(Box::new(|| {}), Some(3)));
    }
}
