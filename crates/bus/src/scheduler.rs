//! Scheduler: priority-ordered timed dispatch onto a worker pool
//!
//! One timer thread owns two schedule collections: `idle` (keyed by
//! schedule id) and `queue` (keyed by absolute next-fire time in
//! nanoseconds; colliding start times are bumped by 1 ns so ordering
//! stays strict). The thread waits on the component condition until the
//! head schedule is due, runs its callbacks unlocked, submits its
//! function to the schedule's pool (or a fresh thread when it has none)
//! and requeues it at `now + period`.
//!
//! Pool refusals invoke the abort callback, bump the schedule's dropped
//! counter and log a warning exactly once per schedule.

use crate::component::{Category, ComponentFactory, ComponentRef, ComponentResolver, ComponentState};
use crate::pool::{Job, WorkerPool};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tether_data::{Data, time};
use tracing::{debug, info, trace, warn};

const DEFAULT_WAKE_NS: u64 = 24 * 60 * 60 * 1_000_000_000;

type ScheduleFn = Arc<dyn Fn() + Send + Sync>;

struct ScheduleInner {
    id: u64,
    function: ScheduleFn,
    run_cb: Mutex<Option<ScheduleFn>>,
    abort_cb: Mutex<Option<ScheduleFn>>,
    pool: Option<Arc<dyn WorkerPool>>,
    priority: Option<i32>,
    period: u64,
    start: AtomicU64,
    repeat: AtomicU64,
    dropped: AtomicU64,
    scheduled: AtomicBool,
    concurrent: AtomicBool,
    /// Instances currently executing; gates non-concurrent dispatch.
    running: AtomicU32,
}

/// Handle to a periodic or one-shot schedule.
#[derive(Clone)]
pub struct Schedule {
    inner: Arc<ScheduleInner>,
}

impl Schedule {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Events dropped because the pool refused the work.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduled.load(Ordering::Relaxed)
    }

    /// Allow overlapping executions of this schedule (off by default).
    pub fn set_concurrent(&self, enable: bool) {
        self.inner.concurrent.store(enable, Ordering::Relaxed);
    }

    /// Called (unlocked) just before each dispatch.
    pub fn set_run_callback(&self, cb: impl Fn() + Send + Sync + 'static) {
        *self.inner.run_cb.lock().expect("schedule poisoned") = Some(Arc::new(cb));
    }

    /// Called (unlocked) when a dispatch is refused by the pool.
    pub fn set_abort_callback(&self, cb: impl Fn() + Send + Sync + 'static) {
        *self.inner.abort_cb.lock().expect("schedule poisoned") = Some(Arc::new(cb));
    }
}

struct SchedulerState {
    component: ComponentState,
    queue: BTreeMap<u64, Arc<ScheduleInner>>,
    idle: HashMap<u64, Arc<ScheduleInner>>,
    next_id: u64,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    cond: Condvar,
}

struct SchedulerGuard {
    inner: Arc<SchedulerInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().expect("scheduler poisoned");
            state.component = ComponentState::Deleted;
            state.queue.clear();
            state.idle.clear();
        }
        self.inner.cond.notify_all();
        if let Some(handle) = self.thread.lock().expect("scheduler poisoned").take() {
            let _ = handle.join();
        }
    }
}

/// Handle to a scheduler. Cloning shares it; the timer thread exits when
/// the last handle is dropped.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    _guard: Arc<SchedulerGuard>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState {
                component: ComponentState::Stopped,
                queue: BTreeMap::new(),
                idle: HashMap::new(),
                next_id: 0,
            }),
            cond: Condvar::new(),
        });
        info!("scheduler created");
        let thread_inner = inner.clone();
        let thread = std::thread::spawn(move || scheduler_thread(thread_inner));
        Scheduler {
            _guard: Arc::new(SchedulerGuard { inner: inner.clone(), thread: Mutex::new(Some(thread)) }),
            inner,
        }
    }

    pub fn start(&self) {
        trace!("scheduler start");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        if state.component == ComponentState::Stopped {
            state.component = ComponentState::Running;
            drop(state);
            self.inner.cond.notify_all();
        }
    }

    pub fn stop(&self) {
        trace!("scheduler stop");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        if state.component == ComponentState::Running {
            state.component = ComponentState::Stopped;
            drop(state);
            self.inner.cond.notify_all();
        }
    }

    /// Create an idle schedule firing every `period` (first at
    /// now + `delay`), `repeat` times (0 = forever), dispatched onto
    /// `pool` with `priority` or a fresh thread when no pool is given.
    pub fn create(
        &self,
        function: impl Fn() + Send + Sync + 'static,
        period: Duration,
        delay: Duration,
        repeat: u64,
        pool: Option<Arc<dyn WorkerPool>>,
        priority: Option<i32>,
    ) -> Schedule {
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        let id = state.next_id;
        state.next_id += 1;
        let inner = Arc::new(ScheduleInner {
            id,
            function: Arc::new(function),
            run_cb: Mutex::new(None),
            abort_cb: Mutex::new(None),
            pool,
            priority,
            period: period.as_nanos() as u64,
            start: AtomicU64::new(time::now_ns() + delay.as_nanos() as u64),
            repeat: AtomicU64::new(repeat),
            dropped: AtomicU64::new(0),
            scheduled: AtomicBool::new(false),
            concurrent: AtomicBool::new(false),
            running: AtomicU32::new(0),
        });
        trace!(id, period_ns = inner.period, repeat, "schedule created");
        state.idle.insert(id, inner.clone());
        Schedule { inner }
    }

    /// Move a schedule from idle into the active queue; false when it is
    /// already scheduled. Wakes the thread when it becomes the new head.
    pub fn add(&self, schedule: &Schedule) -> bool {
        trace!(id = schedule.id(), "schedule add");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        if schedule.inner.scheduled.load(Ordering::Relaxed) {
            return false;
        }
        state.idle.remove(&schedule.inner.id);
        let front = queue_insert(&mut state, &schedule.inner, schedule.inner.start.load(Ordering::Relaxed));
        let wake = front && state.component == ComponentState::Running;
        drop(state);
        if wake {
            self.inner.cond.notify_all();
        }
        true
    }

    /// Move a schedule back to idle; false when it was not scheduled.
    pub fn remove(&self, schedule: &Schedule) -> bool {
        trace!(id = schedule.id(), "schedule remove");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        if !schedule.inner.scheduled.load(Ordering::Relaxed) {
            return false;
        }
        queue_remove(&mut state, &schedule.inner);
        state.idle.insert(schedule.inner.id, schedule.inner.clone());
        true
    }

    /// Recompute the next fire time as now + period + `delay`.
    pub fn reset(&self, schedule: &Schedule, delay: Duration) {
        trace!(id = schedule.id(), "schedule reset");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        let next = schedule.inner.period + time::now_ns() + delay.as_nanos() as u64;
        if schedule.inner.scheduled.load(Ordering::Relaxed) {
            queue_remove(&mut state, &schedule.inner);
            let front = queue_insert(&mut state, &schedule.inner, next);
            let wake = front && state.component == ComponentState::Running;
            drop(state);
            if wake {
                self.inner.cond.notify_all();
            }
        } else {
            schedule.inner.start.store(next, Ordering::Relaxed);
        }
    }

    /// Detach a schedule from the scheduler entirely.
    pub fn delete(&self, schedule: Schedule) {
        trace!(id = schedule.id(), "schedule delete");
        let mut state = self.inner.state.lock().expect("scheduler poisoned");
        if schedule.inner.scheduled.load(Ordering::Relaxed) {
            queue_remove(&mut state, &schedule.inner);
        } else {
            state.idle.remove(&schedule.inner.id);
        }
    }

    pub fn factory() -> ComponentFactory {
        ComponentFactory {
            type_name: "tether::scheduler",
            category: Category::Core,
            configure: |_resolver: &dyn ComponentResolver, _map: &Data| {
                Some(Arc::new(Scheduler::new()) as ComponentRef)
            },
        }
    }
}

impl Default for Scheduler {
    fn default() -> Scheduler {
        Scheduler::new()
    }
}

/// Insert with strict key uniqueness (+1 ns on collision); true when the
/// schedule landed at the front of the queue.
fn queue_insert(state: &mut SchedulerState, schedule: &Arc<ScheduleInner>, start: u64) -> bool {
    let mut start = start;
    while state.queue.contains_key(&start) {
        start += 1;
    }
    schedule.start.store(start, Ordering::Relaxed);
    schedule.scheduled.store(true, Ordering::Relaxed);
    state.queue.insert(start, schedule.clone());
    state.queue.keys().next() == Some(&start)
}

fn queue_remove(state: &mut SchedulerState, schedule: &Arc<ScheduleInner>) {
    state.queue.remove(&schedule.start.load(Ordering::Relaxed));
    schedule.scheduled.store(false, Ordering::Relaxed);
}

/// Run the schedule's callbacks and dispatch; the state lock is released
/// around every callback invocation.
fn dispatch<'a>(
    inner: &'a SchedulerInner,
    mut guard: MutexGuard<'a, SchedulerState>,
    schedule: &Arc<ScheduleInner>,
) -> MutexGuard<'a, SchedulerState> {
    let run_cb = schedule.run_cb.lock().expect("schedule poisoned").clone();
    if let Some(cb) = run_cb {
        drop(guard);
        cb();
        guard = inner.state.lock().expect("scheduler poisoned");
    }

    schedule.running.fetch_add(1, Ordering::AcqRel);
    let job_schedule = schedule.clone();
    let job: Job = Box::new(move || {
        (job_schedule.function)();
        job_schedule.running.fetch_sub(1, Ordering::AcqRel);
    });

    match &schedule.pool {
        Some(pool) => {
            trace!(id = schedule.id, "running schedule from worker pool");
            if !pool.try_add_work(job, schedule.priority) {
                schedule.running.fetch_sub(1, Ordering::AcqRel);
                let abort_cb = schedule.abort_cb.lock().expect("schedule poisoned").clone();
                if let Some(cb) = abort_cb {
                    drop(guard);
                    cb();
                    guard = inner.state.lock().expect("scheduler poisoned");
                }
                if schedule.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!(id = schedule.id, "scheduled event dropped");
                }
            }
        }
        None => {
            trace!(id = schedule.id, "running schedule as thread");
            std::thread::spawn(job);
        }
    }
    guard
}

fn scheduler_thread(inner: Arc<SchedulerInner>) {
    let mut guard = inner.state.lock().expect("scheduler poisoned");
    loop {
        // State wait: only Running and Deleted proceed
        while guard.component == ComponentState::Stopped {
            guard = inner.cond.wait(guard).expect("scheduler poisoned");
        }
        if guard.component == ComponentState::Deleted {
            break;
        }

        // Schedule wait until the head is due (or a long idle tick)
        let now = time::now_ns();
        let deadline = guard.queue.keys().next().copied().unwrap_or(now + DEFAULT_WAKE_NS);
        let wait = Duration::from_nanos(deadline.saturating_sub(now));
        let (g, _) = inner.cond.wait_timeout(guard, wait).expect("scheduler poisoned");
        guard = g;
        match guard.component {
            ComponentState::Deleted => {
                debug!("scheduler thread terminating");
                break;
            }
            ComponentState::Stopped => {
                debug!("scheduler thread stopping");
                continue;
            }
            ComponentState::Running => {}
        }

        // Dispatch the queue head when due
        let Some((&start, head)) = guard.queue.iter().next() else { continue };
        if start >= time::now_ns() {
            continue;
        }
        let schedule = head.clone();

        if schedule.concurrent.load(Ordering::Relaxed)
            || schedule.running.load(Ordering::Acquire) == 0
        {
            guard = dispatch(&inner, guard, &schedule);
        } else {
            trace!(id = schedule.id, "skipping schedule as running");
        }

        // The lock was released around callbacks: the schedule may have
        // been removed or the scheduler torn down meanwhile
        if guard.component != ComponentState::Running {
            continue;
        }
        if !schedule.scheduled.load(Ordering::Relaxed) {
            continue;
        }

        let next = schedule.period + time::now_ns();
        let repeat = schedule.repeat.load(Ordering::Relaxed);
        if repeat > 0 {
            schedule.repeat.store(repeat - 1, Ordering::Relaxed);
            if repeat == 1 {
                trace!(id = schedule.id, "schedule now idle");
                queue_remove(&mut guard, &schedule);
                guard.idle.insert(schedule.id, schedule.clone());
                continue;
            }
        }
        queue_remove(&mut guard, &schedule);
        queue_insert(&mut guard, &schedule, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ThreadPool;
    use serial_test::serial;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    /// A pool that refuses every job.
    struct RefusingPool;

    impl WorkerPool for RefusingPool {
        fn try_add_work(&self, _job: Job, _priority: Option<i32>) -> bool {
            false
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool, what: &str) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    #[serial]
    fn test_periodic_dispatch_on_pool() {
        let scheduler = Scheduler::new();
        let pool = Arc::new(ThreadPool::new(2, 64));
        let fired = Arc::new(AtomicU32::new(0));
        let probe = fired.clone();
        let schedule = scheduler.create(
            move || {
                probe.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(5),
            Duration::ZERO,
            0,
            Some(pool.clone()),
            Some(5),
        );
        assert!(scheduler.add(&schedule));
        assert!(!scheduler.add(&schedule), "already scheduled");
        scheduler.start();
        wait_for(|| fired.load(Ordering::SeqCst) >= 3, "three firings");
        scheduler.stop();
        assert_eq!(schedule.dropped(), 0);
    }

    #[test]
    #[serial]
    fn test_repeat_count_moves_to_idle() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicU32::new(0));
        let probe = fired.clone();
        let schedule = scheduler.create(
            move || {
                probe.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(2),
            Duration::ZERO,
            3,
            None,
            None,
        );
        scheduler.add(&schedule);
        scheduler.start();
        wait_for(|| fired.load(Ordering::SeqCst) == 3, "three repetitions");
        wait_for(|| !schedule.is_scheduled(), "idle after last repetition");
        // Settled: no further firings
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[serial]
    fn test_dropped_counting_and_abort_callback() {
        let scheduler = Scheduler::new();
        let aborts = Arc::new(AtomicU32::new(0));
        let probe = aborts.clone();
        let schedule = scheduler.create(
            || panic!("refused work must never run"),
            Duration::from_millis(2),
            Duration::ZERO,
            5,
            Some(Arc::new(RefusingPool)),
            None,
        );
        schedule.set_abort_callback(move || {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.add(&schedule);
        scheduler.start();
        wait_for(|| schedule.dropped() == 5, "five drops");
        assert_eq!(aborts.load(Ordering::SeqCst), 5);
        assert!(!schedule.is_scheduled());
    }

    #[test]
    #[serial]
    fn test_run_callback_precedes_dispatch() {
        let scheduler = Scheduler::new();
        let pool = Arc::new(ThreadPool::new(1, 8));
        let runs = Arc::new(AtomicU32::new(0));
        let fires = Arc::new(AtomicU32::new(0));
        let fire_probe = fires.clone();
        let schedule = scheduler.create(
            move || {
                fire_probe.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(3),
            Duration::ZERO,
            2,
            Some(pool.clone()),
            None,
        );
        let run_probe = runs.clone();
        schedule.set_run_callback(move || {
            run_probe.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.add(&schedule);
        scheduler.start();
        wait_for(|| fires.load(Ordering::SeqCst) == 2, "two firings");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[serial]
    fn test_remove_and_reset() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicU32::new(0));
        let probe = fired.clone();
        let schedule = scheduler.create(
            move || {
                probe.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            0,
            None,
            None,
        );
        scheduler.add(&schedule);
        assert!(scheduler.remove(&schedule));
        assert!(!scheduler.remove(&schedule));
        assert!(!schedule.is_scheduled());
        // Reset while idle just moves the start time
        scheduler.reset(&schedule, Duration::ZERO);
        scheduler.start();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 0, "idle schedule never fires");
        scheduler.delete(schedule);
    }

    #[test]
    #[serial]
    fn test_start_collision_disambiguation() {
        let scheduler = Scheduler::new();
        // Many schedules with identical start times must all queue
        let schedules: Vec<Schedule> = (0..32)
            .map(|_| {
                scheduler.create(
                    || {},
                    Duration::from_secs(60),
                    Duration::from_secs(60),
                    0,
                    None,
                    None,
                )
            })
            .collect();
        // Force identical nominal starts
        let start = time::now_ns() + 60_000_000_000;
        for s in &schedules {
            s.inner.start.store(start, Ordering::Relaxed);
        }
        for s in &schedules {
            assert!(scheduler.add(s));
        }
        let state = scheduler.inner.state.lock().unwrap();
        assert_eq!(state.queue.len(), 32, "all collided schedules queued");
        // Strictly increasing keys starting at the nominal time
        let keys: Vec<u64> = state.queue.keys().copied().collect();
        assert_eq!(keys, (start..start + 32).collect::<Vec<u64>>());
    }

    #[test]
    #[serial]
    fn test_non_concurrent_skip() {
        let scheduler = Scheduler::new();
        let pool = Arc::new(ThreadPool::new(2, 64));
        let active = Arc::new(AtomicU32::new(0));
        let overlapped = Arc::new(AtomicU32::new(0));
        let a = active.clone();
        let o = overlapped.clone();
        let schedule = scheduler.create(
            move || {
                if a.fetch_add(1, Ordering::SeqCst) > 0 {
                    o.fetch_add(1, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(20));
                a.fetch_sub(1, Ordering::SeqCst);
            },
            Duration::from_millis(1),
            Duration::ZERO,
            0,
            Some(pool.clone()),
            None,
        );
        scheduler.add(&schedule);
        scheduler.start();
        std::thread::sleep(Duration::from_millis(100));
        scheduler.stop();
        assert_eq!(overlapped.load(Ordering::SeqCst), 0, "non-concurrent never overlaps");
    }
}
