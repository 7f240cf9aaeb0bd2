//! In-process pub/sub bus with topic priorities and retained values
//!
//! Topics are named channels, optionally prioritised and retaining their
//! last published value. Subscribers bind a wildcard pattern (`+` for one
//! segment, `#` for the rest) and are matched against every publisher's
//! topic when either side appears. Delivery is synchronous (callback
//! invoked inline, under the bus read lock) or asynchronous (a job per
//! matched subscriber on the bus worker pool). Retained topics can also
//! be polled: `pull` returns the newest unseen value across a
//! subscriber's matched topics, highest topic priority first.
//!
//! A process-wide RW lock guards the bus entity lists; a per-topic mutex
//! guards only the (counter, last value) pair, so retained publishes
//! linearise per topic.

use crate::component::{Category, ComponentFactory, ComponentRef, ComponentResolver, ComponentState};
use crate::config;
use crate::pool::WorkerPool;
use crate::scheduler::{Schedule, Scheduler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tracing::{trace, warn};

use tether_data::Data;

/// Subscriber delivery callback: the published value and the topic name.
pub type SubCallback = Arc<dyn Fn(&Data, &str) + Send + Sync>;

/// Publisher poll callback: invoked by the bus scheduler; a returned
/// value is published synchronously.
pub type PubCallback = Arc<dyn Fn() -> Option<Data> + Send + Sync>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// MQTT-style topic match: `/`-separated segments, `+` matches exactly
/// one segment, `#` matches all remaining segments. Empty segments are
/// skipped on both sides.
pub fn topic_matches(topic: &str, pattern: &str) -> bool {
    let mut segments = topic.split('/').filter(|s| !s.is_empty());
    let mut patterns = pattern.split('/').filter(|s| !s.is_empty());
    loop {
        match (patterns.next(), segments.next()) {
            (None, None) => return true,
            (None, Some(_)) | (Some(_), None) => return false,
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(s)) => {
                if p != s {
                    return false;
                }
            }
        }
    }
}

struct Retained {
    count: u64,
    last: Option<Data>,
}

struct Topic {
    name: String,
    priority: Option<i32>,
    retain: bool,
    retained: Mutex<Retained>,
    /// Subscribers matched to this topic. Mutated only under the bus
    /// write lock.
    matches: RwLock<Vec<Subscriber>>,
    /// Async deliveries refused by the pool.
    dropped: AtomicU64,
}

// Unprioritised topics rank below any prioritised topic.
fn priority_less(a: &Topic, b: &Topic) -> bool {
    match (a.priority, b.priority) {
        (Some(pa), Some(pb)) => pa < pb,
        (Some(_), None) => false,
        (None, Some(_)) => true,
        (None, None) => false,
    }
}

struct TopicMatch {
    topic: Arc<Topic>,
    /// Topic publish counter at the last pull.
    seen: u64,
}

struct SubInner {
    bus: Weak<BusInner>,
    owner: Option<u64>,
    pattern: String,
    callback: SubCallback,
    /// Matched topics, ordered by topic priority descending.
    matches: Mutex<Vec<TopicMatch>>,
}

/// Handle to a subscription.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubInner>,
}

struct PubInner {
    bus: Weak<BusInner>,
    owner: Option<u64>,
    topic: Arc<Topic>,
    schedule: Mutex<Option<Schedule>>,
}

/// Handle to a publisher, bound to exactly one topic.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PubInner>,
}

struct BusCore {
    state: ComponentState,
    topics: Vec<Arc<Topic>>,
    publishers: Vec<Publisher>,
    subscribers: Vec<Subscriber>,
}

struct BusInner {
    core: RwLock<BusCore>,
    scheduler: Option<Scheduler>,
    pool: Option<Arc<dyn WorkerPool>>,
    interval: Duration,
}

struct BusGuard {
    inner: Arc<BusInner>,
}

impl Drop for BusGuard {
    fn drop(&mut self) {
        // Teardown order: publishers (detaching their schedules), then
        // subscribers, then topics, all under the write lock.
        let mut core = self.inner.core.write().expect("bus poisoned");
        core.state = ComponentState::Deleted;
        for publisher in core.publishers.drain(..) {
            if let Some(schedule) = publisher.inner.schedule.lock().expect("bus poisoned").take()
                && let Some(scheduler) = &self.inner.scheduler
            {
                scheduler.delete(schedule);
            }
        }
        for subscriber in core.subscribers.drain(..) {
            subscriber.inner.matches.lock().expect("bus poisoned").clear();
        }
        for topic in core.topics.drain(..) {
            topic.matches.write().expect("bus poisoned").clear();
            topic.retained.lock().expect("bus poisoned").last = None;
        }
    }
}

/// Handle to a bus. Cloning shares it; dropping the last handle drains
/// publishers, subscribers and topics.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
    _guard: Arc<BusGuard>,
}

impl Bus {
    /// A bus delivering through `pool` (when publishing asynchronously)
    /// and polling publisher callbacks through `scheduler` at `interval`.
    pub fn new(
        scheduler: Option<Scheduler>,
        pool: Option<Arc<dyn WorkerPool>>,
        interval: Duration,
    ) -> Bus {
        let inner = Arc::new(BusInner {
            core: RwLock::new(BusCore {
                state: ComponentState::Stopped,
                topics: Vec::new(),
                publishers: Vec::new(),
                subscribers: Vec::new(),
            }),
            scheduler,
            pool,
            interval,
        });
        Bus { _guard: Arc::new(BusGuard { inner: inner.clone() }), inner }
    }

    pub fn start(&self) {
        let mut core = self.inner.core.write().expect("bus poisoned");
        if core.state == ComponentState::Stopped {
            core.state = ComponentState::Running;
        }
    }

    pub fn stop(&self) {
        let mut core = self.inner.core.write().expect("bus poisoned");
        if core.state == ComponentState::Running {
            core.state = ComponentState::Stopped;
        }
    }

    /// Declare a topic up front with an explicit retain flag and
    /// priority. Publishing to an unknown topic creates it with neither.
    pub fn topic_create(&self, name: &str, retain: bool, priority: Option<i32>) {
        let mut core = self.inner.core.write().expect("bus poisoned");
        topic_create_locked(&mut core, name, retain, priority);
    }

    /// Events dropped on a topic because the pool refused delivery jobs.
    pub fn topic_dropped(&self, name: &str) -> u64 {
        let core = self.inner.core.read().expect("bus poisoned");
        core.topics
            .iter()
            .find(|t| t.name == name)
            .map_or(0, |t| t.dropped.load(Ordering::Relaxed))
    }

    /// Bind a publisher to `topic`. With a callback and a scheduler on
    /// the bus, the callback is polled at the bus interval and non-null
    /// results are published synchronously. `owner` suppresses delivery
    /// to subscribers carrying the same token.
    pub fn publisher(
        &self,
        topic: &str,
        owner: Option<u64>,
        callback: Option<PubCallback>,
    ) -> Publisher {
        let mut core = self.inner.core.write().expect("bus poisoned");
        let (topic, existed) = topic_create_locked(&mut core, topic, false, None);
        let publisher = Publisher {
            inner: Arc::new(PubInner {
                bus: Arc::downgrade(&self.inner),
                owner,
                topic: topic.clone(),
                schedule: Mutex::new(None),
            }),
        };
        core.publishers.push(publisher.clone());
        if let (Some(callback), Some(scheduler)) = (callback, &self.inner.scheduler) {
            let weak = Arc::downgrade(&publisher.inner);
            let schedule = scheduler.create(
                move || {
                    if let Some(publisher) = weak.upgrade()
                        && let Some(data) = callback()
                    {
                        publish_from(&publisher, data, true);
                    }
                },
                self.inner.interval,
                Duration::ZERO,
                0,
                self.inner.pool.clone(),
                topic.priority,
            );
            scheduler.add(&schedule);
            *publisher.inner.schedule.lock().expect("bus poisoned") = Some(schedule);
        }
        if !existed {
            // New topic: check it against the existing subscriber set
            for subscriber in core.subscribers.iter() {
                match_topic_locked(&topic, owner, subscriber);
            }
        }
        publisher
    }

    /// Subscribe `callback` to every current and future topic matching
    /// `pattern`.
    pub fn subscriber(
        &self,
        pattern: &str,
        owner: Option<u64>,
        callback: impl Fn(&Data, &str) + Send + Sync + 'static,
    ) -> Subscriber {
        let mut core = self.inner.core.write().expect("bus poisoned");
        let subscriber = Subscriber {
            inner: Arc::new(SubInner {
                bus: Arc::downgrade(&self.inner),
                owner,
                pattern: pattern.to_owned(),
                callback: Arc::new(callback),
                matches: Mutex::new(Vec::new()),
            }),
        };
        core.subscribers.push(subscriber.clone());
        for publisher in core.publishers.iter() {
            match_topic_locked(&publisher.inner.topic, publisher.inner.owner, &subscriber);
        }
        subscriber
    }

    /// Detach a publisher: its schedule is deleted and it leaves the bus
    /// lists. The topic and its retained value stay.
    pub fn remove_publisher(&self, publisher: &Publisher) {
        let mut core = self.inner.core.write().expect("bus poisoned");
        if let Some(schedule) = publisher.inner.schedule.lock().expect("bus poisoned").take()
            && let Some(scheduler) = &self.inner.scheduler
        {
            scheduler.delete(schedule);
        }
        core.publishers.retain(|p| !Arc::ptr_eq(&p.inner, &publisher.inner));
    }

    /// Detach a subscriber from the bus and from every matched topic.
    pub fn remove_subscriber(&self, subscriber: &Subscriber) {
        let mut core = self.inner.core.write().expect("bus poisoned");
        for topic in core.topics.iter() {
            topic
                .matches
                .write()
                .expect("bus poisoned")
                .retain(|s| !Arc::ptr_eq(&s.inner, &subscriber.inner));
        }
        subscriber.inner.matches.lock().expect("bus poisoned").clear();
        core.subscribers.retain(|s| !Arc::ptr_eq(&s.inner, &subscriber.inner));
    }

    pub fn factory() -> ComponentFactory {
        ComponentFactory {
            type_name: "tether::bus",
            category: Category::Core,
            configure: |resolver: &dyn ComponentResolver, map: &Data| {
                // Interval is configured in microseconds
                let interval = config::config_u64(map, "Interval")
                    .map(Duration::from_micros)
                    .unwrap_or(DEFAULT_POLL_INTERVAL);
                let scheduler = config::config_string(map, "Scheduler")
                    .and_then(|name| resolver.find_component(name))
                    .and_then(|c| c.downcast_ref::<Scheduler>().cloned());
                let pool = config::config_string(map, "ThreadPool")
                    .and_then(|name| resolver.find_component(name))
                    .and_then(|c| c.downcast::<crate::pool::ThreadPool>().ok())
                    .map(|p| p as Arc<dyn WorkerPool>);
                let bus = Bus::new(scheduler, pool, interval);
                if let Some(topics) = map.map_get_vector("Topics") {
                    for entry in topics.vector_iter().flatten() {
                        let name = config::config_string(entry, "Topic");
                        let priority = config::config_i64(entry, "Priority").map(|p| p as i32);
                        let retain = entry.map_get_bool("Retain", false);
                        if let Some(name) = name {
                            bus.topic_create(name, retain, priority);
                        }
                    }
                }
                Some(Arc::new(bus) as ComponentRef)
            },
        }
    }
}

fn topic_create_locked(
    core: &mut BusCore,
    name: &str,
    retain: bool,
    priority: Option<i32>,
) -> (Arc<Topic>, bool) {
    if let Some(topic) = core.topics.iter().find(|t| t.name == name) {
        return (topic.clone(), true);
    }
    let topic = Arc::new(Topic {
        name: name.to_owned(),
        priority,
        retain,
        retained: Mutex::new(Retained { count: 0, last: None }),
        matches: RwLock::new(Vec::new()),
        dropped: AtomicU64::new(0),
    });
    trace!(topic = name, retain, ?priority, "topic created");
    core.topics.push(topic.clone());
    (topic, false)
}

/// Pair one topic with one subscriber when the pattern matches and the
/// owners differ. Caller holds the bus write lock.
fn match_topic_locked(topic: &Arc<Topic>, pub_owner: Option<u64>, subscriber: &Subscriber) {
    let owner_clash = match (pub_owner, subscriber.inner.owner) {
        (Some(p), Some(s)) => p == s,
        _ => false,
    };
    if owner_clash || !topic_matches(&topic.name, &subscriber.inner.pattern) {
        return;
    }
    trace!(topic = topic.name, pattern = subscriber.inner.pattern, "subscription matched");
    {
        let mut matches = topic.matches.write().expect("bus poisoned");
        if !matches.iter().any(|s| Arc::ptr_eq(&s.inner, &subscriber.inner)) {
            matches.push(subscriber.clone());
        }
    }
    let mut matches = subscriber.inner.matches.lock().expect("bus poisoned");
    if matches.iter().any(|m| Arc::ptr_eq(&m.topic, topic)) {
        return;
    }
    // Keep the list ordered by topic priority, highest first
    let position = matches
        .iter()
        .position(|m| !priority_less(topic, &m.topic))
        .unwrap_or(matches.len());
    matches.insert(position, TopicMatch { topic: topic.clone(), seen: 0 });
}

fn publish_from(publisher: &Arc<PubInner>, data: Data, sync: bool) {
    let Some(bus) = publisher.bus.upgrade() else { return };
    let topic = &publisher.topic;

    if topic.retain {
        let mut retained = topic.retained.lock().expect("bus poisoned");
        retained.count += 1;
        retained.last = Some(data.clone());
    }

    // Deliveries run under the bus read lock
    let core = bus.core.read().expect("bus poisoned");
    let matches = topic.matches.read().expect("bus poisoned");
    for subscriber in matches.iter() {
        if sync {
            (subscriber.inner.callback)(&data, &topic.name);
        } else if let Some(pool) = &bus.pool {
            let data = data.clone();
            let subscriber = subscriber.clone();
            let publisher = publisher.clone();
            let job = Box::new(move || {
                (subscriber.inner.callback)(&data, &publisher.topic.name);
            });
            if !pool.try_add_work(job, topic.priority)
                && topic.dropped.fetch_add(1, Ordering::Relaxed) == 0
            {
                warn!(topic = topic.name, "async delivery dropped");
            }
        } else {
            // No pool: asynchronous delivery is not possible
            break;
        }
    }
    drop(matches);
    drop(core);
}

impl Publisher {
    pub fn topic_name(&self) -> &str {
        &self.inner.topic.name
    }

    /// Publish `data` on the bound topic. Retaining topics store the
    /// value and advance their counter first; matched subscribers are
    /// then delivered inline (`sync`) or via pool jobs.
    pub fn publish(&self, data: Data, sync: bool) {
        publish_from(&self.inner, data, sync);
    }
}

impl Subscriber {
    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    /// The newest unseen retained value across matched topics, highest
    /// topic priority first; `None` when every counter has been seen.
    pub fn pull(&self) -> Option<Data> {
        let Some(bus) = self.inner.bus.upgrade() else { return None };
        let _core = bus.core.read().expect("bus poisoned");
        let mut matches = self.inner.matches.lock().expect("bus poisoned");
        for m in matches.iter_mut() {
            if !m.topic.retain {
                continue;
            }
            let retained = m.topic.retained.lock().expect("bus poisoned");
            if m.seen < retained.count {
                m.seen = retained.count;
                if let Some(last) = &retained.last {
                    return Some(last.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("a/b/c", "a/+/c"));
        assert!(topic_matches("a/b/c", "a/#"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/d/#"));
        assert!(topic_matches("a/b/c", "a/b/c"));
        assert!(topic_matches("a", "#"));
        assert!(!topic_matches("a/b/c", "+"));
        assert!(topic_matches("a/b/c", "+/+/+"));
        assert!(!topic_matches("a/b/c", "a/+"));
        // strtok-style: empty segments are skipped
        assert!(topic_matches("a//b", "a/b"));
        assert!(topic_matches("/a/b", "a/+"));
    }

    #[test]
    fn test_retained_pull_without_threads() {
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        bus.topic_create("utest/nothread", true, None);
        let publisher = bus.publisher("utest/nothread", None, None);
        let subscriber = bus.subscriber("utest/#", None, |_, _| {});
        let data = Data::from(45u32);
        publisher.publish(data.clone(), false);
        let pulled = subscriber.pull().expect("retained value available");
        assert!(pulled.same(&data), "pull returns the retained instance");
        assert_eq!(pulled.as_u32(), Some(45));
        assert!(subscriber.pull().is_none(), "pull is idempotent until the next publish");
    }

    #[test]
    fn test_retained_pull_priority_order() {
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        bus.topic_create("utest/topic-p0", true, None);
        bus.topic_create("utest/topic-p2", true, Some(11));
        bus.topic_create("utest/topic-p1", true, Some(10));
        let pub0 = bus.publisher("utest/topic-p0", None, None);
        let pub2 = bus.publisher("utest/topic-p2", None, None);
        let pub1 = bus.publisher("utest/topic-p1", None, None);
        let subscriber = bus.subscriber("utest/+", None, |_, _| {});

        pub0.publish(Data::from(0u32), false);
        pub2.publish(Data::from(2u32), false);
        pub1.publish(Data::from(1u32), false);

        assert_eq!(subscriber.pull().and_then(|d| d.as_u32()), Some(2));
        assert_eq!(subscriber.pull().and_then(|d| d.as_u32()), Some(1));
        assert_eq!(subscriber.pull().and_then(|d| d.as_u32()), Some(0));
        assert!(subscriber.pull().is_none());
    }

    #[test]
    fn test_sync_delivery() {
        use std::sync::Mutex;
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        let seen: Arc<Mutex<Vec<(String, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let probe = seen.clone();
        let publisher = bus.publisher("sensors/temp", None, None);
        let _subscriber = bus.subscriber("sensors/#", None, move |data, topic| {
            probe.lock().unwrap().push((topic.to_owned(), data.as_u32().unwrap()));
        });
        publisher.publish(Data::from(21u32), true);
        publisher.publish(Data::from(22u32), true);
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![("sensors/temp".into(), 21), ("sensors/temp".into(), 22)]);
    }

    #[test]
    fn test_subscriber_before_publisher() {
        use std::sync::atomic::AtomicU32;
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        let count = Arc::new(AtomicU32::new(0));
        let probe = count.clone();
        let _subscriber = bus.subscriber("late/+", None, move |_, _| {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        // Publisher created after the subscriber creates the topic and
        // matches it against the existing subscriber set
        let publisher = bus.publisher("late/topic", None, None);
        publisher.publish(Data::from(1u8), true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_owner_not_delivered() {
        use std::sync::atomic::AtomicU32;
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        let count = Arc::new(AtomicU32::new(0));
        let probe = count.clone();
        let _subscriber = bus.subscriber("loop/#", Some(7), move |_, _| {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        let own = bus.publisher("loop/echo", Some(7), None);
        let other = bus.publisher("loop/echo2", Some(8), None);
        own.publish(Data::from(1u8), true);
        other.publish(Data::from(2u8), true);
        assert_eq!(count.load(Ordering::SeqCst), 1, "own publishes are not delivered back");
    }

    #[test]
    fn test_remove_subscriber_stops_delivery() {
        use std::sync::atomic::AtomicU32;
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        let count = Arc::new(AtomicU32::new(0));
        let probe = count.clone();
        let subscriber = bus.subscriber("r/#", None, move |_, _| {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        let publisher = bus.publisher("r/t", None, None);
        publisher.publish(Data::from(1u8), true);
        bus.remove_subscriber(&subscriber);
        publisher.publish(Data::from(2u8), true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_after_bus_drop_is_noop() {
        let bus = Bus::new(None, None, DEFAULT_POLL_INTERVAL);
        let publisher = bus.publisher("gone/t", None, None);
        drop(bus);
        publisher.publish(Data::from(1u8), true);
        // no delivery targets and no panic
    }
}
