//! Read-through polling cache.
//!
//! Each key gets exactly one task. It reads right away and then once per
//! interval, publishing into a watch channel that every subscriber of that
//! key shares. Reads for a key never overlap, so an older response cannot
//! overwrite a newer one. The task is aborted when its last subscriber goes
//! away, and ends on its own when the runstate turns to shutting down.
//!
//! Pollers built with `with_shutdown` belong to the running library, and
//! also report read failures to the status queue.

use crate::error::Error;
use crate::misc::now_secs;
use crate::{RunState, GLOBALS};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shorter intervals are raised to this
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

type FetchFn<K, T> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<T, Error>> + Send + Sync>;

/// The latest state of a polled resource
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T> {
    /// The last successfully read value. Kept when later reads fail.
    pub value: Option<T>,

    /// When `value` was read (unix seconds)
    pub fetched_at: Option<u64>,

    /// The error from the most recent read, cleared on success
    pub last_error: Option<String>,

    /// Counts completed reads, successful or not
    pub generation: u64,
}

impl<T> Default for Polled<T> {
    fn default() -> Self {
        Polled {
            value: None,
            fetched_at: None,
            last_error: None,
            generation: 0,
        }
    }
}

struct Entry<T> {
    // Tells this entry apart from a later one for the same key
    id: u64,
    // The task holds the only sender, so subscribers see the channel close
    // when the task ends
    receiver: watch::Receiver<Polled<T>>,
    refresh: Arc<Notify>,
    subscribers: usize,
    task: JoinHandle<()>,
}

struct Inner<K, T> {
    name: &'static str,
    interval: Duration,
    fetch: FetchFn<K, T>,
    shutdown: Option<watch::Receiver<RunState>>,
    report_failures: bool,
    next_id: AtomicU64,
    entries: DashMap<K, Entry<T>>,
}

/// A set of polled resources of one kind, keyed by `K`
pub struct Poller<K, T>
where
    K: Eq + Hash,
{
    inner: Arc<Inner<K, T>>,
}

impl<K: Eq + Hash, T> Clone for Poller<K, T> {
    fn clone(&self) -> Self {
        Poller {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> Poller<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, interval: Duration, fetch: F) -> Poller<K, T>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self::build(name, interval, fetch, None)
    }

    /// Like `new`, but tasks also stop when the runstate turns to `ShuttingDown`,
    /// and failed reads are reported to the status queue
    pub fn with_shutdown<F, Fut>(
        name: &'static str,
        interval: Duration,
        fetch: F,
        runstate: watch::Receiver<RunState>,
    ) -> Poller<K, T>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self::build(name, interval, fetch, Some(runstate))
    }

    fn build<F, Fut>(
        name: &'static str,
        interval: Duration,
        fetch: F,
        shutdown: Option<watch::Receiver<RunState>>,
    ) -> Poller<K, T>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let fetch: FetchFn<K, T> =
            Arc::new(move |key| -> BoxFuture<'static, Result<T, Error>> { Box::pin(fetch(key)) });
        if interval < MIN_INTERVAL {
            tracing::warn!(
                target: "poller",
                "{}: interval {:?} is too short, using {:?}",
                name,
                interval,
                MIN_INTERVAL
            );
        }
        Poller {
            inner: Arc::new(Inner {
                name,
                interval: interval.max(MIN_INTERVAL),
                fetch,
                report_failures: shutdown.is_some(),
                shutdown,
                next_id: AtomicU64::new(0),
                entries: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Start watching `key`. The first subscriber starts the polling task;
    /// later subscribers share it.
    pub fn subscribe(&self, key: K) -> Subscription<K, T> {
        let mut entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| self.start(key.clone()));
        entry.subscribers += 1;

        let mut receiver = entry.receiver.clone();
        receiver.mark_unchanged();

        Subscription {
            id: entry.id,
            receiver,
            refresh: entry.refresh.clone(),
            key,
            inner: self.inner.clone(),
        }
    }

    /// Ask for an immediate re-read of `key`, if it is being polled
    pub fn refresh(&self, key: &K) {
        if let Some(entry) = self.inner.entries.get(key) {
            entry.refresh.notify_one();
        }
    }

    /// The current state of `key`, if it is being polled
    pub fn peek(&self, key: &K) -> Option<Polled<T>> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.receiver.borrow().clone())
    }

    /// The number of keys with a polling task
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn start(&self, key: K) -> Entry<T> {
        let (sender, receiver) = watch::channel(Polled::default());
        let refresh = Arc::new(Notify::new());
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(target: "poller", "{}: start polling {:?}", self.inner.name, key);

        let task = tokio::spawn(run(
            Arc::downgrade(&self.inner),
            id,
            key,
            sender,
            refresh.clone(),
        ));

        Entry {
            id,
            receiver,
            refresh,
            subscribers: 0,
            task,
        }
    }
}

async fn run<K, T>(
    inner: Weak<Inner<K, T>>,
    id: u64,
    key: K,
    sender: watch::Sender<Polled<T>>,
    refresh: Arc<Notify>,
) where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let (name, interval, fetch, mut shutdown, report_failures) = match inner.upgrade() {
        Some(inner) => (
            inner.name,
            inner.interval,
            inner.fetch.clone(),
            inner.shutdown.clone(),
            inner.report_failures,
        ),
        None => return,
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = refresh.notified() => {
                ticker.reset();
            },
            _ = shutting_down(&mut shutdown) => break,
        }

        let result = tokio::select! {
            result = fetch(key.clone()) => result,
            _ = shutting_down(&mut shutdown) => break,
        };

        match result {
            Ok(value) => {
                sender.send_modify(|polled| {
                    polled.value = Some(value);
                    polled.fetched_at = Some(now_secs());
                    polled.last_error = None;
                    polled.generation += 1;
                });
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(target: "poller", "{}: {:?}: {}", name, key, e);
                } else {
                    tracing::error!(target: "poller", "{}: {:?}: {}", name, key, e);
                }
                let message = format!("{}", e.kind);
                // Only a new failure goes to the status queue, not every repeat
                if report_failures && sender.borrow().last_error.as_ref() != Some(&message) {
                    GLOBALS.status_error(&format!("Could not read {}", name), &e);
                }
                sender.send_modify(|polled| {
                    polled.last_error = Some(message);
                    polled.generation += 1;
                });
            }
        }
    }

    // Only shutdown gets here. Forget the entry so the key can be polled
    // afresh, unless a newer entry has already taken its place.
    if let Some(inner) = inner.upgrade() {
        inner.entries.remove_if(&key, |_, entry| entry.id == id);
    }

    tracing::debug!(target: "poller", "{}: stopped polling {:?}", name, key);
}

async fn shutting_down(runstate: &mut Option<watch::Receiver<RunState>>) {
    match runstate {
        Some(rx) => {
            let _ = rx.wait_for(|rs| *rs == RunState::ShuttingDown).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// A live interest in one polled key. Dropping the last subscription for a
/// key stops its task.
pub struct Subscription<K, T>
where
    K: Eq + Hash,
{
    id: u64,
    key: K,
    receiver: watch::Receiver<Polled<T>>,
    refresh: Arc<Notify>,
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Subscription<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn current(&self) -> Polled<T> {
        self.receiver.borrow().clone()
    }

    pub fn value(&self) -> Option<T> {
        self.receiver.borrow().value.clone()
    }

    /// Wait until the next read completes
    pub async fn changed(&mut self) -> Result<Polled<T>, Error> {
        if self.receiver.changed().await.is_err() {
            return Err(Error::from("Polling stopped"));
        }
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Re-read now instead of waiting out the interval
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// The underlying channel, for callers that want to `select!` on it
    pub fn receiver(&self) -> watch::Receiver<Polled<T>> {
        self.receiver.clone()
    }
}

impl<K, T> Drop for Subscription<K, T>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let last = match self.inner.entries.get_mut(&self.key) {
            Some(mut entry) if entry.id == self.id => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.subscribers == 0
            }
            _ => false,
        };

        if last {
            // Someone may have subscribed in between, so check again under the lock
            if let Some((_, entry)) = self
                .inner
                .entries
                .remove_if(&self.key, |_, entry| entry.id == self.id && entry.subscribers == 0)
            {
                entry.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_poller(count: Arc<AtomicUsize>) -> Poller<u32, u32> {
        Poller::new("test", Duration::from_secs(30), move |key: u32| {
            let count = count.clone();
            async move {
                let n = count.fetch_add(1, Ordering::SeqCst) as u32 + 1;
                Ok(key * 100 + n)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_task_per_key() {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = counting_poller(count.clone());

        let mut a = poller.subscribe(7);
        let mut b = poller.subscribe(7);
        assert_eq!(poller.len(), 1);

        let polled = a.changed().await.unwrap();
        assert_eq!(polled.value, Some(701));
        assert_eq!(polled.generation, 1);
        let polled = b.changed().await.unwrap();
        assert_eq!(polled.value, Some(701));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Next read comes after the interval
        let polled = a.changed().await.unwrap();
        assert_eq!(polled.value, Some(702));
        assert_eq!(polled.generation, 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let _c = poller.subscribe(8);
        assert_eq!(poller.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_last_value_on_error() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let poller: Poller<u32, String> =
            Poller::new("flaky", Duration::from_secs(10), move |_key: u32| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok("first".to_owned())
                    } else {
                        Err(ErrorKind::Decode("garbage".to_owned()).into())
                    }
                }
            });

        let mut sub = poller.subscribe(1);
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value.as_deref(), Some("first"));
        assert_eq!(polled.last_error, None);
        let fetched_at = polled.fetched_at;

        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value.as_deref(), Some("first"));
        assert!(polled.last_error.is_some());
        assert_eq!(polled.fetched_at, fetched_at);
        assert_eq!(polled.generation, 2);
        assert_eq!(sub.value().as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh() {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = counting_poller(count.clone());
        let mut sub = poller.subscribe(1);
        sub.changed().await.unwrap();

        let start = tokio::time::Instant::now();
        sub.refresh();
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value, Some(102));
        assert!(start.elapsed() < Duration::from_secs(1));

        poller.refresh(&1);
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value, Some(103));
        assert_eq!(poller.peek(&1).unwrap().generation, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_on_last_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = counting_poller(count.clone());

        let mut a = poller.subscribe(1);
        let b = poller.subscribe(1);
        a.changed().await.unwrap();

        drop(a);
        assert_eq!(poller.len(), 1);
        drop(b);
        assert!(poller.is_empty());
        assert!(poller.peek(&1).is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let poller: Poller<u32, usize> =
            Poller::new("eager", Duration::from_secs(0), move |_key: u32| {
                let c = c.clone();
                async move { Ok(c.fetch_add(1, Ordering::SeqCst)) }
            });
        assert_eq!(poller.interval(), MIN_INTERVAL);

        let mut sub = poller.subscribe(1);
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value, Some(0));

        let start = tokio::time::Instant::now();
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value, Some(1));
        assert!(start.elapsed() >= MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_go_to_status_queue() {
        let (_write_runstate, read_runstate) = watch::channel(RunState::Online);
        let poller: Poller<u32, u32> = Poller::with_shutdown(
            "broken widget",
            Duration::from_secs(10),
            |_key: u32| async { Err(ErrorKind::Decode("x".to_owned()).into()) },
            read_runstate,
        );

        let mut sub = poller.subscribe(1);
        let polled = sub.changed().await.unwrap();
        assert!(polled.last_error.is_some());
        assert!(GLOBALS
            .status_queue
            .read()
            .read_all()
            .iter()
            .any(|m| m.text.starts_with("Could not read broken widget")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let (write_runstate, read_runstate) = watch::channel(RunState::Online);
        let poller: Poller<u32, usize> = Poller::with_shutdown(
            "shutdown",
            Duration::from_secs(10),
            move |_key: u32| {
                let c = c.clone();
                async move { Ok(c.fetch_add(1, Ordering::SeqCst)) }
            },
            read_runstate,
        );

        let mut sub = poller.subscribe(1);
        sub.changed().await.unwrap();
        write_runstate.send_replace(RunState::ShuttingDown);

        // The task ends, forgets its entry and drops its sender
        assert!(sub.changed().await.is_err());
        assert!(poller.is_empty());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Dropping the stale subscription leaves nothing behind
        drop(sub);
        assert!(poller.is_empty());
    }
}
