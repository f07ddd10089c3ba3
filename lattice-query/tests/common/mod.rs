//! Engine doubles for bridge tests.
//!
//! - [`ScriptedObserver`] delivers whatever result a test pushes.
//! - [`FetchingClient`] is a small in-memory engine that runs query
//!   functions on tokio with retries, a shared cache and working controls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::FutureExt;
use parking_lot::Mutex;

use lattice_query::{
    DefaultQueryOptions, EffectiveOptions, FetchStatus, NotifyOptions, QueryClient, QueryControls,
    QueryHandle, QueryKey, QueryObserver, QueryObserverResult, QueryStatus,
};
use lattice_query::query::{Listener, Unsubscribe};

pub type Observed = QueryObserverResult<String, String>;
pub type Options = EffectiveOptions<String, String>;

/// One call to [`QueryObserver::set_options`].
#[derive(Debug, Clone)]
pub struct SetOptionsCall {
    pub options: Options,
    pub listeners: bool,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

/// Controls that do nothing.
pub fn inert_controls() -> QueryControls<String, String> {
    QueryControls::new(|_| futures_util::future::pending().boxed(), || {})
}

pub fn pending() -> Observed {
    QueryObserverResult::pending(inert_controls())
}

pub fn loading() -> Observed {
    let mut result = pending();
    result.fetch_status = FetchStatus::Fetching;
    result
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    active: Vec<(u64, Listener<String, String>)>,
}

// ----------------------------------------------------------------------------
// Scripted engine
// ----------------------------------------------------------------------------

/// An observer whose results are pushed by the test.
///
/// Pushed results also reach listeners that already unsubscribed, to model
/// notifications that were in flight during teardown.
pub struct ScriptedObserver {
    key: QueryKey,
    current: Mutex<Observed>,
    listeners: Arc<Mutex<ListenerSet>>,
    every_listener: Mutex<Vec<Listener<String, String>>>,
    calls: Mutex<Vec<SetOptionsCall>>,
}

impl ScriptedObserver {
    pub fn new(key: &str, initial: Observed) -> Arc<Self> {
        Arc::new(Self {
            key: QueryKey::from(key),
            current: Mutex::new(initial),
            listeners: Arc::new(Mutex::new(ListenerSet::default())),
            every_listener: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Make `result` current and deliver it.
    pub fn push(&self, result: Observed) {
        *self.current.lock() = result.clone();
        let listeners = self.every_listener.lock().clone();
        for listener in listeners {
            listener(result.clone());
        }
    }

    /// Change the current result with `f` and deliver it.
    pub fn update(&self, f: impl FnOnce(&mut Observed)) {
        let mut next = self.current.lock().clone();
        f(&mut next);
        self.push(next);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().active.len()
    }

    pub fn set_options_calls(&self) -> Vec<SetOptionsCall> {
        self.calls.lock().clone()
    }
}

impl QueryObserver<String, String> for ScriptedObserver {
    fn subscribe(&self, listener: Listener<String, String>) -> Unsubscribe {
        self.every_listener.lock().push(Arc::clone(&listener));

        let id = {
            let mut listeners = self.listeners.lock();
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners.active.push((id, listener));
            id
        };

        let listeners = Arc::clone(&self.listeners);
        Box::new(move || listeners.lock().active.retain(|(other, _)| *other != id))
    }

    fn get_optimistic_result(&self, _options: &Options) -> Observed {
        self.current.lock().clone()
    }

    fn set_options(&self, options: &Options, notify: NotifyOptions) {
        self.calls.lock().push(SetOptionsCall {
            options: options.clone(),
            listeners: notify.listeners,
        });
    }

    fn get_current_result(&self) -> Observed {
        self.current.lock().clone()
    }

    fn get_current_query(&self) -> QueryHandle {
        let mut handle = QueryHandle::new(self.key.clone());
        handle.observer_count = self.listener_count();
        handle
    }
}

/// A client that always hands out the same scripted observer.
pub struct ScriptedClient {
    observer: Arc<ScriptedObserver>,
    defaults: DefaultQueryOptions,
    observed: Mutex<Vec<Options>>,
}

impl ScriptedClient {
    pub fn new(observer: Arc<ScriptedObserver>) -> Arc<Self> {
        Self::with_defaults(observer, DefaultQueryOptions::default())
    }

    pub fn with_defaults(observer: Arc<ScriptedObserver>, defaults: DefaultQueryOptions) -> Arc<Self> {
        Arc::new(Self {
            observer,
            defaults,
            observed: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(self: &Arc<Self>) -> Arc<dyn QueryClient<String, String>> {
        Arc::clone(self) as Arc<dyn QueryClient<String, String>>
    }

    /// Options passed to [`QueryClient::observe`], in call order.
    pub fn observed(&self) -> Vec<Options> {
        self.observed.lock().clone()
    }
}

impl QueryClient<String, String> for ScriptedClient {
    fn default_options(&self) -> DefaultQueryOptions {
        self.defaults.clone()
    }

    fn observe(&self, options: &Options) -> Arc<dyn QueryObserver<String, String>> {
        self.observed.lock().push(options.clone());
        Arc::clone(&self.observer) as Arc<dyn QueryObserver<String, String>>
    }
}

// ----------------------------------------------------------------------------
// Fetching engine
// ----------------------------------------------------------------------------

/// One cached query shared by every observer of its key.
pub struct CachedQuery {
    key: QueryKey,
    options: Mutex<Options>,
    result: Mutex<Observed>,
    listeners: Mutex<ListenerSet>,
    fetches: AtomicUsize,
}

impl CachedQuery {
    fn new(options: &Options) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<CachedQuery>| {
            let refetch_target = weak.clone();
            let remove_target = weak.clone();
            let controls = QueryControls::new(
                move |_| {
                    let target = refetch_target.clone();
                    async move {
                        match target.upgrade() {
                            Some(query) => query.fetch().await,
                            None => futures_util::future::pending().await,
                        }
                    }
                    .boxed()
                },
                move || {
                    if let Some(query) = remove_target.upgrade() {
                        query.remove();
                    }
                },
            );

            let mut result = QueryObserverResult::pending(controls);
            if let Some(data) = options.initial_data.clone() {
                result.status = QueryStatus::Success;
                result.data = Some(data);
                result.data_updated_at = now_millis();
            }

            Self {
                key: options.query_key.clone(),
                options: Mutex::new(options.clone()),
                result: Mutex::new(result),
                listeners: Mutex::new(ListenerSet::default()),
                fetches: AtomicUsize::new(0),
            }
        })
    }

    pub fn result(&self) -> Observed {
        self.result.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().active.len()
    }

    fn is_stale(&self, result: &Observed, options: &Options) -> bool {
        result.data_updated_at == 0
            || now_millis().saturating_sub(result.data_updated_at) >= options.stale_time.as_millis() as u64
    }

    fn should_fetch_on_mount(&self, options: &Options) -> bool {
        let result = self.result.lock().clone();
        options.enabled
            && options.query_fn.is_some()
            && (result.status != QueryStatus::Error || options.retry_on_mount)
            && (result.data.is_none() || (options.refetch_on_mount && self.is_stale(&result, options)))
    }

    /// Apply `f` to the cached result and notify every listener.
    fn update(&self, f: impl FnOnce(&mut Observed)) -> Observed {
        let next = {
            let mut result = self.result.lock();
            f(&mut result);
            result.clone()
        };
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .active
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(next.clone());
        }
        next
    }

    fn remove(&self) {
        self.update(|result| {
            let controls = result.controls.clone();
            *result = QueryObserverResult::pending(controls);
        });
    }

    async fn fetch(self: Arc<Self>) -> Observed {
        let options = self.options.lock().clone();
        let Some(query_fn) = options.query_fn.clone() else {
            return self.result();
        };
        self.fetches.fetch_add(1, Ordering::SeqCst);

        self.update(|result| {
            result.fetch_status = FetchStatus::Fetching;
            result.failure_count = 0;
        });

        let mut failures = 0;
        loop {
            let outcome = query_fn
                .call(options.query_key.clone())
                .await
                .and_then(|data| match &options.select {
                    Some(select) => select.apply(&data),
                    None => Ok(data),
                });

            match outcome {
                Ok(data) => {
                    return self.update(|result| {
                        let at = now_millis();
                        result.status = QueryStatus::Success;
                        result.fetch_status = FetchStatus::Idle;
                        result.data = Some(data);
                        result.error = None;
                        result.data_updated_at = at;
                        result.failure_count = 0;
                        result.is_fetched = true;
                        result.is_fetched_after_mount = true;
                        result.is_stale = options.stale_time.is_zero();
                    });
                }
                Err(_) if options.retry.allows(failures) => {
                    failures += 1;
                    self.update(|result| result.failure_count = failures);
                    tokio::time::sleep(options.retry_delay_for(failures)).await;
                }
                Err(error) => {
                    return self.update(|result| {
                        result.status = QueryStatus::Error;
                        result.fetch_status = FetchStatus::Idle;
                        result.error = Some(error);
                        result.error_updated_at = now_millis();
                        result.failure_count = failures + 1;
                        result.error_update_count += 1;
                        result.is_fetched = true;
                        result.is_fetched_after_mount = true;
                    });
                }
            }
        }
    }
}

/// An observer of one [`CachedQuery`].
pub struct FetchingObserver {
    query: Arc<CachedQuery>,
    calls: Mutex<Vec<SetOptionsCall>>,
}

impl FetchingObserver {
    pub fn query(&self) -> &Arc<CachedQuery> {
        &self.query
    }

    pub fn set_options_calls(&self) -> Vec<SetOptionsCall> {
        self.calls.lock().clone()
    }
}

impl QueryObserver<String, String> for FetchingObserver {
    fn subscribe(&self, listener: Listener<String, String>) -> Unsubscribe {
        let (id, first) = {
            let mut listeners = self.query.listeners.lock();
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners.active.push((id, listener));
            (id, listeners.active.len() == 1)
        };

        let options = self.query.options.lock().clone();
        if first && self.query.should_fetch_on_mount(&options) {
            tokio::spawn(Arc::clone(&self.query).fetch());
        }

        let query = Arc::downgrade(&self.query);
        Box::new(move || {
            if let Some(query) = query.upgrade() {
                query.listeners.lock().active.retain(|(other, _)| *other != id);
            }
        })
    }

    fn get_optimistic_result(&self, options: &Options) -> Observed {
        let mut result = self.query.result();
        if self.query.listener_count() == 0 && self.query.should_fetch_on_mount(options) {
            result.fetch_status = FetchStatus::Fetching;
            if result.data_updated_at == 0 {
                result.status = QueryStatus::Pending;
            }
        }
        result
    }

    fn set_options(&self, options: &Options, notify: NotifyOptions) {
        *self.query.options.lock() = options.clone();
        self.calls.lock().push(SetOptionsCall {
            options: options.clone(),
            listeners: notify.listeners,
        });
    }

    fn get_current_result(&self) -> Observed {
        self.query.result()
    }

    fn get_current_query(&self) -> QueryHandle {
        let mut handle = QueryHandle::new(self.query.key.clone());
        handle.observer_count = self.query.listener_count();
        handle
    }
}

/// An engine with a shared per-key cache.
#[derive(Default)]
pub struct FetchingClient {
    defaults: DefaultQueryOptions,
    queries: Mutex<HashMap<QueryKey, Arc<CachedQuery>>>,
    observers: Mutex<Vec<Arc<FetchingObserver>>>,
}

impl FetchingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: &Arc<Self>) -> Arc<dyn QueryClient<String, String>> {
        Arc::clone(self) as Arc<dyn QueryClient<String, String>>
    }

    /// Observers created so far, in creation order.
    pub fn observers(&self) -> Vec<Arc<FetchingObserver>> {
        self.observers.lock().clone()
    }

    pub fn query(&self, key: &QueryKey) -> Option<Arc<CachedQuery>> {
        self.queries.lock().get(key).cloned()
    }
}

impl QueryClient<String, String> for FetchingClient {
    fn default_options(&self) -> DefaultQueryOptions {
        self.defaults.clone()
    }

    fn observe(&self, options: &Options) -> Arc<dyn QueryObserver<String, String>> {
        let query = {
            let mut queries = self.queries.lock();
            let query = queries
                .entry(options.query_key.clone())
                .or_insert_with(|| CachedQuery::new(options));
            Arc::clone(query)
        };
        *query.options.lock() = options.clone();

        let observer = Arc::new(FetchingObserver {
            query,
            calls: Mutex::new(Vec::new()),
        });
        self.observers.lock().push(Arc::clone(&observer));
        observer
    }
}
