//! The engine contract.
//!
//! The fetching and caching engine is an external collaborator. The bridge
//! talks to it only through [`QueryClient`] and [`QueryObserver`].

use std::sync::Arc;

use super::key::QueryKey;
use super::options::EffectiveOptions;
use super::result::QueryObserverResult;
use crate::config::DefaultQueryOptions;

/// Receives every result the observer publishes.
pub type Listener<T, E> = Arc<dyn Fn(QueryObserverResult<T, E>) + Send + Sync>;

/// Closes a subscription opened by [`QueryObserver::subscribe`].
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Options for [`QueryObserver::set_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyOptions {
    /// Whether listeners hear about a result changed by the new options.
    pub listeners: bool,
}

impl Default for NotifyOptions {
    fn default() -> Self {
        Self { listeners: true }
    }
}

/// Identifies the cached query behind an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHandle {
    pub key: QueryKey,

    /// Number of observers attached to the query.
    pub observer_count: usize,
}

impl QueryHandle {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            observer_count: 0,
        }
    }
}

/// One observer of one cached query.
pub trait QueryObserver<T, E>: Send + Sync {
    /// Start receiving results. Returns the handle that stops delivery.
    fn subscribe(&self, listener: Listener<T, E>) -> Unsubscribe;

    /// The result these options would produce right now, computed from cache
    /// state alone.
    fn get_optimistic_result(&self, options: &EffectiveOptions<T, E>) -> QueryObserverResult<T, E>;

    /// Reconfigure the observer.
    ///
    /// Invalid options (an empty key, say) are not rejected here; the engine
    /// reports them as an error result through the normal channel.
    fn set_options(&self, options: &EffectiveOptions<T, E>, notify: NotifyOptions);

    fn get_current_result(&self) -> QueryObserverResult<T, E>;

    fn get_current_query(&self) -> QueryHandle;
}

/// Entry point to the engine.
pub trait QueryClient<T, E>: Send + Sync {
    /// Client-wide defaults merged under caller options.
    fn default_options(&self) -> DefaultQueryOptions;

    /// Create an observer configured with `options`.
    fn observe(&self, options: &EffectiveOptions<T, E>) -> Arc<dyn QueryObserver<T, E>>;
}
