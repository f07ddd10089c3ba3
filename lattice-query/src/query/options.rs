//! Query options.
//!
//! [`QueryOptions`] is what a caller supplies; every field is optional.
//! [`EffectiveOptions`] is the resolved snapshot handed to the engine.
//! Function-valued options compare by identity, so both types have a
//! well-defined structural equality that memoized derivations can rely on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use super::key::QueryKey;
use super::observer::QueryHandle;
use super::result::ResultField;
use crate::error::ConfigError;

/// Default number of retries after a failed fetch.
pub const DEFAULT_RETRY: Retry = Retry::Count(3);

/// How long unused query data is kept by default.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

/// Upper bound of the default exponential retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type QueryFnInner<T, E> = dyn Fn(QueryKey) -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// The function that fetches a query's data.
pub struct QueryFn<T, E>(Arc<QueryFnInner<T, E>>);

impl<T, E> QueryFn<T, E> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self(Arc::new(move |key| f(key).boxed()))
    }

    pub fn call(&self, key: QueryKey) -> BoxFuture<'static, Result<T, E>> {
        (self.0)(key)
    }
}

impl<T, E> Clone for QueryFn<T, E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T, E> PartialEq for QueryFn<T, E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T, E> std::fmt::Debug for QueryFn<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueryFn(..)")
    }
}

/// Transforms fetched data before it is reported. May fail.
pub struct Select<T, E>(Arc<dyn Fn(&T) -> Result<T, E> + Send + Sync>);

impl<T, E> Select<T, E> {
    pub fn new(f: impl Fn(&T) -> Result<T, E> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, data: &T) -> Result<T, E> {
        (self.0)(data)
    }
}

impl<T, E> Clone for Select<T, E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T, E> PartialEq for Select<T, E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T, E> std::fmt::Debug for Select<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Select(..)")
    }
}

/// How often a failed fetch is retried.
///
/// Deserializes from `true`, `false` or a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RetryRepr", into = "RetryRepr")]
pub enum Retry {
    Never,
    Count(u32),
    Always,
}

impl Retry {
    /// Whether another attempt is allowed after `failures` failed attempts.
    pub fn allows(self, failures: u32) -> bool {
        match self {
            Retry::Never => false,
            Retry::Count(limit) => failures < limit,
            Retry::Always => true,
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        DEFAULT_RETRY
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RetryRepr {
    Flag(bool),
    Count(u32),
}

impl From<RetryRepr> for Retry {
    fn from(repr: RetryRepr) -> Self {
        match repr {
            RetryRepr::Flag(false) | RetryRepr::Count(0) => Retry::Never,
            RetryRepr::Flag(true) => Retry::Always,
            RetryRepr::Count(n) => Retry::Count(n),
        }
    }
}

impl From<Retry> for RetryRepr {
    fn from(retry: Retry) -> Self {
        match retry {
            Retry::Never => RetryRepr::Flag(false),
            Retry::Count(n) => RetryRepr::Count(n),
            Retry::Always => RetryRepr::Flag(true),
        }
    }
}

/// Which errors are escalated to the enclosing error boundary.
pub enum ErrorBoundaryPolicy<E> {
    Never,
    Always,
    When(Arc<dyn Fn(&E, &QueryHandle) -> bool + Send + Sync>),
}

impl<E> ErrorBoundaryPolicy<E> {
    pub fn when(f: impl Fn(&E, &QueryHandle) -> bool + Send + Sync + 'static) -> Self {
        ErrorBoundaryPolicy::When(Arc::new(f))
    }

    /// Whether this policy can escalate any error at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ErrorBoundaryPolicy::Never)
    }

    /// Whether `error` raised by `query` should be escalated.
    pub fn should_throw(&self, error: &E, query: &QueryHandle) -> bool {
        match self {
            ErrorBoundaryPolicy::Never => false,
            ErrorBoundaryPolicy::Always => true,
            ErrorBoundaryPolicy::When(f) => f(error, query),
        }
    }
}

impl<E> From<bool> for ErrorBoundaryPolicy<E> {
    fn from(enabled: bool) -> Self {
        if enabled {
            ErrorBoundaryPolicy::Always
        } else {
            ErrorBoundaryPolicy::Never
        }
    }
}

impl<E> Default for ErrorBoundaryPolicy<E> {
    fn default() -> Self {
        ErrorBoundaryPolicy::Never
    }
}

impl<E> Clone for ErrorBoundaryPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            ErrorBoundaryPolicy::Never => ErrorBoundaryPolicy::Never,
            ErrorBoundaryPolicy::Always => ErrorBoundaryPolicy::Always,
            ErrorBoundaryPolicy::When(f) => ErrorBoundaryPolicy::When(Arc::clone(f)),
        }
    }
}

impl<E> PartialEq for ErrorBoundaryPolicy<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorBoundaryPolicy::Never, ErrorBoundaryPolicy::Never) => true,
            (ErrorBoundaryPolicy::Always, ErrorBoundaryPolicy::Always) => true,
            (ErrorBoundaryPolicy::When(a), ErrorBoundaryPolicy::When(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<E> std::fmt::Debug for ErrorBoundaryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorBoundaryPolicy::Never => f.write_str("Never"),
            ErrorBoundaryPolicy::Always => f.write_str("Always"),
            ErrorBoundaryPolicy::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Which result fields notify consumers when they change.
///
/// Deserializes from `"all"` or a list of camelCase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NotifyRepr", into = "NotifyRepr")]
pub enum NotifyOnChangeProps {
    All,
    Props(Vec<ResultField>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NotifyRepr {
    Keyword(String),
    Fields(Vec<ResultField>),
}

impl TryFrom<NotifyRepr> for NotifyOnChangeProps {
    type Error = ConfigError;

    fn try_from(repr: NotifyRepr) -> Result<Self, Self::Error> {
        match repr {
            NotifyRepr::Keyword(word) if word == "all" => Ok(NotifyOnChangeProps::All),
            NotifyRepr::Keyword(word) => Err(ConfigError::UnknownNotifyKeyword(word)),
            NotifyRepr::Fields(fields) => Ok(NotifyOnChangeProps::Props(fields)),
        }
    }
}

impl From<NotifyOnChangeProps> for NotifyRepr {
    fn from(props: NotifyOnChangeProps) -> Self {
        match props {
            NotifyOnChangeProps::All => NotifyRepr::Keyword("all".to_string()),
            NotifyOnChangeProps::Props(fields) => NotifyRepr::Fields(fields),
        }
    }
}

/// Caller-supplied options. Unset fields fall back to client defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions<T, E> {
    pub query_key: Option<QueryKey>,
    pub query_fn: Option<QueryFn<T, E>>,
    pub select: Option<Select<T, E>>,
    pub initial_data: Option<T>,
    pub stale_time: Option<Duration>,
    pub cache_time: Option<Duration>,
    pub retry: Option<Retry>,
    /// Fixed delay between attempts; exponential backoff when unset.
    pub retry_delay: Option<Duration>,
    pub enabled: Option<bool>,
    pub suspense: Option<bool>,
    pub use_error_boundary: Option<ErrorBoundaryPolicy<E>>,
    pub notify_on_change_props: Option<NotifyOnChangeProps>,
    pub retry_on_mount: Option<bool>,
    pub refetch_on_mount: Option<bool>,
}

impl<T, E> Default for QueryOptions<T, E> {
    fn default() -> Self {
        Self {
            query_key: None,
            query_fn: None,
            select: None,
            initial_data: None,
            stale_time: None,
            cache_time: None,
            retry: None,
            retry_delay: None,
            enabled: None,
            suspense: None,
            use_error_boundary: None,
            notify_on_change_props: None,
            retry_on_mount: None,
            refetch_on_mount: None,
        }
    }
}

impl<T, E> QueryOptions<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<QueryKey>) -> Self {
        self.query_key = Some(key.into());
        self
    }

    pub fn query_fn(mut self, query_fn: QueryFn<T, E>) -> Self {
        self.query_fn = Some(query_fn);
        self
    }

    pub fn select(mut self, select: Select<T, E>) -> Self {
        self.select = Some(select);
        self
    }

    pub fn initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn suspense(mut self, suspense: bool) -> Self {
        self.suspense = Some(suspense);
        self
    }

    pub fn use_error_boundary(mut self, policy: impl Into<ErrorBoundaryPolicy<E>>) -> Self {
        self.use_error_boundary = Some(policy.into());
        self
    }

    pub fn notify_on_change_props(mut self, props: NotifyOnChangeProps) -> Self {
        self.notify_on_change_props = Some(props);
        self
    }

    pub fn retry_on_mount(mut self, retry_on_mount: bool) -> Self {
        self.retry_on_mount = Some(retry_on_mount);
        self
    }

    pub fn refetch_on_mount(mut self, refetch_on_mount: bool) -> Self {
        self.refetch_on_mount = Some(refetch_on_mount);
        self
    }
}

/// Fully resolved options handed to the engine. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions<T, E> {
    pub query_key: QueryKey,
    pub query_fn: Option<QueryFn<T, E>>,
    pub select: Option<Select<T, E>>,
    pub initial_data: Option<T>,
    pub stale_time: Duration,
    pub cache_time: Duration,
    pub retry: Retry,
    pub retry_delay: Option<Duration>,
    pub enabled: bool,
    pub suspense: bool,
    pub use_error_boundary: ErrorBoundaryPolicy<E>,
    pub notify_on_change_props: Option<NotifyOnChangeProps>,
    pub retry_on_mount: bool,
    pub refetch_on_mount: bool,

    /// The first result read must reflect cache state, not a placeholder.
    pub optimistic_results: bool,
}

impl<T, E> EffectiveOptions<T, E> {
    /// Delay before the next attempt after `failures` failed attempts.
    pub fn retry_delay_for(&self, failures: u32) -> Duration {
        match self.retry_delay {
            Some(delay) => delay,
            None => {
                let backoff = Duration::from_secs(1).saturating_mul(2u32.saturating_pow(failures));
                backoff.min(MAX_RETRY_DELAY)
            }
        }
    }
}
