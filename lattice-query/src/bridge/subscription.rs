//! Subscription Manager
//!
//! Owns the one subscription a bridge holds on its engine observer. Each
//! notification is checked against a [`LivenessToken`] and a
//! [`ChangeFilter`], then forwarded to the store synchronizer and the
//! suspense adapter inside a single batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use lattice_core::reactive::batch;

use super::suspense::SuspenseAdapter;
use super::sync::StoreSynchronizer;
use super::tracked::TrackedProps;
use crate::query::{
    EffectiveOptions, NotifyOnChangeProps, NotifyOptions, QueryObserver, QueryObserverResult,
    ResultField, Unsubscribe,
};

/// Invalidated when the subscription closes. Notifications that arrive after
/// that are dropped.
#[derive(Debug, Clone)]
pub struct LivenessToken(Arc<AtomicBool>);

impl LivenessToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether a changed result wakes consumers.
#[derive(Debug, Clone)]
pub enum ChangeFilter {
    /// Any change notifies.
    All,

    /// Only changes to the listed fields notify.
    Props(Vec<ResultField>),

    /// Only changes to fields consumers have read notify. Before anything
    /// has been read, every change notifies.
    Tracked {
        props: TrackedProps,
        include_error: bool,
    },
}

impl ChangeFilter {
    /// Build the filter for `options`.
    ///
    /// When errors may be escalated the error field always notifies, so the
    /// boundary hears about it even if nobody read it.
    pub fn for_options<T, E>(options: &EffectiveOptions<T, E>, tracked: &TrackedProps) -> Self {
        let include_error = options.use_error_boundary.is_enabled();
        match &options.notify_on_change_props {
            Some(NotifyOnChangeProps::All) => ChangeFilter::All,
            Some(NotifyOnChangeProps::Props(props)) => {
                let mut props = props.clone();
                if include_error && !props.contains(&ResultField::Error) {
                    props.push(ResultField::Error);
                }
                ChangeFilter::Props(props)
            }
            None => ChangeFilter::Tracked {
                props: tracked.clone(),
                include_error,
            },
        }
    }

    pub fn should_notify(&self, changed: &[ResultField]) -> bool {
        if changed.is_empty() {
            return false;
        }
        match self {
            ChangeFilter::All => true,
            ChangeFilter::Props(props) => changed.iter().any(|field| props.contains(field)),
            ChangeFilter::Tracked {
                props,
                include_error,
            } => {
                props.is_empty()
                    || changed.iter().any(|field| {
                        props.contains(*field) || (*include_error && *field == ResultField::Error)
                    })
            }
        }
    }
}

/// The lifetime of one subscription to an engine observer.
pub struct SubscriptionManager<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    observer: Arc<dyn QueryObserver<T, E>>,
    filter: Arc<RwLock<ChangeFilter>>,
    tracked: TrackedProps,
    open: Mutex<Option<OpenSubscription>>,
}

struct OpenSubscription {
    token: LivenessToken,
    unsubscribe: Unsubscribe,
}

impl<T, E> SubscriptionManager<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(observer: Arc<dyn QueryObserver<T, E>>, tracked: TrackedProps) -> Self {
        Self {
            observer,
            filter: Arc::new(RwLock::new(ChangeFilter::Tracked {
                props: tracked.clone(),
                include_error: false,
            })),
            tracked,
            open: Mutex::new(None),
        }
    }

    pub fn observer(&self) -> &Arc<dyn QueryObserver<T, E>> {
        &self.observer
    }

    pub fn is_open(&self) -> bool {
        self.open.lock().is_some()
    }

    /// Subscribe to the observer, feeding `sync` and `adapter`.
    ///
    /// Does nothing if a subscription is already open.
    pub fn open(&self, sync: StoreSynchronizer<T, E>, adapter: SuspenseAdapter<T, E>) {
        let mut open = self.open.lock();
        if open.is_some() {
            return;
        }

        let token = LivenessToken::new();
        let listener_token = token.clone();
        let filter = Arc::clone(&self.filter);
        let unsubscribe = self.observer.subscribe(Arc::new(move |result| {
            deliver(&listener_token, &filter, &sync, &adapter, result);
        }));

        *open = Some(OpenSubscription { token, unsubscribe });
        tracing::debug!(query = %self.observer.get_current_query().key, "query subscription opened");
    }

    /// Rebuild the change filter for `options` without touching the observer.
    pub fn refresh_filter(&self, options: &EffectiveOptions<T, E>) {
        *self.filter.write() = ChangeFilter::for_options(options, &self.tracked);
    }

    /// Hand `options` to the observer and refresh the change filter.
    ///
    /// With `notify` off the observer applies the options without telling
    /// listeners about the resulting change.
    pub fn apply_options(&self, options: &EffectiveOptions<T, E>, notify: bool) {
        self.refresh_filter(options);
        self.observer
            .set_options(options, NotifyOptions { listeners: notify });
    }

    /// Close the subscription. Idempotent.
    pub fn close(&self) {
        let Some(open) = self.open.lock().take() else {
            return;
        };
        open.token.invalidate();
        (open.unsubscribe)();
        tracing::debug!(query = %self.observer.get_current_query().key, "query subscription closed");
    }
}

impl<T, E> Drop for SubscriptionManager<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

fn deliver<T, E>(
    token: &LivenessToken,
    filter: &RwLock<ChangeFilter>,
    sync: &StoreSynchronizer<T, E>,
    adapter: &SuspenseAdapter<T, E>,
    result: QueryObserverResult<T, E>,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    if !token.is_alive() {
        tracing::trace!("dropping notification delivered after teardown");
        return;
    }

    let changed = sync.changed_fields(&result);
    let notify = {
        let filter = filter.read();
        let notify = filter.should_notify(&changed);
        if let (true, ChangeFilter::Tracked { props, .. }) = (notify, &*filter) {
            props.retain(|field| sync.is_observed(field));
        }
        notify
    };

    batch(|| {
        adapter.observe(&result);
        if notify {
            sync.publish(result);
        } else {
            tracing::trace!(?changed, "publishing without notification");
            sync.publish_silently(result);
        }
    });
}
