//! Bridge Construction
//!
//! [`create_base_query`] wires one engine observer into the current scope:
//!
//! 1. options are resolved in a memo, so only real changes reach the engine;
//! 2. the observer is created and its optimistic result seeds both the store
//!    synchronizer and the suspense adapter;
//! 3. the subscription opens during setup, before any consumer reads;
//! 4. at mount the current options are applied without notifying listeners;
//! 5. later option changes are applied with notification;
//! 6. scope disposal closes the subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lattice_core::reactive::{on_cleanup, on_mount, untrack, Effect, Memo};

use super::options::resolve_options;
use super::reset::ResetCoordinator;
use super::subscription::SubscriptionManager;
use super::suspense::SuspenseAdapter;
use super::sync::StoreSynchronizer;
use super::tracked::{QueryResult, TrackedProps};
use crate::boundary::QueryErrorResetBoundary;
use crate::query::{QueryClient, QueryOptions};

/// Everything that has to outlive setup for a bridge to keep working.
///
/// Inside a scope the scope owns the effects and closes the subscription on
/// disposal. Outside one, this is what keeps them alive.
pub(crate) struct BridgeHandles<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) subscription: Arc<SubscriptionManager<T, E>>,
    _options_watcher: Effect,
    _reset: ResetCoordinator,
}

/// Bridge `client` into the current scope with options produced by `options`.
///
/// `options` is read reactively: when a signal it reads changes, the
/// resolved options are recomputed and, if they differ, handed to the
/// observer.
pub fn create_base_query<T, E, F>(
    client: Arc<dyn QueryClient<T, E>>,
    options: F,
    reset_boundary: QueryErrorResetBoundary,
) -> QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> QueryOptions<T, E> + Send + Sync + 'static,
{
    let resolved = {
        let client = Arc::clone(&client);
        let boundary = reset_boundary.clone();
        Memo::new(move || {
            let raw = options();
            resolve_options(&raw, &client.default_options(), boundary.is_reset())
        })
    };

    let initial = resolved.get_untracked();
    let observer = untrack(|| client.observe(&initial));
    let optimistic = observer.get_optimistic_result(&initial);

    tracing::debug!(
        query = %initial.query_key,
        status = ?optimistic.status,
        suspense = initial.suspense,
        "creating query bridge"
    );

    let tracked = TrackedProps::new();
    let sync = StoreSynchronizer::new(optimistic.clone());
    let adapter = SuspenseAdapter::new(&optimistic);

    let subscription = Arc::new(SubscriptionManager::new(Arc::clone(&observer), tracked.clone()));
    subscription.refresh_filter(&initial);
    untrack(|| subscription.open(sync.clone(), adapter.clone()));

    {
        let subscription = Arc::clone(&subscription);
        on_cleanup(move || subscription.close());
    }

    {
        let subscription = Arc::clone(&subscription);
        let resolved = resolved.clone();
        on_mount(move || subscription.apply_options(&resolved.get_untracked(), false));
    }

    let options_watcher = {
        let subscription = Arc::clone(&subscription);
        let resolved = resolved.clone();
        let first_run = AtomicBool::new(true);
        Effect::computed(move || {
            let options = resolved.get();
            if first_run.swap(false, Ordering::SeqCst) {
                return;
            }
            tracing::debug!(query = %options.query_key, "query options changed");
            untrack(|| subscription.apply_options(&options, true));
        })
    };

    let reset = ResetCoordinator::install(reset_boundary.clone());

    let handles = Arc::new(BridgeHandles {
        subscription,
        _options_watcher: options_watcher,
        _reset: reset,
    });

    QueryResult::new(sync, adapter, resolved, reset_boundary, handles, tracked)
}
