//! Result Access Interceptor
//!
//! [`QueryResult`] is the only object a bridge hands to consumers. Every
//! getter tracks exactly the field it reads and records that field in
//! [`TrackedProps`], which the subscription manager consults to skip
//! notifications nobody would notice.
//!
//! [`QueryResult::data`] is special: under suspense or error escalation it
//! reads from the suspense adapter instead of the stored result, and may
//! therefore report [`DataError::Suspended`] or [`DataError::Boundary`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use lattice_core::reactive::{Memo, Outcome};

use super::base_query::BridgeHandles;
use super::suspense::SuspenseAdapter;
use super::sync::StoreSynchronizer;
use crate::boundary::{should_throw_error, QueryErrorResetBoundary};
use crate::error::DataError;
use crate::query::{
    EffectiveOptions, FetchStatus, QueryObserver, QueryObserverResult, QueryStatus,
    RefetchOptions, ResultField,
};

/// The set of result fields consumers have read.
///
/// Shared between the interceptor that records reads and the change filter
/// that consults them. Each propagated notification starts a new read cycle:
/// the set shrinks to the fields that still have live dependents, and
/// re-running dependents record their reads again.
#[derive(Clone, Default)]
pub struct TrackedProps {
    bits: Arc<AtomicU32>,
}

impl TrackedProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, field: ResultField) {
        self.bits.fetch_or(field.bit(), Ordering::Relaxed);
    }

    pub fn record_all(&self) {
        for field in ResultField::ALL {
            self.record(field);
        }
    }

    pub fn contains(&self, field: ResultField) -> bool {
        self.bits.load(Ordering::Relaxed) & field.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Relaxed) == 0
    }

    pub fn fields(&self) -> Vec<ResultField> {
        ResultField::ALL
            .into_iter()
            .filter(|field| self.contains(*field))
            .collect()
    }

    /// Keep only the recorded fields for which `keep` holds.
    pub fn retain(&self, mut keep: impl FnMut(ResultField) -> bool) {
        let kept = self
            .fields()
            .into_iter()
            .filter(|field| keep(*field))
            .fold(0, |bits, field| bits | field.bit());
        self.bits.store(kept, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for TrackedProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.fields()).finish()
    }
}

/// The live result of a query, read through tracked getters.
pub struct QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    sync: StoreSynchronizer<T, E>,
    adapter: SuspenseAdapter<T, E>,
    options: Memo<EffectiveOptions<T, E>>,
    reset_boundary: QueryErrorResetBoundary,
    handles: Arc<BridgeHandles<T, E>>,
    tracked: TrackedProps,
}

impl<T, E> QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(
        sync: StoreSynchronizer<T, E>,
        adapter: SuspenseAdapter<T, E>,
        options: Memo<EffectiveOptions<T, E>>,
        reset_boundary: QueryErrorResetBoundary,
        handles: Arc<BridgeHandles<T, E>>,
        tracked: TrackedProps,
    ) -> Self {
        Self {
            sync,
            adapter,
            options,
            reset_boundary,
            handles,
            tracked,
        }
    }

    fn observer(&self) -> &Arc<dyn QueryObserver<T, E>> {
        self.handles.subscription.observer()
    }

    fn field<R>(&self, field: ResultField, f: impl FnOnce(&QueryObserverResult<T, E>) -> R) -> R {
        self.tracked.record(field);
        self.sync.read(field, f)
    }

    /// The query's data.
    ///
    /// Returns the stored data unless one of these holds, in which case the
    /// outcome of the suspense adapter is returned instead:
    ///
    /// - suspense is on and the query is loading its first result;
    /// - the query failed with no fetch in progress, the error-boundary
    ///   policy escalates the error, and the boundary has not been reset.
    pub fn data(&self) -> Result<Option<T>, DataError<E>> {
        self.tracked.record(ResultField::Data);
        let options = self.options.get();

        // Fields consulted for routing count as read: a change to any of
        // them can change what this call returns.
        let suspend = options.suspense
            && self.field(ResultField::IsLoading, QueryObserverResult::is_loading)
            && self.field(ResultField::IsFetching, QueryObserverResult::is_fetching);

        let escalate = !suspend
            && self.field(ResultField::IsError, QueryObserverResult::is_error)
            && !self.reset_boundary.is_reset()
            && !self.field(ResultField::IsFetching, QueryObserverResult::is_fetching)
            && self
                .field(ResultField::Error, |r| r.error.clone())
                .is_some_and(|error| {
                    should_throw_error(
                        &options.use_error_boundary,
                        &error,
                        &self.observer().get_current_query(),
                    )
                });

        if suspend || escalate {
            return match self.adapter.read() {
                Outcome::Suspended => Err(DataError::Suspended),
                Outcome::Ready(data) => Ok(data),
                Outcome::Errored(error) => Err(DataError::Boundary(error)),
            };
        }

        Ok(self.sync.read(ResultField::Data, |r| r.data.clone()))
    }

    pub fn status(&self) -> QueryStatus {
        self.field(ResultField::Status, |r| r.status)
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.field(ResultField::FetchStatus, |r| r.fetch_status)
    }

    pub fn error(&self) -> Option<E> {
        self.field(ResultField::Error, |r| r.error.clone())
    }

    pub fn data_updated_at(&self) -> u64 {
        self.field(ResultField::DataUpdatedAt, |r| r.data_updated_at)
    }

    pub fn error_updated_at(&self) -> u64 {
        self.field(ResultField::ErrorUpdatedAt, |r| r.error_updated_at)
    }

    pub fn failure_count(&self) -> u32 {
        self.field(ResultField::FailureCount, |r| r.failure_count)
    }

    pub fn error_update_count(&self) -> u32 {
        self.field(ResultField::ErrorUpdateCount, |r| r.error_update_count)
    }

    pub fn is_fetched(&self) -> bool {
        self.field(ResultField::IsFetched, |r| r.is_fetched)
    }

    pub fn is_fetched_after_mount(&self) -> bool {
        self.field(ResultField::IsFetchedAfterMount, |r| r.is_fetched_after_mount)
    }

    pub fn is_placeholder_data(&self) -> bool {
        self.field(ResultField::IsPlaceholderData, |r| r.is_placeholder_data)
    }

    pub fn is_previous_data(&self) -> bool {
        self.field(ResultField::IsPreviousData, |r| r.is_previous_data)
    }

    pub fn is_stale(&self) -> bool {
        self.field(ResultField::IsStale, |r| r.is_stale)
    }

    pub fn is_loading(&self) -> bool {
        self.field(ResultField::IsLoading, QueryObserverResult::is_loading)
    }

    pub fn is_success(&self) -> bool {
        self.field(ResultField::IsSuccess, QueryObserverResult::is_success)
    }

    pub fn is_error(&self) -> bool {
        self.field(ResultField::IsError, QueryObserverResult::is_error)
    }

    pub fn is_fetching(&self) -> bool {
        self.field(ResultField::IsFetching, QueryObserverResult::is_fetching)
    }

    pub fn is_paused(&self) -> bool {
        self.field(ResultField::IsPaused, QueryObserverResult::is_paused)
    }

    pub fn is_loading_error(&self) -> bool {
        self.field(ResultField::IsLoadingError, QueryObserverResult::is_loading_error)
    }

    pub fn is_refetch_error(&self) -> bool {
        self.field(ResultField::IsRefetchError, QueryObserverResult::is_refetch_error)
    }

    pub fn is_refetching(&self) -> bool {
        self.field(ResultField::IsRefetching, QueryObserverResult::is_refetching)
    }

    /// Fetch again. Resolves with the engine's result once the fetch settles.
    pub fn refetch(&self, options: RefetchOptions) -> BoxFuture<'static, QueryObserverResult<T, E>> {
        let controls = self.field(ResultField::Refetch, |r| r.controls.clone());
        controls.refetch(options)
    }

    /// Remove the query from the engine's cache.
    pub fn remove(&self) {
        let controls = self.field(ResultField::Remove, |r| r.controls.clone());
        controls.remove();
    }

    /// The whole stored result. Tracks and records every field.
    ///
    /// Unlike [`data`](Self::data), this never redirects to the suspense
    /// adapter.
    pub fn snapshot(&self) -> Arc<QueryObserverResult<T, E>> {
        self.tracked.record_all();
        self.sync.current()
    }

    /// The options the bridge currently runs with. Tracked.
    pub fn options(&self) -> EffectiveOptions<T, E> {
        self.options.get()
    }

    /// Whether the bridge still receives results from the engine.
    pub fn is_subscribed(&self) -> bool {
        self.handles.subscription.is_open()
    }

    /// Fields read so far.
    pub fn tracked_props(&self) -> &TrackedProps {
        &self.tracked
    }

    /// Wait for the suspense adapter to settle.
    pub async fn settled(&self) -> Result<Option<T>, E> {
        self.adapter.settled().await
    }
}

impl<T, E> Clone for QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            adapter: self.adapter.clone(),
            options: self.options.clone(),
            reset_boundary: self.reset_boundary.clone(),
            handles: Arc::clone(&self.handles),
            tracked: self.tracked.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
    E: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("result", &self.sync.current_untracked())
            .field("tracked", &self.tracked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_props_record_and_retain() {
        let props = TrackedProps::new();
        assert!(props.is_empty());

        props.record(ResultField::Data);
        props.record(ResultField::IsFetching);
        props.record(ResultField::Data);

        assert!(props.contains(ResultField::Data));
        assert!(!props.contains(ResultField::Status));
        assert_eq!(props.fields(), vec![ResultField::Data, ResultField::IsFetching]);

        props.retain(|field| field != ResultField::Data);
        assert_eq!(props.fields(), vec![ResultField::IsFetching]);

        props.retain(|_| false);
        assert!(props.is_empty());
    }

    #[test]
    fn record_all_covers_every_field() {
        let props = TrackedProps::new();
        props.record_all();
        assert_eq!(props.fields().len(), ResultField::ALL.len());
    }
}
