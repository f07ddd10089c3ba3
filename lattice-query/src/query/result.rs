//! Observed query results.
//!
//! [`QueryObserverResult`] is the engine's report of a query's state. The
//! bridge replaces it wholesale on every notification and tracks reads of it
//! per [`ResultField`].

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use lattice_core::reactive::Diff;

/// Whether the query has data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryStatus {
    /// No data and no terminal error yet.
    Pending,
    Error,
    Success,
}

/// Whether the query function is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchStatus {
    Idle,
    Fetching,
    /// A fetch wanted to run but the engine held it back.
    Paused,
}

/// Options for [`QueryControls::refetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefetchOptions {
    /// Cancel a fetch already in flight before starting a new one.
    pub cancel_refetch: bool,
}

impl Default for RefetchOptions {
    fn default() -> Self {
        Self {
            cancel_refetch: true,
        }
    }
}

type RefetchFn<T, E> =
    Arc<dyn Fn(RefetchOptions) -> BoxFuture<'static, QueryObserverResult<T, E>> + Send + Sync>;

/// Control handles attached to every result.
///
/// Two controls are equal when they hold the same handles.
pub struct QueryControls<T, E> {
    refetch: RefetchFn<T, E>,
    remove: Arc<dyn Fn() + Send + Sync>,
}

impl<T, E> QueryControls<T, E> {
    pub fn new<R, D>(refetch: R, remove: D) -> Self
    where
        R: Fn(RefetchOptions) -> BoxFuture<'static, QueryObserverResult<T, E>>
            + Send
            + Sync
            + 'static,
        D: Fn() + Send + Sync + 'static,
    {
        Self {
            refetch: Arc::new(refetch),
            remove: Arc::new(remove),
        }
    }

    /// Fetch again and resolve with the result once the fetch settles.
    pub fn refetch(&self, options: RefetchOptions) -> BoxFuture<'static, QueryObserverResult<T, E>> {
        (self.refetch)(options)
    }

    /// Remove the query from the engine's cache.
    pub fn remove(&self) {
        (self.remove)()
    }

    fn same_refetch(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.refetch, &other.refetch)
    }

    fn same_remove(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.remove, &other.remove)
    }
}

impl<T, E> Clone for QueryControls<T, E> {
    fn clone(&self) -> Self {
        Self {
            refetch: Arc::clone(&self.refetch),
            remove: Arc::clone(&self.remove),
        }
    }
}

impl<T, E> PartialEq for QueryControls<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.same_refetch(other) && self.same_remove(other)
    }
}

impl<T, E> std::fmt::Debug for QueryControls<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueryControls { .. }")
    }
}

/// A snapshot of a query's state as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryObserverResult<T, E> {
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,

    /// Last successful data, kept across later errors.
    pub data: Option<T>,

    /// Last error, cleared by a new success.
    pub error: Option<E>,

    /// Milliseconds since the epoch; 0 if never updated.
    pub data_updated_at: u64,
    pub error_updated_at: u64,

    /// Failed attempts in the current fetch cycle.
    pub failure_count: u32,
    pub error_update_count: u32,

    pub is_fetched: bool,
    pub is_fetched_after_mount: bool,
    pub is_placeholder_data: bool,
    pub is_previous_data: bool,
    pub is_stale: bool,

    pub controls: QueryControls<T, E>,
}

impl<T, E> QueryObserverResult<T, E> {
    /// A result with no data that has never been fetched.
    pub fn pending(controls: QueryControls<T, E>) -> Self {
        Self {
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
            data: None,
            error: None,
            data_updated_at: 0,
            error_updated_at: 0,
            failure_count: 0,
            error_update_count: 0,
            is_fetched: false,
            is_fetched_after_mount: false,
            is_placeholder_data: false,
            is_previous_data: false,
            is_stale: true,
            controls,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_paused(&self) -> bool {
        self.fetch_status == FetchStatus::Paused
    }

    /// The first fetch failed; there has never been data.
    pub fn is_loading_error(&self) -> bool {
        self.is_error() && self.data_updated_at == 0
    }

    /// A later fetch failed while earlier data is still held.
    pub fn is_refetch_error(&self) -> bool {
        self.is_error() && self.data_updated_at != 0
    }

    /// Fetching in the background while a result is already shown.
    pub fn is_refetching(&self) -> bool {
        self.is_fetching() && !self.is_loading()
    }
}

/// Every trackable field of a [`QueryObserverResult`], including the
/// derived flags and the control handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultField {
    Status,
    FetchStatus,
    Data,
    Error,
    DataUpdatedAt,
    ErrorUpdatedAt,
    FailureCount,
    ErrorUpdateCount,
    IsFetched,
    IsFetchedAfterMount,
    IsPlaceholderData,
    IsPreviousData,
    IsStale,
    IsLoading,
    IsSuccess,
    IsError,
    IsFetching,
    IsPaused,
    IsLoadingError,
    IsRefetchError,
    IsRefetching,
    Refetch,
    Remove,
}

impl ResultField {
    pub const ALL: [ResultField; 23] = [
        ResultField::Status,
        ResultField::FetchStatus,
        ResultField::Data,
        ResultField::Error,
        ResultField::DataUpdatedAt,
        ResultField::ErrorUpdatedAt,
        ResultField::FailureCount,
        ResultField::ErrorUpdateCount,
        ResultField::IsFetched,
        ResultField::IsFetchedAfterMount,
        ResultField::IsPlaceholderData,
        ResultField::IsPreviousData,
        ResultField::IsStale,
        ResultField::IsLoading,
        ResultField::IsSuccess,
        ResultField::IsError,
        ResultField::IsFetching,
        ResultField::IsPaused,
        ResultField::IsLoadingError,
        ResultField::IsRefetchError,
        ResultField::IsRefetching,
        ResultField::Refetch,
        ResultField::Remove,
    ];

    /// Single-bit mask for this field.
    pub(crate) fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl<T, E> Diff for QueryObserverResult<T, E>
where
    T: PartialEq,
    E: PartialEq,
{
    type Field = ResultField;

    fn diff(&self, other: &Self) -> SmallVec<[ResultField; 8]> {
        let checks = [
            (ResultField::Status, self.status != other.status),
            (ResultField::FetchStatus, self.fetch_status != other.fetch_status),
            (ResultField::Data, self.data != other.data),
            (ResultField::Error, self.error != other.error),
            (ResultField::DataUpdatedAt, self.data_updated_at != other.data_updated_at),
            (ResultField::ErrorUpdatedAt, self.error_updated_at != other.error_updated_at),
            (ResultField::FailureCount, self.failure_count != other.failure_count),
            (ResultField::ErrorUpdateCount, self.error_update_count != other.error_update_count),
            (ResultField::IsFetched, self.is_fetched != other.is_fetched),
            (
                ResultField::IsFetchedAfterMount,
                self.is_fetched_after_mount != other.is_fetched_after_mount,
            ),
            (ResultField::IsPlaceholderData, self.is_placeholder_data != other.is_placeholder_data),
            (ResultField::IsPreviousData, self.is_previous_data != other.is_previous_data),
            (ResultField::IsStale, self.is_stale != other.is_stale),
            (ResultField::IsLoading, self.is_loading() != other.is_loading()),
            (ResultField::IsSuccess, self.is_success() != other.is_success()),
            (ResultField::IsError, self.is_error() != other.is_error()),
            (ResultField::IsFetching, self.is_fetching() != other.is_fetching()),
            (ResultField::IsPaused, self.is_paused() != other.is_paused()),
            (ResultField::IsLoadingError, self.is_loading_error() != other.is_loading_error()),
            (ResultField::IsRefetchError, self.is_refetch_error() != other.is_refetch_error()),
            (ResultField::IsRefetching, self.is_refetching() != other.is_refetching()),
            (ResultField::Refetch, !self.controls.same_refetch(&other.controls)),
            (ResultField::Remove, !self.controls.same_remove(&other.controls)),
        ];

        checks
            .into_iter()
            .filter_map(|(field, changed)| changed.then_some(field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn controls() -> QueryControls<String, String> {
        QueryControls::new(
            |_| async { QueryObserverResult::pending(noop_controls()) }.boxed(),
            || {},
        )
    }

    fn noop_controls() -> QueryControls<String, String> {
        QueryControls::new(|_| futures_util::future::pending().boxed(), || {})
    }

    #[test]
    fn derived_flags_follow_status() {
        let mut result = QueryObserverResult::pending(controls());
        result.fetch_status = FetchStatus::Fetching;
        assert!(result.is_loading());
        assert!(result.is_fetching());
        assert!(!result.is_refetching());

        result.status = QueryStatus::Error;
        result.fetch_status = FetchStatus::Idle;
        assert!(result.is_loading_error());
        assert!(!result.is_refetch_error());

        result.data_updated_at = 10;
        assert!(result.is_refetch_error());
    }

    #[test]
    fn diff_reports_fetch_change_and_derived_flags() {
        let before = QueryObserverResult::pending(controls());
        let mut after = before.clone();
        after.fetch_status = FetchStatus::Fetching;

        let changed = before.diff(&after);
        assert_eq!(
            changed.as_slice(),
            &[ResultField::FetchStatus, ResultField::IsFetching]
        );
    }

    #[test]
    fn diff_compares_controls_by_identity() {
        let before = QueryObserverResult::pending(controls());
        let same = before.clone();
        let replaced = QueryObserverResult::pending(controls());

        assert!(before.diff(&same).is_empty());
        assert_eq!(
            before.diff(&replaced).as_slice(),
            &[ResultField::Refetch, ResultField::Remove]
        );
    }

    #[test]
    fn field_names_are_camel_case() {
        let field: ResultField = serde_json::from_str(r#""isFetchedAfterMount""#).unwrap();
        assert_eq!(field, ResultField::IsFetchedAfterMount);
        assert_eq!(serde_json::to_string(&ResultField::Data).unwrap(), r#""data""#);
    }
}
