//! Store Synchronizer
//!
//! Holds the last published result in a tracked [`Store`]. Each publish
//! replaces the whole result at once, so a dependent sees either the old or
//! the new result in full.

use std::sync::Arc;

use smallvec::SmallVec;

use lattice_core::reactive::{Diff, Store};

use crate::query::{QueryObserverResult, ResultField};

pub struct StoreSynchronizer<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    store: Store<QueryObserverResult<T, E>>,
}

impl<T, E> StoreSynchronizer<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: QueryObserverResult<T, E>) -> Self {
        Self {
            store: Store::new(initial),
        }
    }

    /// Replace the result and notify readers of the fields that changed.
    pub fn publish(&self, result: QueryObserverResult<T, E>) -> SmallVec<[ResultField; 8]> {
        self.store.replace(result)
    }

    /// Replace the result without waking anyone.
    pub fn publish_silently(&self, result: QueryObserverResult<T, E>) -> SmallVec<[ResultField; 8]> {
        self.store.replace_silently(result)
    }

    /// Fields that would change if `next` were published.
    pub fn changed_fields(&self, next: &QueryObserverResult<T, E>) -> SmallVec<[ResultField; 8]> {
        self.store.get_untracked().diff(next)
    }

    /// The current result. Tracks every field.
    pub fn current(&self) -> Arc<QueryObserverResult<T, E>> {
        self.store.get()
    }

    pub fn current_untracked(&self) -> Arc<QueryObserverResult<T, E>> {
        self.store.get_untracked()
    }

    /// Whether a live computation depends on `field`.
    pub fn is_observed(&self, field: ResultField) -> bool {
        self.store.is_observed(field)
    }

    /// Read one field of the current result. Tracks only that field.
    pub fn read<R>(&self, field: ResultField, f: impl FnOnce(&QueryObserverResult<T, E>) -> R) -> R {
        self.store.read(field, f)
    }
}

impl<T, E> Clone for StoreSynchronizer<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FetchStatus, QueryControls, QueryStatus};
    use futures_util::FutureExt;
    use lattice_core::reactive::Effect;
    use parking_lot::Mutex;

    fn pending() -> QueryObserverResult<String, String> {
        QueryObserverResult::pending(QueryControls::new(
            |_| futures_util::future::pending().boxed(),
            || {},
        ))
    }

    #[test]
    fn readers_see_whole_results_only() {
        let sync = StoreSynchronizer::new(pending());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (reader, log) = (sync.clone(), seen.clone());
        let _effect = Effect::new(move || {
            let status = reader.read(ResultField::Status, |r| r.status);
            let data = reader.read(ResultField::Data, |r| r.data.clone());
            log.lock().push((status, data));
        });

        let mut next = sync.current_untracked().as_ref().clone();
        next.status = QueryStatus::Success;
        next.data = Some("test".into());
        next.fetch_status = FetchStatus::Idle;
        sync.publish(next);

        assert_eq!(
            *seen.lock(),
            vec![
                (QueryStatus::Pending, None),
                (QueryStatus::Success, Some("test".to_string())),
            ]
        );
    }

    #[test]
    fn changed_fields_compares_against_current() {
        let sync = StoreSynchronizer::new(pending());
        let mut next = sync.current_untracked().as_ref().clone();
        next.failure_count = 1;

        assert_eq!(
            sync.changed_fields(&next).as_slice(),
            &[ResultField::FailureCount]
        );

        sync.publish_silently(next);
        assert_eq!(sync.current_untracked().failure_count, 1);
    }
}
