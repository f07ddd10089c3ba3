//! Tracked Store
//!
//! A [`Store`] holds a structured value that is replaced as a whole but
//! tracked per field. Reading one field subscribes the reader to that field
//! only; replacing the value notifies just the fields that differ.
//!
//! # Atomicity
//!
//! The value lives behind a single `Arc` that is swapped under one write
//! lock, and change notifications for all affected fields are issued inside
//! one [`batch`]. A dependent therefore runs at most once per replace and
//! always sees every field of the new value, never a mix of old and new.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::runtime::Runtime;
use super::scheduler::batch;

/// Field-level comparison of two snapshots of the same type.
pub trait Diff {
    /// Identifies a trackable field.
    type Field: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// Every field whose value differs between `self` and `other`.
    fn diff(&self, other: &Self) -> SmallVec<[Self::Field; 8]>;
}

/// A reactive value with atomic replacement and per-field tracking.
pub struct Store<T>
where
    T: Diff + Send + Sync + 'static,
{
    inner: Arc<StoreInner<T>>,
}

struct StoreInner<T: Diff> {
    /// Source notified on any change; used by whole-value reads.
    any_id: u64,

    value: RwLock<Arc<T>>,

    /// Lazily allocated source IDs, one per field that has been read.
    fields: RwLock<HashMap<T::Field, u64>>,
}

impl<T: Diff> Drop for StoreInner<T> {
    fn drop(&mut self) {
        Runtime::release_source(self.any_id);
        for id in self.fields.get_mut().values() {
            Runtime::release_source(*id);
        }
    }
}

impl<T> Store<T>
where
    T: Diff + Send + Sync + 'static,
{
    /// Create a store holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                any_id: Runtime::next_source_id(),
                value: RwLock::new(Arc::new(value)),
                fields: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The whole current value. Tracks every field.
    pub fn get(&self) -> Arc<T> {
        Runtime::track(self.inner.any_id);
        self.get_untracked()
    }

    /// The whole current value without tracking.
    pub fn get_untracked(&self) -> Arc<T> {
        Arc::clone(&self.inner.value.read())
    }

    /// Read through `f`, tracking only `field`.
    pub fn read<R>(&self, field: T::Field, f: impl FnOnce(&T) -> R) -> R {
        self.track(field);
        let value = self.get_untracked();
        f(&value)
    }

    /// Register a dependency on `field` for the running computation.
    pub fn track(&self, field: T::Field) {
        if Runtime::is_tracking() {
            Runtime::track(self.field_id(field));
        }
    }

    /// Whether some live computation currently depends on `field`, directly
    /// or through a whole-value read.
    pub fn is_observed(&self, field: T::Field) -> bool {
        if Runtime::subscriber_count(self.inner.any_id) > 0 {
            return true;
        }
        self.inner
            .fields
            .read()
            .get(&field)
            .is_some_and(|id| Runtime::subscriber_count(*id) > 0)
    }

    fn field_id(&self, field: T::Field) -> u64 {
        if let Some(id) = self.inner.fields.read().get(&field) {
            return *id;
        }
        *self
            .inner
            .fields
            .write()
            .entry(field)
            .or_insert_with(Runtime::next_source_id)
    }

    /// Replace the whole value and notify readers of changed fields.
    ///
    /// Returns the fields that changed.
    pub fn replace(&self, value: T) -> SmallVec<[T::Field; 8]> {
        let changed = self.swap(value);
        if changed.is_empty() {
            return changed;
        }

        let ids: SmallVec<[u64; 8]> = {
            let fields = self.inner.fields.read();
            changed
                .iter()
                .filter_map(|field| fields.get(field).copied())
                .collect()
        };

        batch(|| {
            for id in ids {
                Runtime::notify_source_change(id);
            }
            Runtime::notify_source_change(self.inner.any_id);
        });

        changed
    }

    /// Replace the whole value without notifying anyone.
    ///
    /// Later reads observe the new value; nothing re-runs because of it.
    pub fn replace_silently(&self, value: T) -> SmallVec<[T::Field; 8]> {
        self.swap(value)
    }

    fn swap(&self, value: T) -> SmallVec<[T::Field; 8]> {
        let mut guard = self.inner.value.write();
        let changed = guard.diff(&value);
        *guard = Arc::new(value);
        changed
    }
}

impl<T> Clone for Store<T>
where
    T: Diff + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Store<T>
where
    T: Diff + Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("value", &self.get_untracked())
            .field("tracked_fields", &self.inner.fields.read().len())
            .finish()
    }
}
