//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty and queued in the
//!    scheduler's derived phase.
//!
//! 4. When it runs, the memo recomputes. If the new value equals the cached
//!    one its dependents are left alone; otherwise they are notified.
//!
//! Step 4 is what lets a memo absorb upstream churn: re-deriving a
//! structurally equal value never wakes downstream computations.
//!
//! # Thread Safety
//!
//! Memos are thread-safe. The computation runs without any memo lock held,
//! so it may freely read other signals and memos.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::scheduler::NodeKind;
use super::subscriber::SubscriberId;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute before its value can be used.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The PartialEq bound is used to
///   detect when a recomputation produced the same value.
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
}

struct MemoInner<T> {
    /// Source ID used when this memo is read.
    id: u64,

    /// Subscriber ID used when this memo reads its own dependencies.
    subscriber_id: SubscriberId,

    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    state: RwLock<MemoState>,

    /// Source IDs read during the last computation.
    dependencies: RwLock<Vec<u64>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            id: Runtime::next_source_id(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Dirty),
            dependencies: RwLock::new(Vec::new()),
        });

        let as_reactive: Arc<dyn Reactive> = inner.clone();
        Runtime::register(&as_reactive);

        Self { inner }
    }

    /// Get the memo's source ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Registers the calling computation as a dependent.
    pub fn get(&self) -> T {
        let value = self.inner.current();
        Runtime::track(self.inner.id);
        value
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.current()
    }

    /// Mark the memo as needing recomputation on next access.
    pub fn mark_dirty(&self) {
        *self.inner.state.write() = MemoState::Dirty;
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// Get the number of computations depending on this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }

    /// Get the number of sources this memo read during its last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.read().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn current(&self) -> T {
        if *self.state.read() == MemoState::Clean {
            if let Some(value) = self.value.read().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// Recompute the value inside a tracking context.
    ///
    /// Dependents are notified only when a previously cached value changed.
    fn recompute(&self) -> T {
        Runtime::clear_dependencies(self.subscriber_id);

        let new_value = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let value = (self.compute)();
            *self.dependencies.write() = ReactiveContext::get_dependencies();
            value
        };

        let changed = {
            let mut cached = self.value.write();
            let changed = cached.as_ref().is_some_and(|old| *old != new_value);
            *cached = Some(new_value.clone());
            changed
        };
        *self.state.write() = MemoState::Clean;

        if changed {
            Runtime::notify_source_change(self.id);
        }

        new_value
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Derived
    }

    fn mark_dirty(&self) {
        *self.state.write() = MemoState::Dirty;
    }

    fn run(&self) {
        // Already brought up to date by a read earlier in this flush.
        if *self.state.read() == MemoState::Clean {
            return;
        }
        self.recompute();
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
        Runtime::release_source(self.id);
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
