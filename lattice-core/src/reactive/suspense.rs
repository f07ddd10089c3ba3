//! Suspense Boundaries
//!
//! A [`SuspenseBoundary`] collects the resources that were read while still
//! pending inside [`SuspenseBoundary::run`]. While any of them is pending the
//! boundary reports itself as pending; a renderer shows a fallback instead of
//! the suspended content until [`SuspenseBoundary::is_pending`] turns false.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::signal::Signal;

thread_local! {
    static BOUNDARY_STACK: RefCell<Vec<SuspenseBoundary>> = const { RefCell::new(Vec::new()) };
}

/// Structured suspension for pending resources.
#[derive(Clone)]
pub struct SuspenseBoundary {
    inner: Arc<BoundaryInner>,
}

struct BoundaryInner {
    /// Source IDs of resources this boundary is waiting on.
    pending: Mutex<IndexSet<u64>>,

    /// Tracked mirror of `pending.len()`.
    count: Signal<usize>,
}

impl SuspenseBoundary {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BoundaryInner {
                pending: Mutex::new(IndexSet::new()),
                count: Signal::new(0),
            }),
        }
    }

    /// The innermost boundary on this thread.
    pub fn current() -> Option<SuspenseBoundary> {
        BOUNDARY_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Run `f` with this boundary installed as the current one.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        BOUNDARY_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = BoundaryGuard;
        f()
    }

    /// Start waiting on a resource. Returns false if already waiting.
    pub(crate) fn register(&self, resource_id: u64) -> bool {
        let len = {
            let mut pending = self.inner.pending.lock();
            if !pending.insert(resource_id) {
                return false;
            }
            pending.len()
        };
        self.inner.count.set_if_changed(len);
        true
    }

    /// Stop waiting on a resource.
    pub(crate) fn settle(&self, resource_id: u64) {
        let len = {
            let mut pending = self.inner.pending.lock();
            if !pending.shift_remove(&resource_id) {
                return;
            }
            pending.len()
        };
        self.inner.count.set_if_changed(len);
        if len == 0 {
            tracing::debug!("suspense boundary settled");
        }
    }

    /// Number of resources still pending. Tracked.
    pub fn pending_count(&self) -> usize {
        self.inner.count.get()
    }

    /// Whether any resource read under this boundary is still pending. Tracked.
    pub fn is_pending(&self) -> bool {
        self.pending_count() > 0
    }

    pub(crate) fn ptr_eq(&self, other: &SuspenseBoundary) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for SuspenseBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SuspenseBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspenseBoundary")
            .field("pending", &self.inner.pending.lock().len())
            .finish()
    }
}

struct BoundaryGuard;

impl Drop for BoundaryGuard {
    fn drop(&mut self) {
        BOUNDARY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
