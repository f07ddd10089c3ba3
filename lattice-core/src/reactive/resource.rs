//! Async Resources
//!
//! A [`Resource`] is a tracked cell for a value produced asynchronously. It is
//! `Pending` until resolved or rejected, and can be restarted to wait for a
//! fresh outcome.
//!
//! Reading a resource from reactive code never blocks. [`Resource::read`]
//! returns [`Outcome::Suspended`] while pending and registers the read with
//! the current [`SuspenseBoundary`], so the boundary can show a fallback until
//! the value settles. Async code can instead await [`Resource::settled`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::runtime::Runtime;
use super::suspense::SuspenseBoundary;

/// Settlement state of a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<T, E> {
    Pending,
    Ready(T),
    Errored(E),
}

/// The result of reading a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    /// No terminal outcome yet; the reader must wait.
    Suspended,
    Ready(T),
    Errored(E),
}

impl<T, E> Outcome<T, E> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Outcome::Suspended)
    }
}

/// A suspension-aware asynchronous value.
pub struct Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Arc<ResourceInner<T, E>>,
}

struct ResourceInner<T, E> {
    id: u64,
    state: watch::Sender<ResourceState<T, E>>,

    /// Incremented by every restart.
    generation: AtomicU64,

    /// Boundaries that read this resource while it was pending.
    waiting: Mutex<Vec<SuspenseBoundary>>,
}

impl<T, E> Drop for ResourceInner<T, E> {
    fn drop(&mut self) {
        let waiting = std::mem::take(self.waiting.get_mut());
        for boundary in waiting {
            boundary.settle(self.id);
        }
        Runtime::release_source(self.id);
    }
}

impl<T, E> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a pending resource.
    pub fn new() -> Self {
        Self::with_state(ResourceState::Pending)
    }

    fn with_state(state: ResourceState<T, E>) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            inner: Arc::new(ResourceInner {
                id: Runtime::next_source_id(),
                state: tx,
                generation: AtomicU64::new(0),
                waiting: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The current state. Tracked.
    pub fn state(&self) -> ResourceState<T, E> {
        Runtime::track(self.inner.id);
        self.inner.state.borrow().clone()
    }

    /// The current state without tracking.
    pub fn state_untracked(&self) -> ResourceState<T, E> {
        self.inner.state.borrow().clone()
    }

    /// Read the value. Tracked.
    ///
    /// While pending, the read is registered with the current
    /// [`SuspenseBoundary`] and [`Outcome::Suspended`] is returned.
    pub fn read(&self) -> Outcome<T, E> {
        match self.state() {
            ResourceState::Ready(value) => Outcome::Ready(value),
            ResourceState::Errored(error) => Outcome::Errored(error),
            ResourceState::Pending => {
                if let Some(boundary) = SuspenseBoundary::current() {
                    self.wait_under(boundary);
                }
                Outcome::Suspended
            }
        }
    }

    fn wait_under(&self, boundary: SuspenseBoundary) {
        {
            let mut waiting = self.inner.waiting.lock();
            if waiting.iter().any(|b| b.ptr_eq(&boundary)) {
                return;
            }
            waiting.push(boundary.clone());
        }
        boundary.register(self.inner.id);
    }

    /// Whether a terminal outcome has been reached.
    pub fn is_settled(&self) -> bool {
        !matches!(*self.inner.state.borrow(), ResourceState::Pending)
    }

    /// Settle with a value.
    pub fn resolve(&self, value: T) {
        self.settle(ResourceState::Ready(value));
    }

    /// Settle with an error.
    pub fn reject(&self, error: E) {
        self.settle(ResourceState::Errored(error));
    }

    fn settle(&self, state: ResourceState<T, E>) {
        self.inner.state.send_replace(state);

        let waiting = std::mem::take(&mut *self.inner.waiting.lock());
        for boundary in waiting {
            boundary.settle(self.inner.id);
        }

        Runtime::notify_source_change(self.inner.id);
    }

    /// Discard any outcome and wait for a new one.
    pub fn restart(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(ResourceState::Pending);
        tracing::debug!(resource = self.inner.id, generation, "resource restarted");
        Runtime::notify_source_change(self.inner.id);
    }

    /// How many times this resource has been restarted.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Wait until the resource is resolved or rejected.
    pub async fn settled(&self) -> Result<T, E> {
        let mut rx = self.inner.state.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                ResourceState::Ready(value) => return Ok(value.clone()),
                ResourceState::Errored(error) => return Err(error.clone()),
                ResourceState::Pending => {}
            }
            // The sender lives in `self`, so the channel cannot close here.
            let _ = rx.changed().await;
        }
    }
}

impl<T, E> Default for Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for Resource<T, E>
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
    E: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.state.borrow())
            .field("generation", &self.generation())
            .finish()
    }
}
