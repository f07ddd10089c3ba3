//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function to establish initial
//!    dependencies. Inside a [`Scope`](super::Scope) that is still being set
//!    up, that first run is deferred to the scope's mount phase.
//!
//! 2. When any dependency changes, the effect is queued in the scheduler.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Kinds
//!
//! - [`Effect::new`] creates a user effect ([`NodeKind::Effect`]).
//! - [`Effect::computed`] creates a computation that runs immediately, even
//!   during scope setup, and is scheduled before user effects
//!   ([`NodeKind::Computed`]). Use it to push derived state into external
//!   systems that user effects then observe.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are pulled when read; effects run when their dependencies change.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::scheduler::{self, NodeKind};
use super::scope::Scope;
use super::subscriber::SubscriberId;

/// A side-effecting computation that runs when dependencies change.
///
/// Dropping every handle to an effect (including the one held by its
/// owning scope) stops it.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", count.get());
/// });
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    subscriber_id: SubscriberId,

    kind: NodeKind,

    run: Box<dyn Fn() + Send + Sync>,

    /// Source IDs read during the last run.
    dependencies: RwLock<Vec<u64>>,

    disposed: AtomicBool,

    run_count: AtomicUsize,
}

impl Effect {
    /// Create a new user effect.
    ///
    /// Runs immediately, or at mount time when created during scope setup.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(NodeKind::Effect, run);

        match Scope::current() {
            Some(scope) if scope.is_setting_up() => scope.defer(effect.clone()),
            Some(scope) => {
                scope.own(effect.clone());
                effect.execute();
            }
            None => effect.execute(),
        }

        effect
    }

    /// Create a computation that runs immediately and is scheduled ahead of
    /// user effects.
    pub fn computed<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(NodeKind::Computed, run);

        if let Some(scope) = Scope::current() {
            scope.own(effect.clone());
        }
        effect.execute();

        effect
    }

    /// Create a new user effect without running it.
    ///
    /// Useful for cases where you want to control when the effect first runs.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(NodeKind::Effect, run)
    }

    fn build<F>(kind: NodeKind, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            kind,
            run: Box::new(run),
            dependencies: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        let as_reactive: Arc<dyn Reactive> = inner.clone();
        Runtime::register(&as_reactive);

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the scheduling phase of this effect.
    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    /// Execute the effect function.
    ///
    /// Updates made by the function are batched and flushed after it returns.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            Runtime::clear_dependencies(self.inner.subscriber_id);
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.read().len()
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        Runtime::clear_dependencies(self.subscriber_id);

        scheduler::batch(|| {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.run)();
            *self.dependencies.write() = ReactiveContext::get_dependencies();
        });

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn mark_dirty(&self) {}

    fn run(&self) {
        self.execute();
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("kind", &self.inner.kind)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
