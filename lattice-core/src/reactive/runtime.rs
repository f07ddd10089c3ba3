//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects sources (signals,
//! memos, store fields, resources) with the computations that read them.
//!
//! # How It Works
//!
//! 1. When a memo or effect is created, it registers with the runtime.
//!
//! 2. When a computation reads a source inside a tracking context, the
//!    runtime records the edge `source -> subscriber`.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds all subscribers of that source
//!    b. Marks them dirty
//!    c. Hands them to the [`scheduler`](super::scheduler), which runs them
//!       in priority order once the current batch completes
//!
//! # Thread Safety
//!
//! The registry is global and lock-sharded (`DashMap`) so sources can be
//! cloned across threads, while tracking contexts and the scheduler queue
//! are thread-local. No registry guard is ever held while user code runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;

use super::context::ReactiveContext;
use super::scheduler::{self, NodeKind};
use super::subscriber::SubscriberId;

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Which scheduler phase this computation runs in.
    fn kind(&self) -> NodeKind;

    /// Mark this computation as needing to run again.
    fn mark_dirty(&self);

    /// Bring this computation up to date.
    fn run(&self);
}

/// The global reactive runtime.
pub struct Runtime;

type Registry = DashMap<SubscriberId, Weak<dyn Reactive>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static SOURCE_SUBSCRIBERS: OnceLock<DashMap<u64, IndexSet<SubscriberId>>> = OnceLock::new();
static SUBSCRIBER_SOURCES: OnceLock<DashMap<SubscriberId, IndexSet<u64>>> = OnceLock::new();
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(DashMap::new)
}

fn source_subscribers() -> &'static DashMap<u64, IndexSet<SubscriberId>> {
    SOURCE_SUBSCRIBERS.get_or_init(DashMap::new)
}

fn subscriber_sources() -> &'static DashMap<SubscriberId, IndexSet<u64>> {
    SUBSCRIBER_SOURCES.get_or_init(DashMap::new)
}

impl Runtime {
    /// Allocate an ID for a new trackable source.
    ///
    /// Signals, memos, store fields and resources share this namespace so a
    /// memo can be both a subscriber and a source.
    pub fn next_source_id() -> u64 {
        SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a computation with the runtime.
    ///
    /// The runtime only holds a weak reference; the computation is
    /// unregistered when its owner calls [`Runtime::unregister`] on drop.
    pub fn register(reactive: &Arc<dyn Reactive>) {
        registry().insert(reactive.subscriber_id(), Arc::downgrade(reactive));
    }

    /// Unregister a computation and drop all of its edges.
    pub fn unregister(id: SubscriberId) {
        registry().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Track a read of `source_id` by the currently running computation.
    ///
    /// Does nothing outside a tracking context.
    pub fn track(source_id: u64) {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(source_id);
            Self::add_dependency(source_id, subscriber_id);
        }
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source_id: u64, subscriber_id: SubscriberId) {
        source_subscribers()
            .entry(source_id)
            .or_default()
            .insert(subscriber_id);
        subscriber_sources()
            .entry(subscriber_id)
            .or_default()
            .insert(source_id);
    }

    /// Remove all dependencies for a subscriber.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let Some((_, sources)) = subscriber_sources().remove(&subscriber_id) else {
            return;
        };

        for source_id in sources {
            if let Some(mut subs) = source_subscribers().get_mut(&source_id) {
                subs.shift_remove(&subscriber_id);
            }
        }
    }

    /// Forget a source that will never change again.
    pub fn release_source(source_id: u64) {
        let Some((_, subscribers)) = source_subscribers().remove(&source_id) else {
            return;
        };

        for subscriber_id in subscribers {
            if let Some(mut sources) = subscriber_sources().get_mut(&subscriber_id) {
                sources.shift_remove(&source_id);
            }
        }
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism. Subscribers are
    /// marked dirty immediately and run by the scheduler in subscription
    /// order within each priority.
    pub fn notify_source_change(source_id: u64) {
        let subscriber_ids: Vec<SubscriberId> = match source_subscribers().get(&source_id) {
            Some(subs) => subs.iter().copied().collect(),
            None => return,
        };

        let reactives: Vec<Arc<dyn Reactive>> = subscriber_ids
            .into_iter()
            .filter_map(|id| registry().get(&id).and_then(|weak| weak.upgrade()))
            .collect();

        if reactives.is_empty() {
            return;
        }

        for reactive in &reactives {
            reactive.mark_dirty();
        }

        scheduler::enqueue(reactives);
    }

    /// Number of computations currently subscribed to a source.
    pub fn subscriber_count(source_id: u64) -> usize {
        source_subscribers()
            .get(&source_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32};

    struct MockReactive {
        id: SubscriberId,
        dirty: AtomicBool,
        runs: AtomicI32,
        kind: NodeKind,
    }

    impl MockReactive {
        fn new(kind: NodeKind) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                dirty: AtomicBool::new(false),
                runs: AtomicI32::new(0),
                kind,
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn kind(&self) -> NodeKind {
            self.kind
        }

        fn mark_dirty(&self) {
            self.dirty.store(true, Ordering::SeqCst);
        }

        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new(NodeKind::Derived);
        let id = reactive.id;

        let as_dyn: Arc<dyn Reactive> = reactive;
        Runtime::register(&as_dyn);
        assert!(registry().contains_key(&id));

        Runtime::unregister(id);
        assert!(!registry().contains_key(&id));
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let memo = MockReactive::new(NodeKind::Derived);
        let effect = MockReactive::new(NodeKind::Effect);
        let source = Runtime::next_source_id();

        let memo_dyn: Arc<dyn Reactive> = memo.clone();
        let effect_dyn: Arc<dyn Reactive> = effect.clone();
        Runtime::register(&memo_dyn);
        Runtime::register(&effect_dyn);

        Runtime::add_dependency(source, memo.id);
        Runtime::add_dependency(source, effect.id);

        Runtime::notify_source_change(source);

        assert!(memo.dirty.load(Ordering::SeqCst));
        assert!(effect.dirty.load(Ordering::SeqCst));
        assert_eq!(memo.runs.load(Ordering::SeqCst), 1);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);

        Runtime::unregister(memo.id);
        Runtime::unregister(effect.id);
    }

    #[test]
    fn runtime_clears_dependencies() {
        let reactive = MockReactive::new(NodeKind::Effect);
        let id = reactive.id;
        let source = Runtime::next_source_id();

        Runtime::add_dependency(source, id);
        assert_eq!(Runtime::subscriber_count(source), 1);

        Runtime::clear_dependencies(id);
        assert_eq!(Runtime::subscriber_count(source), 0);
    }

    #[test]
    fn released_source_has_no_subscribers() {
        let id = SubscriberId::new();
        let source = Runtime::next_source_id();

        Runtime::add_dependency(source, id);
        Runtime::release_source(source);

        assert_eq!(Runtime::subscriber_count(source), 0);
        assert!(subscriber_sources()
            .get(&id)
            .map(|sources| !sources.contains(&source))
            .unwrap_or(true));
    }

    #[test]
    fn tracking_outside_context_is_ignored() {
        let source = Runtime::next_source_id();
        Runtime::track(source);
        assert_eq!(Runtime::subscriber_count(source), 0);
    }
}
