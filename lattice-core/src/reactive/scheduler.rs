//! Update Scheduler
//!
//! The scheduler determines the order in which dirty computations run.
//!
//! # Algorithm
//!
//! Work is split into three phases by [`NodeKind`]:
//!
//! 1. `Derived` nodes (memos) recompute first, so that every later phase
//!    reads settled derived values.
//! 2. `Computed` nodes (synchronous computations that feed external
//!    systems) run next.
//! 3. `Effect` nodes (user effects) run last.
//!
//! After each node runs the scheduler returns to the highest-priority
//! non-empty queue, so a memo invalidated by an effect is recomputed before
//! the next effect observes it. Within a phase nodes run in the order they
//! were first queued, and a node queued twice before running runs once.
//!
//! Updates made inside [`batch`] are queued and flushed when the outermost
//! batch completes.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use super::runtime::Reactive;
use super::subscriber::SubscriberId;

/// Upper bound on nodes run by a single flush before it is considered a cycle.
const MAX_FLUSH_ITERATIONS: usize = 100_000;

/// The scheduling phase of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// A derived value (memo). Runs first.
    Derived = 0,

    /// A synchronous computation that must see settled derived values but
    /// run before user effects.
    Computed = 1,

    /// A user effect. Runs last.
    Effect = 2,
}

/// The per-thread queue of pending computations.
pub struct UpdateScheduler {
    /// Nesting depth of active batches.
    depth: usize,

    /// Whether a flush is in progress on this thread.
    flushing: bool,

    /// Pending nodes, one queue per [`NodeKind`].
    queues: [IndexMap<SubscriberId, Arc<dyn Reactive>>; 3],
}

thread_local! {
    static SCHEDULER: RefCell<UpdateScheduler> = RefCell::new(UpdateScheduler::new());
}

impl UpdateScheduler {
    fn new() -> Self {
        Self {
            depth: 0,
            flushing: false,
            queues: [IndexMap::new(), IndexMap::new(), IndexMap::new()],
        }
    }

    fn push(&mut self, reactive: Arc<dyn Reactive>) {
        let queue = &mut self.queues[reactive.kind() as usize];
        queue.entry(reactive.subscriber_id()).or_insert(reactive);
    }

    fn pop_next(&mut self) -> Option<Arc<dyn Reactive>> {
        self.queues
            .iter_mut()
            .find(|queue| !queue.is_empty())
            .and_then(|queue| queue.shift_remove_index(0))
            .map(|(_, reactive)| reactive)
    }

    fn is_idle(&self) -> bool {
        self.depth == 0 && !self.flushing
    }

    fn pending(&self) -> usize {
        self.queues.iter().map(IndexMap::len).sum()
    }
}

/// Queue computations and flush them unless a batch or flush is active.
pub(crate) fn enqueue(reactives: Vec<Arc<dyn Reactive>>) {
    let idle = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        for reactive in reactives {
            scheduler.push(reactive);
        }
        scheduler.is_idle()
    });

    if idle {
        flush();
    }
}

/// Run `f` with updates deferred until it returns.
///
/// Every computation invalidated inside `f` runs at most once, after `f`
/// completes, and observes all of the writes made inside it.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    SCHEDULER.with(|scheduler| scheduler.borrow_mut().depth += 1);
    let guard = BatchGuard;
    let out = f();
    drop(guard);

    let idle = SCHEDULER.with(|scheduler| scheduler.borrow().is_idle());
    if idle {
        flush();
    }
    out
}

/// Number of computations waiting to run on this thread.
pub fn pending_updates() -> usize {
    SCHEDULER.with(|scheduler| scheduler.borrow().pending())
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|scheduler| scheduler.borrow_mut().depth -= 1);
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|scheduler| scheduler.borrow_mut().flushing = false);
    }
}

fn flush() {
    if std::thread::panicking() {
        return;
    }

    SCHEDULER.with(|scheduler| scheduler.borrow_mut().flushing = true);
    let _guard = FlushGuard;

    let mut iterations = 0usize;
    loop {
        let next = SCHEDULER.with(|scheduler| scheduler.borrow_mut().pop_next());
        let Some(reactive) = next else {
            break;
        };

        iterations += 1;
        if iterations > MAX_FLUSH_ITERATIONS {
            let dropped = SCHEDULER.with(|scheduler| {
                let mut scheduler = scheduler.borrow_mut();
                let dropped = scheduler.pending();
                scheduler.queues.iter_mut().for_each(IndexMap::clear);
                dropped
            });
            tracing::error!(
                iterations,
                dropped,
                "reactive flush exceeded iteration limit, dropping queued updates"
            );
            break;
        }

        reactive.run();
    }

    tracing::trace!(iterations, "reactive flush complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        id: SubscriberId,
        kind: NodeKind,
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Reactive for Recorder {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn kind(&self) -> NodeKind {
            self.kind
        }

        fn mark_dirty(&self) {}

        fn run(&self) {
            self.log.lock().push(self.name);
        }
    }

    fn recorder(
        kind: NodeKind,
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Reactive> {
        Arc::new(Recorder {
            id: SubscriberId::new(),
            kind,
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn flush_runs_phases_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effect = recorder(NodeKind::Effect, "effect", &log);
        let computed = recorder(NodeKind::Computed, "computed", &log);
        let derived = recorder(NodeKind::Derived, "derived", &log);

        batch(|| enqueue(vec![effect, computed, derived]));

        assert_eq!(*log.lock(), vec!["derived", "computed", "effect"]);
    }

    #[test]
    fn batch_deduplicates_queued_nodes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effect = recorder(NodeKind::Effect, "effect", &log);

        batch(|| {
            enqueue(vec![effect.clone()]);
            enqueue(vec![effect.clone()]);
            assert_eq!(pending_updates(), 1);
            assert!(log.lock().is_empty());
        });

        assert_eq!(*log.lock(), vec!["effect"]);
        assert_eq!(pending_updates(), 0);
    }

    #[test]
    fn nested_batches_flush_once_at_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effect = recorder(NodeKind::Effect, "effect", &log);

        batch(|| {
            batch(|| enqueue(vec![effect.clone()]));
            assert!(log.lock().is_empty());
        });

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn batch_returns_closure_value() {
        assert_eq!(batch(|| 7), 7);
    }
}
