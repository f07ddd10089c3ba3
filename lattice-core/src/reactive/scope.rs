//! Lifecycle Scopes
//!
//! A [`Scope`] owns the computations and callbacks created while it runs and
//! defines their lifetime:
//!
//! - **Setup**: [`Scope::run`] executes a closure with the scope installed as
//!   the current owner. User effects created during setup are deferred.
//! - **Mount** (activation): once setup returns, deferred effects and
//!   [`on_mount`] callbacks run in creation order.
//! - **Cleanup** (deactivation): [`Scope::dispose`] disposes owned effects and
//!   runs [`on_cleanup`] callbacks in reverse registration order. Dropping the
//!   last handle to a scope disposes it.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::untrack;
use super::effect::Effect;
use super::scheduler;

thread_local! {
    static OWNER_STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

type Callback = Box<dyn FnOnce() + Send>;

/// An owner of reactive computations with an explicit lifecycle.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    setting_up: AtomicBool,
    disposed: AtomicBool,
    owned: Mutex<Vec<Effect>>,
    deferred: Mutex<Vec<Effect>>,
    cleanups: Mutex<Vec<Callback>>,
}

impl Scope {
    /// Create a new, empty scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner::default()),
        }
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<Scope> {
        OWNER_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Run `f` as this scope's setup, then mount everything it deferred.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let was_setting_up = self.inner.setting_up.swap(true, Ordering::SeqCst);

        let out = {
            let _owner = OwnerGuard::push(self.clone());
            scheduler::batch(f)
        };

        self.inner.setting_up.store(was_setting_up, Ordering::SeqCst);
        if !was_setting_up {
            self.mount();
        }
        out
    }

    fn mount(&self) {
        let deferred = std::mem::take(&mut *self.inner.deferred.lock());
        if deferred.is_empty() {
            return;
        }

        let _owner = OwnerGuard::push(self.clone());
        scheduler::batch(|| {
            for effect in deferred {
                effect.execute();
            }
        });
    }

    /// Whether this scope is still running its setup closure.
    pub fn is_setting_up(&self) -> bool {
        self.inner.setting_up.load(Ordering::SeqCst)
    }

    /// Whether this scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Keep `effect` alive until this scope is disposed.
    pub fn own(&self, effect: Effect) {
        if self.is_disposed() {
            effect.dispose();
            return;
        }
        self.inner.owned.lock().push(effect);
    }

    /// Own `effect` and run it for the first time at mount.
    pub(crate) fn defer(&self, effect: Effect) {
        self.own(effect.clone());
        self.inner.deferred.lock().push(effect);
    }

    /// Register a callback to run when this scope is disposed.
    pub fn add_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_disposed() {
            f();
            return;
        }
        self.inner.cleanups.lock().push(Box::new(f));
    }

    /// Tear the scope down: stop owned effects and run cleanups.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Number of effects owned by this scope.
    pub fn owned_count(&self) -> usize {
        self.inner.owned.lock().len()
    }
}

impl ScopeInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let owned = std::mem::take(&mut *self.owned.lock());
        self.deferred.lock().clear();
        for effect in &owned {
            effect.dispose();
        }

        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        let cleanup_count = cleanups.len();
        untrack(|| {
            for cleanup in cleanups.into_iter().rev() {
                cleanup();
            }
        });

        tracing::debug!(
            effects = owned.len(),
            cleanups = cleanup_count,
            "scope disposed"
        );
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("setting_up", &self.is_setting_up())
            .field("disposed", &self.is_disposed())
            .field("owned", &self.owned_count())
            .finish()
    }
}

struct OwnerGuard;

impl OwnerGuard {
    fn push(scope: Scope) -> Self {
        OWNER_STACK.with(|stack| stack.borrow_mut().push(scope));
        Self
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        OWNER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f` once, untracked, when the current scope mounts.
///
/// Outside any scope the callback runs immediately.
pub fn on_mount(f: impl FnOnce() + Send + 'static) {
    let slot = Mutex::new(Some(f));
    let effect = Effect::new_lazy(move || {
        if let Some(f) = slot.lock().take() {
            untrack(f);
        }
    });

    match Scope::current() {
        Some(scope) if scope.is_setting_up() => scope.defer(effect),
        _ => effect.execute(),
    }
}

/// Run `f` when the current scope is disposed.
///
/// Outside any scope the callback can never run; a warning is logged and the
/// callback is dropped.
pub fn on_cleanup(f: impl FnOnce() + Send + 'static) {
    match Scope::current() {
        Some(scope) => scope.add_cleanup(f),
        None => tracing::warn!("on_cleanup called outside a scope; cleanup will never run"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effects_created_during_setup_run_at_mount() {
        let scope = Scope::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        scope.run(move || {
            let inner_log = log_clone.clone();
            Effect::new(move || inner_log.lock().push("effect"));
            log_clone.lock().push("setup done");
        });

        assert_eq!(*log.lock(), vec!["setup done", "effect"]);
        assert_eq!(scope.owned_count(), 1);
    }

    #[test]
    fn mount_callbacks_run_in_creation_order() {
        let scope = Scope::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        scope.run(move || {
            let (a, b) = (log_clone.clone(), log_clone.clone());
            on_mount(move || a.lock().push("mount"));
            Effect::new(move || b.lock().push("effect"));
        });

        assert_eq!(*log.lock(), vec!["mount", "effect"]);
    }

    #[test]
    fn dispose_runs_cleanups_in_reverse_and_stops_effects() {
        let scope = Scope::new();
        let signal = Signal::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        let runs = Arc::new(AtomicI32::new(0));

        let (log_clone, runs_clone, signal_clone) = (log.clone(), runs.clone(), signal.clone());
        scope.run(move || {
            let (a, b) = (log_clone.clone(), log_clone.clone());
            on_cleanup(move || a.lock().push("first"));
            on_cleanup(move || b.lock().push("second"));
            Effect::new(move || {
                signal_clone.get();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        scope.dispose();
        scope.dispose();

        assert_eq!(*log.lock(), vec!["second", "first"]);
        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(scope.is_disposed());
    }

    #[test]
    fn dropping_scope_disposes_it() {
        let cleaned = Arc::new(AtomicBool::new(false));
        {
            let scope = Scope::new();
            let cleaned_clone = cleaned.clone();
            scope.run(move || on_cleanup(move || cleaned_clone.store(true, Ordering::SeqCst)));
        }
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn on_mount_outside_scope_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        on_mount(move || ran_clone.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }
}
