//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified.
//!
//! 3. Notifications trigger re-execution of dependent computations.
//!
//! # Thread Safety
//!
//! Signals are thread-safe. The value is protected by a `parking_lot`
//! RwLock and clones share the same underlying cell. The lock is never
//! held while subscribers run.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::runtime::Runtime;

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    /// Unique source identifier for this signal.
    id: u64,

    /// The current value.
    value: RwLock<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::release_source(self.id);
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: Runtime::next_source_id(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id);
        f(&self.inner.value.read())
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        Runtime::notify_source_change(self.inner.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Get the number of computations currently depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Set a new value, notifying subscribers only if it differs from the
    /// current one. Returns whether the value changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        Runtime::notify_source_change(self.inner.id);
        true
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
