//! Error Boundaries
//!
//! Two cooperating pieces:
//!
//! - [`QueryErrorResetBoundary`] holds the "has been reset" flag shared by
//!   every query under one boundary. While it is not reset, queries that
//!   escalate errors do not retry automatically on activation.
//! - [`ErrorBoundary`] catches errors escalated by query reads and shows
//!   them until it is reset.

use std::cell::RefCell;
use std::sync::OnceLock;

use lattice_core::reactive::{batch, untrack, Signal};

use crate::error::DataError;
use crate::query::{ErrorBoundaryPolicy, QueryHandle};

thread_local! {
    static PROVIDED: RefCell<Vec<QueryErrorResetBoundary>> = const { RefCell::new(Vec::new()) };
}

static DEFAULT_BOUNDARY: OnceLock<QueryErrorResetBoundary> = OnceLock::new();

/// Shared reset state for the queries under one error boundary.
#[derive(Clone, Debug)]
pub struct QueryErrorResetBoundary {
    is_reset: Signal<bool>,
}

impl QueryErrorResetBoundary {
    pub fn new() -> Self {
        Self {
            is_reset: Signal::new(false),
        }
    }

    /// Whether the boundary was reset since the flag was last cleared. Tracked.
    pub fn is_reset(&self) -> bool {
        self.is_reset.get()
    }

    pub fn reset(&self) {
        self.is_reset.set_if_changed(true);
    }

    pub fn clear_reset(&self) {
        self.is_reset.set_if_changed(false);
    }

    /// Run `f` with this boundary as the one [`current`](Self::current) returns.
    pub fn provide<R>(&self, f: impl FnOnce() -> R) -> R {
        PROVIDED.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = ProvideGuard;
        f()
    }

    /// The innermost provided boundary, or the process-wide default.
    pub fn current() -> Self {
        PROVIDED
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(|| DEFAULT_BOUNDARY.get_or_init(Self::new).clone())
    }
}

impl Default for QueryErrorResetBoundary {
    fn default() -> Self {
        Self::new()
    }
}

struct ProvideGuard;

impl Drop for ProvideGuard {
    fn drop(&mut self) {
        PROVIDED.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Whether `error` raised by `query` should be escalated under `policy`.
pub fn should_throw_error<E>(policy: &ErrorBoundaryPolicy<E>, error: &E, query: &QueryHandle) -> bool {
    policy.should_throw(error, query)
}

/// Catches errors escalated by reads of query data.
///
/// Only the first escalated error is kept; later ones are ignored until
/// [`reset`](Self::reset).
#[derive(Clone)]
pub struct ErrorBoundary<E>
where
    E: Clone + Send + Sync + 'static,
{
    error: Signal<Option<E>>,
}

impl<E> ErrorBoundary<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            error: Signal::new(None),
        }
    }

    /// Evaluate `f` under this boundary.
    ///
    /// Returns `None` when `f` is suspended or its error was escalated.
    pub fn catch<R>(&self, f: impl FnOnce() -> Result<R, DataError<E>>) -> Option<R> {
        match f() {
            Ok(value) => Some(value),
            Err(DataError::Suspended) => None,
            Err(DataError::Boundary(error)) => {
                if untrack(|| self.error.with(Option::is_none)) {
                    tracing::debug!("error boundary caught query error");
                    self.error.set(Some(error));
                }
                None
            }
        }
    }

    /// The caught error, if any. Tracked.
    pub fn error(&self) -> Option<E> {
        self.error.get()
    }

    pub fn has_error(&self) -> bool {
        self.error.with(Option::is_some)
    }

    /// Drop the caught error and mark `reset_boundary` reset so queries
    /// below it may retry on their next activation.
    pub fn reset(&self, reset_boundary: &QueryErrorResetBoundary) {
        batch(|| {
            self.error.set(None);
            reset_boundary.reset();
        });
        tracing::debug!("error boundary reset");
    }
}

impl<E> Default for ErrorBoundary<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
