//! Reset Coordinator
//!
//! Consumes a boundary reset once the query that saw it has been activated,
//! so later activations under the same boundary go back to suppressing
//! retry-on-mount.

use lattice_core::reactive::{untrack, Effect};

use crate::boundary::QueryErrorResetBoundary;

/// Clears the boundary's reset flag after activation.
///
/// The clearing runs as a user effect: it is deferred to mount when created
/// during scope setup and is scheduled after the options watcher, which has
/// already handed the reset-aware options to the engine by then.
#[derive(Debug, Clone)]
pub struct ResetCoordinator {
    _effect: Effect,
}

impl ResetCoordinator {
    pub fn install(boundary: QueryErrorResetBoundary) -> Self {
        let effect = Effect::new(move || {
            if boundary.is_reset() {
                tracing::debug!("consuming error boundary reset");
                untrack(|| boundary.clear_reset());
            }
        });
        Self { _effect: effect }
    }
}
