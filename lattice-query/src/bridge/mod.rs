//! Query Bridge
//!
//! Connects one engine observer to the reactive runtime. The pieces, from
//! the engine inward:
//!
//! - [`SubscriptionManager`] holds the single subscription and filters
//!   notifications by the fields consumers actually read.
//! - [`StoreSynchronizer`] publishes each result into a tracked store,
//!   replacing it whole.
//! - [`SuspenseAdapter`] reduces the result stream to the terminal outcome a
//!   suspense boundary waits on.
//! - [`QueryResult`] is what consumers read; it records each field read and
//!   routes [`QueryResult::data`] through suspense and error escalation.
//! - [`ResetCoordinator`] consumes error boundary resets after activation.
//!
//! [`create_query`] and [`create_base_query`] assemble these inside the
//! current [`Scope`](lattice_core::reactive::Scope).

mod base_query;
mod options;
mod query;
mod reset;
mod subscription;
mod suspense;
mod sync;
mod tracked;

pub use base_query::create_base_query;
pub use options::{resolve_options, SUSPENSE_STALE_TIME};
pub use query::create_query;
pub use reset::ResetCoordinator;
pub use subscription::{ChangeFilter, LivenessToken, SubscriptionManager};
pub use suspense::SuspenseAdapter;
pub use sync::StoreSynchronizer;
pub use tracked::{QueryResult, TrackedProps};
