//! Suspense Adapter
//!
//! Compresses the engine's stream of intermediate results into the single
//! terminal outcome a [`Resource`] understands:
//!
//! | observed result                  | adapter state        |
//! |----------------------------------|----------------------|
//! | success                          | `resolved(data)`     |
//! | error, no fetch in progress      | `errored(error)`     |
//! | anything else                    | `unresolved`         |
//!
//! Falling back to `unresolved` after a terminal state starts a new wait
//! (for example after the cache entry was removed and is fetched again).

use lattice_core::reactive::{Outcome, Resource, ResourceState};

use crate::query::{QueryObserverResult, QueryStatus};

pub struct SuspenseAdapter<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    resource: Resource<Option<T>, E>,
}

impl<T, E> SuspenseAdapter<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an adapter already reflecting `initial`.
    pub fn new(initial: &QueryObserverResult<T, E>) -> Self {
        let adapter = Self {
            resource: Resource::new(),
        };
        adapter.observe(initial);
        adapter
    }

    /// Apply the transition rule to a newly published result.
    pub fn observe(&self, result: &QueryObserverResult<T, E>) {
        let next = match result.status {
            QueryStatus::Success => ResourceState::Ready(result.data.clone()),
            QueryStatus::Error if !result.is_fetching() => match &result.error {
                Some(error) => ResourceState::Errored(error.clone()),
                None => ResourceState::Pending,
            },
            _ => ResourceState::Pending,
        };

        let current = self.resource.state_untracked();
        if current == next {
            return;
        }

        match next {
            ResourceState::Ready(data) => {
                tracing::debug!(generation = self.resource.generation(), "suspension resolved");
                self.resource.resolve(data);
            }
            ResourceState::Errored(error) => {
                tracing::debug!(generation = self.resource.generation(), "suspension errored");
                self.resource.reject(error);
            }
            ResourceState::Pending => {
                self.resource.restart();
                tracing::debug!(
                    generation = self.resource.generation(),
                    "suspension restarted"
                );
            }
        }
    }

    /// Read the terminal outcome. Tracked.
    ///
    /// While unresolved the read is registered with the current suspense
    /// boundary and [`Outcome::Suspended`] is returned.
    pub fn read(&self) -> Outcome<Option<T>, E> {
        self.resource.read()
    }

    /// The underlying state without tracking.
    pub fn state(&self) -> ResourceState<Option<T>, E> {
        self.resource.state_untracked()
    }

    /// Number of waits started after the first one.
    pub fn generation(&self) -> u64 {
        self.resource.generation()
    }

    /// Wait until the adapter settles.
    pub async fn settled(&self) -> Result<Option<T>, E> {
        self.resource.settled().await
    }
}

impl<T, E> Clone for SuspenseAdapter<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
