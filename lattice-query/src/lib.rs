//! Lattice Query
//!
//! Bridges an asynchronous query engine (cache, fetching, retries) into the
//! Lattice reactive runtime. The engine is reached only through the
//! [`QueryClient`] and [`QueryObserver`] traits; this crate turns an
//! observer's result stream into fine-grained reactive state:
//!
//! - each result field is tracked separately, so a consumer that reads only
//!   `data` is not woken when `is_fetching` flips;
//! - under suspense, reads of `data` register with the enclosing
//!   [`SuspenseBoundary`](lattice_core::reactive::SuspenseBoundary) until the
//!   first result settles;
//! - failed queries can escalate their error to an [`ErrorBoundary`], which
//!   suppresses automatic retries until it is reset.
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_core::reactive::{Effect, Scope};
//! use lattice_query::{create_query, QueryFn, QueryKey};
//!
//! let scope = Scope::new();
//! scope.run(|| {
//!     let fetch = QueryFn::new(|_| async { Ok::<_, String>("test".to_string()) });
//!     let todos = create_query(client.clone(), move || (QueryKey::from("todos"), fetch.clone()));
//!
//!     Effect::new(move || println!("{:?}", todos.data()));
//! });
//! ```

pub mod boundary;
pub mod bridge;
pub mod config;
pub mod error;
pub mod query;

pub use boundary::{should_throw_error, ErrorBoundary, QueryErrorResetBoundary};
pub use bridge::{create_base_query, create_query, QueryResult};
pub use config::{DefaultOptions, DefaultQueryOptions, QueryClientConfig};
pub use error::{ConfigError, DataError};
pub use query::{
    EffectiveOptions, ErrorBoundaryPolicy, FetchStatus, NotifyOnChangeProps, NotifyOptions,
    QueryClient, QueryControls, QueryFn, QueryHandle, QueryKey, QueryObserver,
    QueryObserverResult, QueryOptions, QueryStatus, RefetchOptions, ResultField, Retry, Select,
};
