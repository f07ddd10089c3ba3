//! Engine Contract Types
//!
//! Keys, options, results and the observer traits that connect the bridge to
//! an external query engine.

mod key;
mod observer;
mod options;
mod result;

pub use key::QueryKey;
pub use observer::{Listener, NotifyOptions, QueryClient, QueryHandle, QueryObserver, Unsubscribe};
pub use options::{
    EffectiveOptions, ErrorBoundaryPolicy, NotifyOnChangeProps, QueryFn, QueryOptions, Retry,
    Select, DEFAULT_CACHE_TIME, DEFAULT_RETRY, MAX_RETRY_DELAY,
};
pub use result::{
    FetchStatus, QueryControls, QueryObserverResult, QueryStatus, RefetchOptions, ResultField,
};
