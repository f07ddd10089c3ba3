//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects,
//! tracked stores and async resources. These primitives form the foundation
//! of Lattice's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only wakes its own dependents when the
//! re-evaluated value differs.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems.
//!
//! ## Stores
//!
//! A Store holds a structured value that is replaced atomically but tracked
//! field by field, so a reader of one field ignores changes to the others.
//!
//! ## Resources and Suspense
//!
//! A Resource is an async value that is pending until resolved or rejected.
//! Pending reads are collected by the enclosing SuspenseBoundary.
//!
//! ## Scopes
//!
//! A Scope gives computations an activation/deactivation lifecycle with
//! `on_mount` and `on_cleanup` hooks.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod memo;
mod resource;
mod runtime;
mod scheduler;
mod scope;
mod signal;
mod store;
mod subscriber;
mod suspense;

pub use context::{untrack, ReactiveContext};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use resource::{Outcome, Resource, ResourceState};
pub use runtime::{Reactive, Runtime};
pub use scheduler::{batch, pending_updates, NodeKind, UpdateScheduler};
pub use scope::{on_cleanup, on_mount, Scope};
pub use signal::Signal;
pub use store::{Diff, Store};
pub use subscriber::SubscriberId;
pub use suspense::SuspenseBoundary;
