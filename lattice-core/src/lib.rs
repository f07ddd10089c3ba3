//! Lattice Core
//!
//! This crate provides the fine-grained reactive runtime that Lattice's query
//! bridge is built on. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - A batching scheduler with derived, computed and effect phases
//! - Per-field tracked stores with atomic replacement
//! - Async resources and suspense boundaries
//! - Lifecycle scopes with mount and cleanup hooks
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_core::reactive::{Signal, Memo, Effect};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Memo::new(|| count.get() * 2);
//!
//! // Create an effect
//! Effect::new(|| {
//!     println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod reactive;
