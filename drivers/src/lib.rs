//! Executors for quarry.
//!
//! The engine talks to stores only through the `Connection` / `Executor` /
//! `TransactionHandle` traits from `quarry-core`. This crate provides the
//! in-memory store used by the test suite and by embedders that need a
//! process-local store.

pub mod memory;

// Re-export commonly used items
pub use memory::{MemoryStore, MemoryTransaction};
