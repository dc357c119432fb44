//! Tracing utilities for statement and transaction observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event for a statement handed to the executor.
///
/// ```ignore
/// quarry_trace_query!(statement.entity(), statement.kind());
/// ```
#[macro_export]
macro_rules! quarry_trace_query {
    ($entity:expr, $kind:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(entity = %$entity, kind = $kind, "quarry.statement");
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin, commit,
/// rollback, timeout).
///
/// ```ignore
/// quarry_trace_tx!("begin", "interactive");
/// quarry_trace_tx!("rollback", mode.as_str());
/// ```
#[macro_export]
macro_rules! quarry_trace_tx {
    ($event:literal, $mode:expr) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, mode = $mode, "quarry.transaction");
    };
}
