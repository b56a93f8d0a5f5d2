//! Tracing and logging (shared setup).

/// Initialize process-wide observability (tracing/logging).
///
/// The entry point for a process hosting the engine. This is safe to call
/// multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Route logs through the test harness (see [`tracing::init_test`]).
pub fn init_test() {
    tracing::init_test();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;
