//! Optimistic concurrency primitives.

use serde::{Deserialize, Serialize};

/// Optimistic concurrency expectation for a versioned record (e.g. a lot).
///
/// Writers read a record together with its version, compute their change
/// against that state, and commit with `Exact(read_version)`. A store that
/// finds a different version rejects the commit instead of overwriting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The record must not exist yet.
    Absent,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Check against the actual version (`None` when the record does not exist).
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            _ => false,
        }
    }
}

impl core::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::Absent => f.write_str("absent"),
            ExpectedVersion::Exact(v) => write!(f, "v{v}"),
        }
    }
}
