//! Optimistic concurrency
//!
//! Workflows, bindings and translation assignments share one contract:
//! the caller supplies the version it last observed, the write succeeds
//! only if that still matches, and the stored version advances by one.

use crate::error::{AdminError, AdminResult};

/// Entities that carry an optimistic-concurrency version
pub trait Versioned {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// Expected and stored version disagreed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMismatch {
    pub expected: u64,
    pub actual: u64,
}

/// Version the next write must carry, or the mismatch.
pub fn next_version(expected: u64, actual: u64) -> Result<u64, VersionMismatch> {
    if expected == actual {
        Ok(actual + 1)
    } else {
        Err(VersionMismatch { expected, actual })
    }
}

/// Check `expected` against `current` and stamp the bumped version on `next`.
pub fn apply_expected_version<T, F>(
    current: &T,
    next: &mut T,
    expected: u64,
    conflict: F,
) -> AdminResult<u64>
where
    T: Versioned,
    F: FnOnce(VersionMismatch) -> AdminError,
{
    let version = next_version(expected, current.version()).map_err(conflict)?;
    next.set_version(version);
    Ok(version)
}
