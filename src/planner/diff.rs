//! Diff engine for comparing desired vs observed access.
//!
//! Both sides are already expanded into tuples, so the diff is plain set
//! difference on exact `(service, plan, org)` equality.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::access::AccessTuple;

/// Engine for computing diffs between desired and observed tuples.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// Tuples to grant and to revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessDiff {
    /// Tuples wanted but not currently granted.
    pub to_create: BTreeSet<AccessTuple>,
    /// Tuples currently granted but not wanted.
    pub to_delete: BTreeSet<AccessTuple>,
}

impl DiffEngine {
    /// Computes the diff between observed and desired tuples.
    #[must_use]
    pub fn diff(observed: &BTreeSet<AccessTuple>, desired: &BTreeSet<AccessTuple>) -> AccessDiff {
        let to_delete: BTreeSet<AccessTuple> = observed.difference(desired).cloned().collect();
        let to_create: BTreeSet<AccessTuple> = desired.difference(observed).cloned().collect();

        debug!(
            "Diff: {} observed, {} desired, {} to create, {} to delete",
            observed.len(),
            desired.len(),
            to_create.len(),
            to_delete.len()
        );

        AccessDiff {
            to_create,
            to_delete,
        }
    }
}

impl AccessDiff {
    /// Returns true if nothing needs to be granted or revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}
