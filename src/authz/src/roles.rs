//! Role to access-mask table

use std::collections::HashMap;

use tracing::debug;

use crate::error::{AuthzError, Result};

/// Sentinel mask for roles absent from the table.
///
/// Means "unknown role, no permission" and must never be interpreted as a
/// usable bitmask.
pub const UNKNOWN_ROLE_MASK: i64 = -1;

/// Immutable mapping from role name to permission bitmask.
///
/// Built once at startup from an ordered list of `(role, mask)` pairs and
/// never mutated afterwards, so it is shared across tasks without
/// synchronization.
#[derive(Debug)]
pub struct RoleAccessTable {
    masks: HashMap<String, i64>,
}

impl RoleAccessTable {
    /// Builds the table from an ordered pair list.
    ///
    /// Fails on a duplicate role name, and on exceeding `capacity` when a
    /// limit is configured. Both are configuration errors; a partially
    /// built table is never returned.
    pub fn build(pairs: Vec<(String, i64)>, capacity: Option<usize>) -> Result<Self> {
        if let Some(limit) = capacity {
            if pairs.len() > limit {
                return Err(AuthzError::RoleCapacity {
                    limit,
                    requested: pairs.len(),
                });
            }
        }

        let mut masks = HashMap::with_capacity(pairs.len());
        for (role, mask) in pairs {
            debug!(role = %role, mask, "role table entry");
            if masks.insert(role.clone(), mask).is_some() {
                return Err(AuthzError::DuplicateRole(role));
            }
        }

        Ok(Self { masks })
    }

    /// Access mask for `role`, by exact-string lookup.
    ///
    /// Returns [`UNKNOWN_ROLE_MASK`] when the role is absent.
    pub fn mask_for(&self, role: &str) -> i64 {
        self.masks.get(role).copied().unwrap_or(UNKNOWN_ROLE_MASK)
    }

    /// Number of configured roles
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Whether the table holds no roles
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}
