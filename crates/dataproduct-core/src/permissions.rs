//! Permission decisions consumed by the tree builders.

use dataproduct_schema::{DataproductId, Identity, PermissionsDocument};
use std::collections::HashSet;

/// Source of permission decisions. The tree builders only consume the
/// resulting set; they never decide permissions themselves.
pub trait PermissionOracle: Send + Sync {
    /// Identifiers of `domain` that `identity` may see.
    fn permitted_set(&self, domain: &str, identity: &Identity) -> HashSet<DataproductId>;
}

impl PermissionOracle for PermissionsDocument {
    fn permitted_set(&self, domain: &str, identity: &Identity) -> HashSet<DataproductId> {
        self.permitted(domain, identity)
    }
}

/// A fixed grant, identical for every identity and domain.
impl PermissionOracle for HashSet<DataproductId> {
    fn permitted_set(&self, _domain: &str, _identity: &Identity) -> HashSet<DataproductId> {
        self.clone()
    }
}
