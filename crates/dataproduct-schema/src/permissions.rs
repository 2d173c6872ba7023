//! Role-based permissions document (`permissions.json`) and request identity.
//!
//! Roles grant identifier lists per resource domain. The `public` role applies
//! to everyone; a named user also receives the roles assigned to the user and
//! to each of the user's groups.

use crate::types::DataproductId;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

pub const PERMISSIONS_FILE_NAME: &str = "permissions.json";
pub const DATAPRODUCTS_DOMAIN: &str = "dataproducts";
pub const PUBLIC_ROLE: &str = "public";

/// Who is asking. Resolved by the transport layer before the core runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    user: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PermissionsDocument {
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleEntry {
    pub role: String,
    /// Resource domain -> granted identifiers.
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl PermissionsDocument {
    /// Roles that apply to `identity`, always including [`PUBLIC_ROLE`].
    pub fn roles_for(&self, identity: &Identity) -> BTreeSet<&str> {
        let mut roles = BTreeSet::from([PUBLIC_ROLE]);
        let Some(username) = identity.username() else {
            return roles;
        };
        for user in self.users.iter().filter(|u| u.name == username) {
            roles.extend(user.roles.iter().map(String::as_str));
            for group in self
                .groups
                .iter()
                .filter(|g| user.groups.contains(&g.name))
            {
                roles.extend(group.roles.iter().map(String::as_str));
            }
        }
        roles
    }

    /// Union of the identifiers granted in `domain` by every applicable role.
    pub fn permitted(&self, domain: &str, identity: &Identity) -> HashSet<DataproductId> {
        let roles = self.roles_for(identity);
        self.roles
            .iter()
            .filter(|entry| roles.contains(entry.role.as_str()))
            .filter_map(|entry| entry.permissions.get(domain))
            .flatten()
            .map(|id| DataproductId::from(id.as_str()))
            .collect()
    }
}

pub fn parse_permissions_str(input: &str) -> Result<PermissionsDocument, SchemaError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_permissions_file(path: impl AsRef<Path>) -> Result<PermissionsDocument, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_permissions_str(&content)
}
