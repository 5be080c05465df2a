//! Static permission model: resources, roles, grants and the access control
//! list that ties them together.

mod grant;
mod permission;
mod resource;
mod role;
mod rules;
pub mod scope;

use std::collections::HashMap;
use thiserror::Error;

pub use grant::*;
pub use permission::{permissions_string, Permission};
pub use resource::Resource;
pub use role::{Role, RoleTable};
pub use rules::default_rules;
pub use scope::{clean_scope, scope_permits, ScopeAttribute};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown permission '{0}'")]
    UnknownPermission(String),
}

pub(crate) fn normalize_name(s: &str) -> String {
    s.trim().to_lowercase().replace('-', "_")
}

/// Resource to role table mapping; immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acl {
    tables: HashMap<Resource, RoleTable>,
}

/// ACL overrides as read from configuration: resource name to role name to
/// allowed permission names.
pub type AclOverrides = HashMap<String, HashMap<String, Vec<String>>>;

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: Resource, table: RoleTable) -> Self {
        self.tables.insert(resource, table);
        self
    }

    /// Apply configured overrides on top of this list. Each configured role
    /// replaces that role's grant for the resource. Unknown names fail.
    pub fn with_overrides(mut self, overrides: &AclOverrides) -> Result<Self, AclError> {
        for (resource_name, roles) in overrides {
            let resource: Resource = resource_name.parse()?;
            let table = self.tables.entry(resource).or_default();

            for (role_name, perm_names) in roles {
                let role: Role = role_name.parse()?;
                let perms = perm_names
                    .iter()
                    .map(|p| p.parse::<Permission>())
                    .collect::<Result<Vec<_>, _>>()?;
                table.insert(role, Grant::from_permissions(perms));
            }
        }

        Ok(self)
    }

    /// The table for `resource`, or the default resource's table.
    pub fn table(&self, resource: Resource) -> Option<&RoleTable> {
        self.tables
            .get(&resource)
            .or_else(|| self.tables.get(&Resource::Default))
    }

    pub fn allow(&self, resource: Resource, role: Role, perm: Permission) -> bool {
        self.table(resource).is_some_and(|t| t.allow(role, perm))
    }

    pub fn deny(&self, resource: Resource, role: Role, perm: Permission) -> bool {
        !self.allow(resource, role, perm)
    }

    pub fn allow_any(&self, resource: Resource, role: Role, perms: &[Permission]) -> bool {
        perms.iter().any(|p| self.allow(resource, role, *p))
    }

    pub fn allow_all(&self, resource: Resource, role: Role, perms: &[Permission]) -> bool {
        !perms.is_empty() && perms.iter().all(|p| self.allow(resource, role, *p))
    }

    /// True unless at least one of `perms` is allowed.
    pub fn deny_all(&self, resource: Resource, role: Role, perms: &[Permission]) -> bool {
        match self.table(resource) {
            Some(table) => table.deny_all(role, perms),
            None => true,
        }
    }

    pub fn resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.tables.keys().copied().collect();
        resources.sort();
        resources
    }
}
