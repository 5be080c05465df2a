use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::{normalize_name, AclError, Grant, Permission};

/// A principal class used to select a grant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Default,
    Admin,
    User,
    Viewer,
    Guest,
    Visitor,
    Client,
    Instance,
    Service,
    Portal,
    #[default]
    None,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Default,
        Role::Admin,
        Role::User,
        Role::Viewer,
        Role::Guest,
        Role::Visitor,
        Role::Client,
        Role::Instance,
        Role::Service,
        Role::Portal,
        Role::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Default => "default",
            Role::Admin => "admin",
            Role::User => "user",
            Role::Viewer => "viewer",
            Role::Guest => "guest",
            Role::Visitor => "visitor",
            Role::Client => "client",
            Role::Instance => "instance",
            Role::Service => "service",
            Role::Portal => "portal",
            Role::None => "none",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        if name.is_empty() {
            return Ok(Role::None);
        }

        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| AclError::UnknownRole(s.to_string()))
    }
}

/// Role to grant mapping for one resource.
///
/// A role without its own entry uses the [`Role::Default`] entry. An explicit
/// entry always replaces the default; the two are never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleTable {
    grants: HashMap<Role, Grant>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, grant: Grant) -> Self {
        self.grants.insert(role, grant);
        self
    }

    pub fn insert(&mut self, role: Role, grant: Grant) {
        self.grants.insert(role, grant);
    }

    /// The grant that applies to `role`, after default fallback.
    pub fn grant(&self, role: Role) -> Option<&Grant> {
        self.grants
            .get(&role)
            .or_else(|| self.grants.get(&Role::Default))
    }

    pub fn allow(&self, role: Role, perm: Permission) -> bool {
        self.grant(role).is_some_and(|g| g.allow(perm))
    }

    /// True unless at least one of `perms` is allowed for `role`.
    pub fn deny_all(&self, role: Role, perms: &[Permission]) -> bool {
        match self.grant(role) {
            Some(grant) => !grant.allow_any(perms),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{GRANT_FULL_ACCESS, GRANT_NONE, GRANT_VIEW_OWN};

    #[test]
    fn test_role_parse() {
        assert_eq!("".parse::<Role>().unwrap(), Role::None);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_missing_role_uses_default() {
        let table = RoleTable::new()
            .with(Role::Admin, GRANT_FULL_ACCESS)
            .with(Role::Default, GRANT_VIEW_OWN);

        assert!(table.allow(Role::Guest, Permission::View));
        assert!(!table.allow(Role::Guest, Permission::Delete));
        assert!(table.allow(Role::Admin, Permission::Delete));
    }

    #[test]
    fn test_explicit_role_never_merges_with_default() {
        let table = RoleTable::new()
            .with(Role::Visitor, GRANT_NONE)
            .with(Role::Default, GRANT_FULL_ACCESS);

        for perm in Permission::ALL {
            assert!(!table.allow(Role::Visitor, perm), "{perm} leaked from default");
        }
        assert!(table.allow(Role::Client, Permission::Upload));
    }

    #[test]
    fn test_no_default_denies() {
        let table = RoleTable::new().with(Role::Admin, GRANT_FULL_ACCESS);
        assert!(!table.allow(Role::User, Permission::View));
        assert!(table.deny_all(Role::User, &[Permission::View]));
    }

    #[test]
    fn test_deny_all_uses_any_semantics() {
        let table = RoleTable::new().with(Role::Guest, GRANT_VIEW_OWN);
        assert!(!table.deny_all(Role::Guest, &[Permission::Delete, Permission::View]));
        assert!(table.deny_all(Role::Guest, &[Permission::Delete, Permission::Upload]));
        assert!(table.deny_all(Role::Guest, &[]));
    }
}
