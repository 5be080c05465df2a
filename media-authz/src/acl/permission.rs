use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{normalize_name, AclError};

/// An action or access level that a grant can allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[serde(rename = "*")]
    Any,
    FullAccess,
    AccessAll,
    AccessOwn,
    AccessShared,
    AccessLibrary,
    AccessPrivate,
    View,
    Create,
    Update,
    Delete,
    Search,
    Download,
    Upload,
    Share,
    Rate,
    React,
    Manage,
    ManageOwn,
    Subscribe,
}

impl Permission {
    pub const ALL: [Permission; 20] = [
        Permission::Any,
        Permission::FullAccess,
        Permission::AccessAll,
        Permission::AccessOwn,
        Permission::AccessShared,
        Permission::AccessLibrary,
        Permission::AccessPrivate,
        Permission::View,
        Permission::Create,
        Permission::Update,
        Permission::Delete,
        Permission::Search,
        Permission::Download,
        Permission::Upload,
        Permission::Share,
        Permission::Rate,
        Permission::React,
        Permission::Manage,
        Permission::ManageOwn,
        Permission::Subscribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Any => "*",
            Permission::FullAccess => "full_access",
            Permission::AccessAll => "access_all",
            Permission::AccessOwn => "access_own",
            Permission::AccessShared => "access_shared",
            Permission::AccessLibrary => "access_library",
            Permission::AccessPrivate => "access_private",
            Permission::View => "view",
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Search => "search",
            Permission::Download => "download",
            Permission::Upload => "upload",
            Permission::Share => "share",
            Permission::Rate => "rate",
            Permission::React => "react",
            Permission::Manage => "manage",
            Permission::ManageOwn => "manage_own",
            Permission::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| AclError::UnknownPermission(s.to_string()))
    }
}

/// Render a permission list for logs, e.g. `view or download`.
pub fn permissions_string(perms: &[Permission]) -> String {
    if perms.is_empty() {
        return "none".to_string();
    }

    perms
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}
