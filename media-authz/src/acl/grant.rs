use std::borrow::Cow;

use super::Permission;
use Permission::*;

/// A set of permissions mapped to allow/deny.
///
/// `FullAccess` acts as the fallback for permissions without an entry of their
/// own. Standard grants are `const` and never change at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    entries: Cow<'static, [(Permission, bool)]>,
}

impl Grant {
    pub const fn new(entries: &'static [(Permission, bool)]) -> Self {
        Self {
            entries: Cow::Borrowed(entries),
        }
    }

    /// Build an owned grant allowing exactly `perms`.
    pub fn from_permissions(perms: impl IntoIterator<Item = Permission>) -> Self {
        let mut entries: Vec<(Permission, bool)> = Vec::new();
        for perm in perms {
            if !entries.iter().any(|(p, _)| *p == perm) {
                entries.push((perm, true));
            }
        }
        Self {
            entries: Cow::Owned(entries),
        }
    }

    fn entry(&self, perm: Permission) -> Option<bool> {
        self.entries
            .iter()
            .find(|(p, _)| *p == perm)
            .map(|(_, allowed)| *allowed)
    }

    /// Exact entry first, then the `FullAccess` entry, else deny.
    pub fn allow(&self, perm: Permission) -> bool {
        self.entry(perm)
            .or_else(|| self.entry(FullAccess))
            .unwrap_or(false)
    }

    /// True if any of `perms` is not allowed.
    pub fn deny_any(&self, perms: &[Permission]) -> bool {
        perms.iter().any(|p| !self.allow(*p))
    }

    pub fn allow_any(&self, perms: &[Permission]) -> bool {
        perms.iter().any(|p| self.allow(*p))
    }

    pub fn allow_all(&self, perms: &[Permission]) -> bool {
        !self.deny_any(perms)
    }

    /// Entries of both grants; a deny in either side wins for shared keys.
    pub fn union(&self, other: &Grant) -> Grant {
        let mut entries: Vec<(Permission, bool)> = self.entries.to_vec();
        for (perm, allowed) in other.entries.iter() {
            match entries.iter_mut().find(|(p, _)| p == perm) {
                Some(entry) => entry.1 = entry.1 && *allowed,
                None => entries.push((*perm, *allowed)),
            }
        }
        Grant {
            entries: Cow::Owned(entries),
        }
    }
}

pub const GRANT_FULL_ACCESS: Grant = Grant::new(&[
    (FullAccess, true),
    (AccessAll, true),
    (AccessLibrary, true),
    (View, true),
    (Create, true),
    (Update, true),
    (Delete, true),
    (Search, true),
    (Download, true),
    (Upload, true),
    (Share, true),
    (Rate, true),
    (React, true),
    (Manage, true),
    (Subscribe, true),
]);

pub const GRANT_MANAGE_OWN: Grant = Grant::new(&[
    (AccessOwn, true),
    (View, true),
    (Create, true),
    (Update, true),
    (Delete, true),
    (Subscribe, true),
]);

pub const GRANT_CONFIGURE_OWN: Grant = Grant::new(&[
    (AccessOwn, true),
    (View, true),
    (Update, true),
    (ManageOwn, true),
]);

pub const GRANT_UPDATE_OWN: Grant = Grant::new(&[(AccessOwn, true), (Update, true)]);

pub const GRANT_VIEW_OWN: Grant = Grant::new(&[(AccessOwn, true), (View, true)]);

pub const GRANT_VIEW_ALL: Grant = Grant::new(&[(AccessAll, true), (View, true)]);

pub const GRANT_VIEW_LIBRARY: Grant = Grant::new(&[
    (AccessLibrary, true),
    (View, true),
    (Search, true),
    (Download, true),
]);

pub const GRANT_SEARCH_SHARED: Grant = Grant::new(&[
    (AccessShared, true),
    (View, true),
    (Search, true),
    (Download, true),
]);

pub const GRANT_VIEW_SHARED: Grant =
    Grant::new(&[(AccessShared, true), (View, true), (Download, true)]);

pub const GRANT_REACT_SHARED: Grant =
    Grant::new(&[(AccessShared, true), (View, true), (React, true)]);

pub const GRANT_UPLOAD_SHARED: Grant =
    Grant::new(&[(AccessShared, true), (View, true), (Upload, true)]);

pub const GRANT_SUBSCRIBE_OWN: Grant = Grant::new(&[(AccessOwn, true), (Subscribe, true)]);

pub const GRANT_SUBSCRIBE_ALL: Grant = Grant::new(&[(AccessAll, true), (Subscribe, true)]);

/// Account administration without file uploads.
pub const GRANT_MANAGE_ACCOUNTS: Grant = Grant::new(&[
    (AccessAll, true),
    (AccessOwn, true),
    (View, true),
    (Create, true),
    (Update, true),
    (Delete, true),
    (Subscribe, true),
]);

pub const GRANT_NONE: Grant = Grant::new(&[]);

/// Permissions a `read` scope may exercise; never mutations.
pub const GRANT_SCOPE_READ: Grant = Grant::new(&[
    (AccessShared, true),
    (AccessLibrary, true),
    (AccessPrivate, true),
    (AccessOwn, true),
    (AccessAll, true),
    (View, true),
    (Search, true),
    (Download, true),
    (Subscribe, true),
]);

/// Permissions a `write` scope may exercise.
pub const GRANT_SCOPE_WRITE: Grant = Grant::new(&[
    (AccessShared, true),
    (AccessLibrary, true),
    (AccessPrivate, true),
    (AccessOwn, true),
    (AccessAll, true),
    (Create, true),
    (Update, true),
    (Delete, true),
    (Upload, true),
    (Share, true),
    (Rate, true),
    (React, true),
    (Manage, true),
    (ManageOwn, true),
]);
