//! Token scope grammar.
//!
//! A scope is a whitespace separated, case-insensitive list of tokens such as
//! `"read metrics"`, `"cluster vision"` or `"* settings:false"`. A token may
//! carry a value after a colon; `false` disables the name even when the `*`
//! wildcard is present. A scope only ever narrows what a role allows.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::{Permission, Resource, GRANT_SCOPE_READ, GRANT_SCOPE_WRITE};

pub const SCOPE_ANY: &str = "*";
pub const SCOPE_READ: &str = "read";
pub const SCOPE_WRITE: &str = "write";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeValue {
    True,
    False,
    Other(String),
}

impl ScopeValue {
    fn parse(value: &str) -> Self {
        match value {
            "" | "true" | "*" => ScopeValue::True,
            "false" => ScopeValue::False,
            other => ScopeValue::Other(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ScopeValue::False => 2,
            ScopeValue::True => 1,
            ScopeValue::Other(_) => 0,
        }
    }
}

/// Parsed, deduplicated scope tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeAttribute {
    entries: BTreeMap<String, ScopeValue>,
}

impl ScopeAttribute {
    pub fn parse(scope: &str) -> Self {
        let mut attr = ScopeAttribute::default();

        for token in scope.split_whitespace() {
            let token = token.to_lowercase();
            let (name, value) = match token.split_once(':') {
                Some((name, value)) => (name, ScopeValue::parse(value)),
                None => (token.as_str(), ScopeValue::True),
            };

            if name.is_empty() {
                continue;
            }

            // Duplicates collapse; an explicit false is sticky.
            match attr.entries.get_mut(name) {
                Some(existing) if existing.rank() >= value.rank() => {}
                Some(existing) => *existing = value,
                None => {
                    attr.entries.insert(name.to_string(), value);
                }
            }
        }

        attr
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn value(&self, name: &str) -> Option<&ScopeValue> {
        self.entries.get(name)
    }

    /// Whether `name` is enabled, explicitly or through the `*` wildcard.
    pub fn contains(&self, name: &str) -> bool {
        match self.entries.get(name) {
            Some(value) => *value == ScopeValue::True,
            None => self.entries.get(SCOPE_ANY) == Some(&ScopeValue::True),
        }
    }

    /// Whether `name` is enabled by its own token, ignoring the wildcard.
    pub fn has_explicit(&self, name: &str) -> bool {
        self.entries.get(name) == Some(&ScopeValue::True)
    }

    /// True if every token in `required` is enabled by its own token.
    pub fn is_superset_of(&self, required: &[&str]) -> bool {
        required.iter().all(|name| self.has_explicit(name))
    }

    fn is_only(&self, name: &str) -> bool {
        self.entries.len() == 1 && self.has_explicit(name)
    }
}

impl FromStr for ScopeAttribute {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ScopeAttribute::parse(s))
    }
}

impl fmt::Display for ScopeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.entries {
            if !first {
                f.write_str(" ")?;
            }
            first = false;

            match value {
                ScopeValue::True => write!(f, "{name}")?,
                ScopeValue::False => write!(f, "{name}:false")?,
                ScopeValue::Other(v) => write!(f, "{name}:{v}")?,
            }
        }
        Ok(())
    }
}

/// Normalize a scope string into its canonical, sorted form.
pub fn clean_scope(scope: &str) -> String {
    ScopeAttribute::parse(scope).to_string()
}

/// Check whether `scope` permits `perms` on `resource`.
pub fn scope_permits(scope: &str, resource: Resource, perms: &[Permission]) -> bool {
    let attr = ScopeAttribute::parse(scope);

    if attr.is_empty() {
        return false;
    }

    if attr.is_only(SCOPE_ANY) {
        return true;
    }

    if attr.is_only(SCOPE_READ) {
        return GRANT_SCOPE_READ.allow_all(perms);
    }

    if !attr.contains(resource.as_str()) {
        return false;
    }

    match (attr.has_explicit(SCOPE_READ), attr.has_explicit(SCOPE_WRITE)) {
        (false, false) => true,
        (true, false) => GRANT_SCOPE_READ.allow_all(perms),
        (false, true) => GRANT_SCOPE_WRITE.allow_all(perms),
        (true, true) => GRANT_SCOPE_READ.union(&GRANT_SCOPE_WRITE).allow_all(perms),
    }
}
