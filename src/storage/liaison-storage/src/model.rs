//! Local user and group records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of a local user.
pub type UserId = i64;

/// Identifier of a local group.
pub type GroupId = i64;

/// A local group. `name` is the canonical lower-case key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalGroup {
    /// Group identifier.
    pub id: GroupId,
    /// Canonical name.
    pub name: String,
}

/// A local user and its group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// User identifier.
    pub id: UserId,
    /// Principal name the user was resolved from.
    pub principal: String,
    /// Current group memberships.
    pub groups: BTreeSet<LocalGroup>,
    /// SHA-256 digest of the persistent login token, if one was issued.
    #[serde(skip_serializing, default)]
    pub remember_token: Option<String>,
}

impl LocalUser {
    /// Creates a user record with no memberships.
    pub fn new(id: UserId, principal: impl Into<String>) -> Self {
        Self {
            id,
            principal: principal.into(),
            groups: BTreeSet::new(),
            remember_token: None,
        }
    }

    /// Returns the canonical names of the user's groups, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Checks membership by canonical group name.
    pub fn is_member_of(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }
}
