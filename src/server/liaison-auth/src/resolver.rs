//! Mapping of external group identifiers onto local groups.

use tracing::debug;

use liaison_storage::{LocalGroup, StorageError, UnitOfWork};

/// Resolves external group identifiers to existing local groups.
///
/// Lookups use the lower-cased identifier. For an LDAP distinguished name
/// whose first RDN is a common name, the lower-cased common name is tried
/// next, so `CN=Admins,DC=corp` finds the local group `admins`.
/// Groups are never created here.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupNameResolver;

impl GroupNameResolver {
    /// Returns the lookup keys for an external identifier, most specific first.
    pub fn candidate_keys(external_id: &str) -> Vec<String> {
        let full = external_id.trim().to_lowercase();
        if full.is_empty() {
            return Vec::new();
        }

        let mut keys = vec![full.clone()];
        if let Some(cn) = common_name(&full) {
            if cn != full {
                keys.push(cn);
            }
        }
        keys
    }

    /// Looks up the local group for an external identifier.
    ///
    /// Returns `Ok(None)` when nothing matches.
    pub async fn resolve(
        &self,
        uow: &mut dyn UnitOfWork,
        external_id: &str,
    ) -> Result<Option<LocalGroup>, StorageError> {
        for key in Self::candidate_keys(external_id) {
            if let Some(group) = uow.find_group_by_name(&key).await? {
                return Ok(Some(group));
            }
        }

        debug!(group = %external_id, "No local group for external identifier");
        Ok(None)
    }
}

/// Extracts the value of a leading `cn=` RDN, honouring `\,` escapes.
fn common_name(dn: &str) -> Option<String> {
    let rest = dn.strip_prefix("cn=")?;

    let mut value = String::with_capacity(rest.len());
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            },
            ',' => break,
            _ => value.push(c),
        }
    }

    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}
