//! Group membership synchronization.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use liaison_storage::{DirectoryStore, LocalGroup, LocalUser, UnitOfWork};

use crate::error::SyncError;
use crate::resolver::GroupNameResolver;

/// What a successful synchronization changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Canonical names of the groups the user now belongs to.
    pub groups: Vec<String>,
    /// Memberships that were added.
    pub added: Vec<String>,
    /// Memberships that were removed.
    pub removed: Vec<String>,
    /// External identifiers that matched no local group.
    pub dropped: Vec<String>,
}

/// Replaces a user's memberships with the groups asserted externally.
///
/// The external group list is authoritative: memberships it does not
/// mention are removed. Resolution, write and commit share one unit of
/// work; on any failure nothing is committed and the caller's user record
/// is left as it was.
#[derive(Clone)]
pub struct GroupSynchronizer {
    store: Arc<dyn DirectoryStore>,
    resolver: GroupNameResolver,
}

impl GroupSynchronizer {
    /// Creates a synchronizer over the given store.
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            resolver: GroupNameResolver,
        }
    }

    /// Synchronizes `user` with `external_group_ids`.
    ///
    /// On success `user.groups` holds the committed membership set.
    pub async fn sync(
        &self,
        user: &mut LocalUser,
        external_group_ids: &[String],
    ) -> Result<SyncReport, SyncError> {
        let mut uow = self.store.begin().await?;

        let result = self
            .replace_groups(uow.as_mut(), user, external_group_ids)
            .await;
        let (stored, report) = match result {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback) = uow.rollback().await {
                    warn!(error = %rollback, "Rollback after failed group sync also failed");
                }
                return Err(e);
            },
        };

        uow.commit().await?;
        user.groups = stored.groups;

        info!(
            principal = %user.principal,
            groups = ?report.groups,
            added = report.added.len(),
            removed = report.removed.len(),
            dropped = report.dropped.len(),
            "User groups synchronized"
        );

        Ok(report)
    }

    async fn replace_groups(
        &self,
        uow: &mut dyn UnitOfWork,
        user: &LocalUser,
        external_group_ids: &[String],
    ) -> Result<(LocalUser, SyncReport), SyncError> {
        let mut current = uow
            .find_user(user.id)
            .await?
            .ok_or(SyncError::UnknownUser(user.id))?;

        let mut resolved: BTreeSet<LocalGroup> = BTreeSet::new();
        let mut dropped = Vec::new();
        for external_id in external_group_ids {
            match self.resolver.resolve(uow, external_id).await? {
                Some(group) => {
                    resolved.insert(group);
                },
                None => dropped.push(external_id.clone()),
            }
        }

        let previous = std::mem::replace(&mut current.groups, resolved);
        uow.save_user(&current).await?;

        // Re-read so groups deleted since resolution are not reported.
        let stored = uow
            .find_user(user.id)
            .await?
            .ok_or(SyncError::UnknownUser(user.id))?;

        let report = SyncReport {
            groups: stored.groups.iter().map(|g| g.name.clone()).collect(),
            added: stored
                .groups
                .difference(&previous)
                .map(|g| g.name.clone())
                .collect(),
            removed: previous
                .difference(&stored.groups)
                .map(|g| g.name.clone())
                .collect(),
            dropped,
        };

        if !report.dropped.is_empty() {
            debug!(
                principal = %user.principal,
                dropped = ?report.dropped,
                "Dropped unmatched external groups"
            );
        }

        Ok((stored, report))
    }
}
