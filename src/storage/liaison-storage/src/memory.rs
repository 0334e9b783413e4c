//! In-memory directory store.
//!
//! Suitable for development and tests. Data is lost on restart.
//!
//! A unit of work holds the store lock for its whole lifetime and operates on
//! a working copy of the state; commit swaps the copy in, drop throws it
//! away. Units of work are therefore fully serialized.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::backend::{DirectoryStore, UnitOfWork};
use crate::error::StorageError;
use crate::model::{GroupId, LocalGroup, LocalUser, UserId};

#[derive(Debug, Clone)]
struct StoredUser {
    principal: String,
    group_ids: BTreeSet<GroupId>,
    remember_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    next_user_id: UserId,
    next_group_id: GroupId,
    users: HashMap<UserId, StoredUser>,
    groups: HashMap<GroupId, LocalGroup>,
}

impl State {
    fn materialize(&self, id: UserId, stored: &StoredUser) -> LocalUser {
        let groups = stored
            .group_ids
            .iter()
            .filter_map(|gid| self.groups.get(gid).cloned())
            .collect();

        LocalUser {
            id,
            principal: stored.principal.clone(),
            groups,
            remember_token: stored.remember_token.clone(),
        }
    }
}

/// In-memory directory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group. The name is stored lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the group exists and
    /// [`StorageError::InvalidInput`] for a blank name.
    pub async fn create_group(&self, name: &str) -> Result<LocalGroup, StorageError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("group name cannot be empty".into()));
        }

        let mut state = self.state.lock().await;
        if state.groups.values().any(|g| g.name == name) {
            return Err(StorageError::AlreadyExists(name));
        }

        state.next_group_id += 1;
        let group = LocalGroup {
            id: state.next_group_id,
            name,
        };
        state.groups.insert(group.id, group.clone());

        info!(group = %group.name, "Group created");
        Ok(group)
    }

    /// Deletes a group by canonical name. Returns whether it existed.
    pub async fn delete_group(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let mut state = self.state.lock().await;

        let Some(id) = state
            .groups
            .values()
            .find(|g| g.name == name)
            .map(|g| g.id)
        else {
            return false;
        };

        state.groups.remove(&id);
        for user in state.users.values_mut() {
            user.group_ids.remove(&id);
        }

        info!(group = %name, "Group deleted");
        true
    }

    /// Returns a committed user by principal.
    pub async fn user(&self, principal: &str) -> Option<LocalUser> {
        let state = self.state.lock().await;
        state
            .users
            .iter()
            .find(|(_, u)| u.principal == principal)
            .map(|(id, u)| state.materialize(*id, u))
    }

    /// Returns every committed user, ordered by id.
    pub async fn users(&self) -> Vec<LocalUser> {
        let state = self.state.lock().await;
        let mut users: Vec<LocalUser> = state
            .users
            .iter()
            .map(|(id, u)| state.materialize(*id, u))
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Unit of work over a [`MemoryStore`].
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user(&mut self, id: UserId) -> Result<Option<LocalUser>, StorageError> {
        Ok(self
            .working
            .users
            .get(&id)
            .map(|u| self.working.materialize(id, u)))
    }

    async fn find_user_by_principal(
        &mut self,
        principal: &str,
    ) -> Result<Option<LocalUser>, StorageError> {
        Ok(self
            .working
            .users
            .iter()
            .find(|(_, u)| u.principal == principal)
            .map(|(id, u)| self.working.materialize(*id, u)))
    }

    async fn insert_user(&mut self, principal: &str) -> Result<LocalUser, StorageError> {
        if principal.is_empty() {
            return Err(StorageError::InvalidInput("principal cannot be empty".into()));
        }
        if self.working.users.values().any(|u| u.principal == principal) {
            return Err(StorageError::AlreadyExists(principal.to_string()));
        }

        self.working.next_user_id += 1;
        let id = self.working.next_user_id;
        self.working.users.insert(
            id,
            StoredUser {
                principal: principal.to_string(),
                group_ids: BTreeSet::new(),
                remember_token: None,
            },
        );

        debug!(principal = %principal, id = id, "User staged for insert");
        Ok(LocalUser::new(id, principal))
    }

    async fn find_group_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<LocalGroup>, StorageError> {
        Ok(self
            .working
            .groups
            .values()
            .find(|g| g.name == name)
            .cloned())
    }

    async fn save_user(&mut self, user: &LocalUser) -> Result<(), StorageError> {
        let group_ids: BTreeSet<GroupId> = user
            .groups
            .iter()
            .map(|g| g.id)
            .filter(|id| self.working.groups.contains_key(id))
            .collect();

        let stored = self
            .working
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user.id)))?;

        stored.group_ids = group_ids;
        stored.remember_token = user.remember_token.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
