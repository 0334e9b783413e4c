//! Directory store traits.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{LocalGroup, LocalUser, UserId};

/// A store holding local users and groups.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Opens a new unit of work.
    ///
    /// Nothing written through the returned handle is visible to other
    /// units of work until [`UnitOfWork::commit`] succeeds. Dropping the
    /// handle without committing discards every write.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError>;

    /// Returns the name of this store for logging/debugging.
    fn name(&self) -> &'static str;
}

/// An atomic, all-or-nothing sequence of store operations.
///
/// Implementations provide at least read-committed isolation.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Looks a user up by id.
    async fn find_user(&mut self, id: UserId) -> Result<Option<LocalUser>, StorageError>;

    /// Looks a user up by principal name (exact match).
    async fn find_user_by_principal(
        &mut self,
        principal: &str,
    ) -> Result<Option<LocalUser>, StorageError>;

    /// Creates a user with no groups.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the principal is taken.
    async fn insert_user(&mut self, principal: &str) -> Result<LocalUser, StorageError>;

    /// Looks a group up by its canonical (lower-case) name.
    async fn find_group_by_name(&mut self, name: &str)
        -> Result<Option<LocalGroup>, StorageError>;

    /// Persists the user's remember token and replaces its memberships.
    ///
    /// Memberships pointing at groups that no longer exist are skipped.
    async fn save_user(&mut self, user: &LocalUser) -> Result<(), StorageError>;

    /// Makes every write of this unit of work visible.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discards every write of this unit of work.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
