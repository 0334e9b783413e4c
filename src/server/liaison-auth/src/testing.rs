//! Test doubles shared by the unit tests.

#![allow(clippy::disallowed_methods)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use liaison_storage::{
    DirectoryStore, LocalGroup, LocalUser, MemoryStore, StorageError, UnitOfWork, UserId,
};

use crate::identity::RequestContext;
use crate::reporter::{FailureRecord, FailureReporter};
use crate::validator::{CredentialValidator, TrustedPrincipalValidator};
use crate::{AuthError, LogoutHook};

/// Creates a store with the given groups and one user without memberships.
pub async fn seeded_store(groups: &[&str], principal: &str) -> (MemoryStore, LocalUser) {
    let store = MemoryStore::new();
    for name in groups {
        store.create_group(name).await.unwrap();
    }

    let mut uow = store.begin().await.unwrap();
    let user = uow.insert_user(principal).await.unwrap();
    uow.commit().await.unwrap();

    (store, user)
}

/// Wraps a [`MemoryStore`] and injects failures.
#[derive(Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_group: Option<String>,
    fail_commit: bool,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_group: None,
            fail_commit: false,
        }
    }

    /// Fails any lookup of the named group.
    pub fn fail_on_group(mut self, name: &str) -> Self {
        self.fail_group = Some(name.to_string());
        self
    }

    /// Fails every commit.
    pub fn fail_on_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }
}

#[async_trait]
impl DirectoryStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            fail_group: self.fail_group.clone(),
            fail_commit: self.fail_commit,
        }))
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    fail_group: Option<String>,
    fail_commit: bool,
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn find_user(&mut self, id: UserId) -> Result<Option<LocalUser>, StorageError> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_principal(
        &mut self,
        principal: &str,
    ) -> Result<Option<LocalUser>, StorageError> {
        self.inner.find_user_by_principal(principal).await
    }

    async fn insert_user(&mut self, principal: &str) -> Result<LocalUser, StorageError> {
        self.inner.insert_user(principal).await
    }

    async fn find_group_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<LocalGroup>, StorageError> {
        if self.fail_group.as_deref() == Some(name) {
            return Err(StorageError::QueryFailed(format!("injected failure on {name}")));
        }
        self.inner.find_group_by_name(name).await
    }

    async fn save_user(&mut self, user: &LocalUser) -> Result<(), StorageError> {
        self.inner.save_user(user).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(StorageError::Transaction("injected commit failure".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.rollback().await
    }
}

/// Collects failure records.
#[derive(Default)]
pub struct RecordingReporter {
    records: Mutex<Vec<FailureRecord>>,
}

impl RecordingReporter {
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, record: &FailureRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Rejects a fixed set of principals, delegating everything else.
pub struct RejectList {
    inner: TrustedPrincipalValidator,
    rejected: Vec<String>,
}

impl RejectList {
    pub fn new(store: Arc<dyn DirectoryStore>, rejected: &[&str]) -> Self {
        Self::wrap(TrustedPrincipalValidator::new(store), rejected)
    }

    pub fn wrap(inner: TrustedPrincipalValidator, rejected: &[&str]) -> Self {
        Self {
            inner,
            rejected: rejected.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn is_rejected(&self, principal: &str) -> bool {
        self.rejected.iter().any(|r| r == principal)
    }
}

#[async_trait]
impl CredentialValidator for RejectList {
    async fn authenticate(
        &self,
        principal: Option<&str>,
        credential: Option<&str>,
        context: &RequestContext,
    ) -> Result<LocalUser, AuthError> {
        if principal.is_some_and(|p| self.is_rejected(p)) {
            return Err(AuthError::InvalidCredentials);
        }
        let user = self.inner.authenticate(principal, credential, context).await?;
        if self.is_rejected(&user.principal) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    fn name(&self) -> &'static str {
        "reject-list"
    }
}

/// Logout hook that always fails.
pub struct FailingHook;

#[async_trait]
impl LogoutHook for FailingHook {
    async fn before_logout(&self, _user_id: UserId) -> Result<(), AuthError> {
        Err(AuthError::Hook("session store unavailable".into()))
    }
}

/// Logout hook that records the users it saw.
#[derive(Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<UserId>>,
}

impl RecordingHook {
    pub fn calls(&self) -> Vec<UserId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogoutHook for RecordingHook {
    async fn before_logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.calls.lock().unwrap().push(user_id);
        Ok(())
    }
}
