//! Persistent remember-me tokens.
//!
//! A token is 32 random bytes, URL-safe base64 encoded. Only its SHA-256
//! digest is stored on the user record, so a leaked database does not leak
//! usable tokens. Each user holds at most one token.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use liaison_storage::{DirectoryStore, LocalUser, UserId};

use crate::AuthError;

const TOKEN_BYTES: usize = 32;

/// Issues, verifies and revokes remember-me tokens.
#[derive(Clone)]
pub struct RememberMe {
    store: Arc<dyn DirectoryStore>,
}

impl RememberMe {
    /// Creates a token manager over the given store.
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Issues a fresh token for the user, replacing any previous one.
    ///
    /// The returned value is the only copy of the plain token.
    pub async fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        let token = generate_token();

        let mut uow = self.store.begin().await?;
        let mut user = uow
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;
        user.remember_token = Some(digest(&token));
        uow.save_user(&user).await?;
        uow.commit().await?;

        info!(principal = %user.principal, "Remember-me token issued");
        Ok(token)
    }

    /// Returns the user when `token` matches the stored digest.
    pub async fn verify(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<LocalUser>, AuthError> {
        let mut uow = self.store.begin().await?;
        let user = uow.find_user(user_id).await?;
        uow.rollback().await?;

        let expected = digest(token);
        Ok(user.filter(|u| u.remember_token.as_deref() == Some(expected.as_str())))
    }

    /// Revokes the user's token. Unknown users are ignored.
    pub async fn clear(&self, user_id: UserId) -> Result<(), AuthError> {
        let mut uow = self.store.begin().await?;
        let Some(mut user) = uow.find_user(user_id).await? else {
            uow.rollback().await?;
            return Ok(());
        };

        if user.remember_token.take().is_some() {
            uow.save_user(&user).await?;
            uow.commit().await?;
            debug!(principal = %user.principal, "Remember-me token cleared");
        } else {
            uow.rollback().await?;
        }
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::testing::seeded_store;

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), TOKEN_BYTES);
    }

    #[tokio::test]
    async fn test_issue_stores_digest_only() {
        let (store, alice) = seeded_store(&[], "alice").await;
        let remember = RememberMe::new(Arc::new(store.clone()));

        let token = remember.issue(alice.id).await.unwrap();

        let stored = store.user("alice").await.unwrap();
        let saved = stored.remember_token.unwrap();
        assert_ne!(saved, token);
        assert_eq!(saved, digest(&token));
    }

    #[tokio::test]
    async fn test_verify() {
        let (store, alice) = seeded_store(&[], "alice").await;
        let remember = RememberMe::new(Arc::new(store));

        let token = remember.issue(alice.id).await.unwrap();

        let user = remember.verify(alice.id, &token).await.unwrap();
        assert_eq!(user.map(|u| u.principal), Some("alice".to_string()));
        assert!(remember.verify(alice.id, "forged").await.unwrap().is_none());
        assert!(remember.verify(999, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_token() {
        let (store, alice) = seeded_store(&[], "alice").await;
        let remember = RememberMe::new(Arc::new(store));

        let first = remember.issue(alice.id).await.unwrap();
        let second = remember.issue(alice.id).await.unwrap();

        assert!(remember.verify(alice.id, &first).await.unwrap().is_none());
        assert!(remember.verify(alice.id, &second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, alice) = seeded_store(&[], "alice").await;
        let remember = RememberMe::new(Arc::new(store.clone()));

        let token = remember.issue(alice.id).await.unwrap();
        remember.clear(alice.id).await.unwrap();

        assert!(remember.verify(alice.id, &token).await.unwrap().is_none());
        assert!(store.user("alice").await.unwrap().remember_token.is_none());

        remember.clear(alice.id).await.unwrap();
        remember.clear(999).await.unwrap();
    }

    #[tokio::test]
    async fn test_issue_unknown_user() {
        let (store, _) = seeded_store(&[], "alice").await;
        let remember = RememberMe::new(Arc::new(store));

        let result = remember.issue(999).await;
        assert!(matches!(result, Err(AuthError::UnknownUser(_))));
    }
}
