//! # Liaison Storage - SQLite Backend
//!
//! SQLite implementation of the directory store.
//! Each realm gets its own database file.
//!
//! SQLite allows a single writer, so units of work are serialized within the
//! process by a write gate held for the lifetime of the transaction. This
//! keeps a long-lived read snapshot from being invalidated by a concurrent
//! writer halfway through a group synchronization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use liaison_storage::{
    DirectoryStore, GroupId, LocalGroup, LocalUser, StorageError, UnitOfWork, UserId,
};

/// SQL schema for the directory tables.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        principal      TEXT NOT NULL UNIQUE,
        remember_token TEXT,
        created_at     INTEGER NOT NULL,
        updated_at     INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_groups (
        user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, group_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_groups_group ON user_groups (group_id)",
];

/// SQLite directory store.
///
/// The database lives at `{base_path}/{realm}.db`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    gate: Arc<Mutex<()>>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates the database for a realm.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory where realm databases are stored
    /// * `realm` - Realm identifier (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Realm name is invalid
    /// - Directory cannot be created
    /// - Database connection or migration fails
    pub async fn open(base_path: impl AsRef<Path>, realm: &str) -> Result<Self, StorageError> {
        Self::validate_realm(realm)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{realm}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(realm = %realm, path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self {
            pool,
            gate: Arc::new(Mutex::new(())),
            db_path,
        };

        store.migrate().await?;

        info!(realm = %realm, "SQLite directory store ready");

        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Validates that a realm name is safe to use as a file name.
    ///
    /// Only allows: lowercase letters, digits, underscore, hyphen.
    fn validate_realm(realm: &str) -> Result<(), StorageError> {
        if realm.is_empty() {
            return Err(StorageError::InvalidInput("realm cannot be empty".into()));
        }

        if realm.len() > 64 {
            return Err(StorageError::InvalidInput("realm name too long".into()));
        }

        let valid = realm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "realm must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    /// Runs database migrations.
    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        debug!("Migrations complete");

        Ok(())
    }

    /// Returns the current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
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

        let _gate = self.gate.lock().await;

        let result = sqlx::query("INSERT INTO groups (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &name))?;

        info!(group = %name, "Group created");

        Ok(LocalGroup {
            id: result.last_insert_rowid(),
            name,
        })
    }

    /// Deletes a group by canonical name. Returns whether it existed.
    pub async fn delete_group(&self, name: &str) -> Result<bool, StorageError> {
        let name = name.to_lowercase();
        let _gate = self.gate.lock().await;

        let result = sqlx::query("DELETE FROM groups WHERE name = ?")
            .bind(&name)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(group = %name, "Group deleted");
        }

        Ok(deleted)
    }
}

#[async_trait]
impl DirectoryStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let gate = Arc::clone(&self.gate).lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(Box::new(SqliteUnitOfWork { tx, _gate: gate }))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

/// Unit of work backed by a SQLite transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl SqliteUnitOfWork {
    async fn load_groups(&mut self, user_id: UserId) -> Result<Vec<LocalGroup>, StorageError> {
        let rows: Vec<(GroupId, String)> = sqlx::query_as(
            r#"
            SELECT g.id, g.name
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| LocalGroup { id, name })
            .collect())
    }

    async fn hydrate(
        &mut self,
        row: Option<(UserId, String, Option<String>)>,
    ) -> Result<Option<LocalUser>, StorageError> {
        let Some((id, principal, remember_token)) = row else {
            return Ok(None);
        };

        let groups = self.load_groups(id).await?;
        Ok(Some(LocalUser {
            id,
            principal,
            groups: groups.into_iter().collect(),
            remember_token,
        }))
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn find_user(&mut self, id: UserId) -> Result<Option<LocalUser>, StorageError> {
        let row: Option<(UserId, String, Option<String>)> =
            sqlx::query_as("SELECT id, principal, remember_token FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        self.hydrate(row).await
    }

    async fn find_user_by_principal(
        &mut self,
        principal: &str,
    ) -> Result<Option<LocalUser>, StorageError> {
        let row: Option<(UserId, String, Option<String>)> =
            sqlx::query_as("SELECT id, principal, remember_token FROM users WHERE principal = ?")
                .bind(principal)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        self.hydrate(row).await
    }

    async fn insert_user(&mut self, principal: &str) -> Result<LocalUser, StorageError> {
        if principal.is_empty() {
            return Err(StorageError::InvalidInput("principal cannot be empty".into()));
        }

        let now = SqliteStore::now();
        let result =
            sqlx::query("INSERT INTO users (principal, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(principal)
                .bind(now)
                .bind(now)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_insert_error(e, principal))?;

        let id = result.last_insert_rowid();
        debug!(principal = %principal, id = id, "User inserted");

        Ok(LocalUser::new(id, principal))
    }

    async fn find_group_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<LocalGroup>, StorageError> {
        let row: Option<(GroupId, String)> =
            sqlx::query_as("SELECT id, name FROM groups WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(|(id, name)| LocalGroup { id, name }))
    }

    async fn save_user(&mut self, user: &LocalUser) -> Result<(), StorageError> {
        let updated =
            sqlx::query("UPDATE users SET remember_token = ?, updated_at = ? WHERE id = ?")
                .bind(user.remember_token.as_deref())
                .bind(SqliteStore::now())
                .bind(user.id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {}", user.id)));
        }

        sqlx::query("DELETE FROM user_groups WHERE user_id = ?")
            .bind(user.id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        // Selecting through `groups` turns a vanished group into a no-op.
        for group in &user.groups {
            sqlx::query("INSERT INTO user_groups (user_id, group_id) SELECT ?, id FROM groups WHERE id = ?")
                .bind(user.id)
                .bind(group.id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }
}

fn map_insert_error(e: sqlx::Error, key: &str) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::AlreadyExists(key.to_string()),
        _ => StorageError::QueryFailed(e.to_string()),
    }
}
