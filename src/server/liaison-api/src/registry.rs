//! In-process session registry.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use liaison_auth::{SecurityContext, Session};

const SESSION_ID_BYTES: usize = 24;

/// A session guarded for exclusive use by one request at a time.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions keyed by identifier.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the requested session, or a fresh unregistered one when it
    /// is unknown.
    ///
    /// Client supplied identifiers are never adopted for new sessions. A
    /// fresh session only becomes live once passed to [`Self::retain`].
    pub async fn open(&self, requested: Option<&str>) -> (String, SessionHandle) {
        if let Some(id) = requested {
            if let Some(handle) = self.get(id).await {
                return (id.to_string(), handle);
            }
            debug!(session = %id, "Unknown session requested, creating a new one");
        }

        let id = new_session_id();
        let handle = Arc::new(Mutex::new(Session::new(id.clone())));
        (id, handle)
    }

    /// Creates and registers a fresh session.
    pub async fn create(&self) -> (String, SessionHandle) {
        let (id, handle) = self.open(None).await;
        self.register(&id, &handle).await;
        (id, handle)
    }

    /// Keeps `session` live when it carries an identity or a security
    /// context, and drops it otherwise.
    ///
    /// Returns whether the session is live afterwards.
    pub async fn retain(&self, id: &str, handle: &SessionHandle, session: &Session) -> bool {
        if session.is_established() || session.security_context().is_some() {
            self.register(id, handle).await;
            true
        } else {
            if self.remove(id).await {
                debug!(session = %id, "Session holds no identity, dropped");
            }
            false
        }
    }

    async fn register(&self, id: &str, handle: &SessionHandle) {
        self.sessions
            .write()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::clone(handle));
    }

    /// Looks up a session.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drops a session. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Attaches a platform security context to a live session.
    ///
    /// Called by the host's single-sign-on layer. Returns `false` when the
    /// session does not exist.
    pub async fn attach_security_context(&self, id: &str, context: SecurityContext) -> bool {
        let Some(handle) = self.get(id).await else {
            return false;
        };
        handle.lock().await.attach_security_context(context);
        true
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether there are no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
