//! Integration tests for the Liaison server.
//!
//! These tests start the server binary and drive it over HTTP.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "x-liaison-session";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub validator: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateRequest {
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub principal: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateResponse {
    pub session: String,
    pub outcome: String,
    pub user: Option<UserView>,
    pub reason: Option<String>,
    pub remember_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupsResponse {
    pub session: String,
    pub result: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub dropped: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SecurityGroup {
    pub fqn: String,
}

#[derive(Debug, Serialize)]
pub struct SecurityContext {
    pub identity: Option<String>,
    pub groups: Vec<SecurityGroup>,
}

impl SecurityContext {
    pub fn new(identity: &str, groups: &[&str]) -> Self {
        Self {
            identity: Some(identity.to_string()),
            groups: groups
                .iter()
                .map(|fqn| SecurityGroup {
                    fqn: fqn.to_string(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Test Server
// ============================================================================

/// A test server instance that manages its own data directory and process.
pub struct TestServer {
    process: Child,
    pub base_url: String,
    pub port: u16,
    _data_dir: Option<TempDir>,
}

impl TestServer {
    /// Start a server in development mode with the given extra arguments.
    pub async fn start(port: u16, args: &[&str]) -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let mut all_args = vec!["--dev"];
        all_args.extend_from_slice(args);

        let mut server = Self::start_in(port, data_dir.path(), &all_args).await?;
        server._data_dir = Some(data_dir);
        Ok(server)
    }

    /// Start a server on an existing data directory.
    pub async fn start_in(port: u16, data_dir: &Path, args: &[&str]) -> Result<Self> {
        let server_binary = find_server_binary()?;

        let process = Command::new(&server_binary)
            .arg("--data-dir")
            .arg(data_dir)
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start server: {:?}", server_binary))?;

        let server = Self {
            process,
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            _data_dir: None,
        };

        server.wait_for_ready().await?;

        Ok(server)
    }

    /// Wait for the server to be ready to accept connections.
    async fn wait_for_ready(&self) -> Result<()> {
        let client = Client::new();
        let url = format!("{}/v1/sys/health", self.base_url);

        for _ in 0..50 {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        bail!("Server failed to start within 5 seconds")
    }

    /// Get an HTTP client for this server.
    pub fn client(&self) -> LiaisonClient {
        LiaisonClient::new(&self.base_url)
    }

    /// Stop the server process.
    pub fn stop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find the server binary in the target directory.
fn find_server_binary() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    // Try debug build first, then release
    let candidates = [
        Path::new(&manifest_dir).join("../../target/debug/liaison-server"),
        Path::new(&manifest_dir).join("../../target/debug/liaison-server.exe"),
        Path::new(&manifest_dir).join("../../target/release/liaison-server"),
        Path::new(&manifest_dir).join("../../target/release/liaison-server.exe"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.canonicalize()?);
        }
    }

    bail!(
        "Could not find liaison-server binary. Run 'cargo build -p liaison-server' first. Searched in: {:?}",
        candidates
    )
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client bound to one Liaison session.
pub struct LiaisonClient {
    client: Client,
    base_url: String,
    session: Option<String>,
}

impl LiaisonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
            session: None,
        }
    }

    /// Current session identifier, once one was issued.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.url(path));
        if let Some(session) = &self.session {
            req = req.header(SESSION_HEADER, session);
        }
        req
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/v1/sys/health")).send().await?;
        Ok(resp.json().await?)
    }

    /// Authenticates the session, optionally asserting a principal in the
    /// pre-auth header.
    pub async fn authenticate(
        &mut self,
        remote_user: Option<&str>,
        remember_me: bool,
    ) -> Result<AuthenticateResponse> {
        let mut req = self
            .post("/v1/sessions/authenticate")
            .json(&AuthenticateRequest { remember_me });
        if let Some(user) = remote_user {
            req = req.header("REMOTE_USER", user);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            bail!("Authenticate failed: {}", resp.text().await?);
        }
        let body: AuthenticateResponse = resp.json().await?;
        self.session = Some(body.session.clone());
        Ok(body)
    }

    /// Attaches a security context, opening a session when there is none.
    pub async fn attach_context(&mut self, context: &SecurityContext) -> Result<()> {
        let mut req = self.client.put(self.url("/v1/sessions/context"));
        if let Some(session) = &self.session {
            req = req.header(SESSION_HEADER, session);
        }
        let resp = req.json(context).send().await?;
        if !resp.status().is_success() {
            bail!("Attach context failed: {}", resp.status());
        }
        let session = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .context("Missing session header")?;
        self.session = Some(session.to_string());
        Ok(())
    }

    pub async fn refresh_groups(&self) -> Result<GroupsResponse> {
        let resp = self.post("/v1/sessions/groups").send().await?;
        if !resp.status().is_success() {
            bail!("Refresh groups failed: {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    pub async fn logout(&self) -> Result<()> {
        let resp = self.post("/v1/sessions/logout").send().await?;
        if !resp.status().is_success() {
            bail!("Logout failed: {}", resp.text().await?);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};

    // Port counter to avoid conflicts between parallel tests
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18300);

    fn next_port() -> u16 {
        PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_server_health_in_dev_mode() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();

        let health = server.client().health().await.unwrap();

        assert_eq!(health.status, "ok");
        assert_eq!(health.validator, "trusted-principal");
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_without_evidence() {
        let server = TestServer::start(next_port(), &["--preauth"]).await.unwrap();
        let mut client = server.client();

        let body = client.authenticate(None, false).await.unwrap();
        assert_eq!(body.outcome, "anonymous");
        assert!(body.user.is_none());
        assert!(body.reason.is_none());

        // Anonymous sessions are not kept
        assert!(client.refresh_groups().await.is_err());
    }

    #[tokio::test]
    async fn test_pre_auth_session_flow() {
        let server = TestServer::start(next_port(), &["--preauth", "--group", "admins"])
            .await
            .unwrap();
        let mut client = server.client();

        // 1. Upstream asserts the principal
        let body = client.authenticate(Some("alice"), false).await.unwrap();
        assert_eq!(body.outcome, "authenticated");
        let alice = body.user.unwrap();
        assert_eq!(alice.principal, "alice");
        assert!(alice.groups.is_empty());

        // 2. The established session keeps its user without the header
        let body = client.authenticate(None, false).await.unwrap();
        assert_eq!(body.user.unwrap().id, alice.id);

        // 3. No security context, nothing to refresh
        let refresh = client.refresh_groups().await.unwrap();
        assert_eq!(refresh.result, "not_applicable");
    }

    #[tokio::test]
    async fn test_security_context_group_sync() {
        let server = TestServer::start(next_port(), &["--group", "admins", "--group", "devs"])
            .await
            .unwrap();
        let mut client = server.client();

        // 1. Platform SSO attaches a context with one known and one unknown group
        client
            .attach_context(&SecurityContext::new(
                "alice",
                &["CN=Admins,DC=corp", "CN=Unknown,DC=corp"],
            ))
            .await
            .unwrap();

        let body = client.authenticate(None, false).await.unwrap();
        assert_eq!(body.outcome, "authenticated");
        assert_eq!(body.user.unwrap().groups, vec!["admins"]);

        // 2. Already synchronized for this context
        let refresh = client.refresh_groups().await.unwrap();
        assert_eq!(refresh.result, "already_synchronized");

        // 3. A context reporting zero groups clears memberships
        client
            .attach_context(&SecurityContext::new("alice", &[]))
            .await
            .unwrap();
        let refresh = client.refresh_groups().await.unwrap();
        assert_eq!(refresh.result, "synchronized");
        assert!(refresh.groups.is_empty());
        assert_eq!(refresh.removed, vec!["admins"]);
        assert_eq!(refresh.session, client.session().unwrap());
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let server = TestServer::start(next_port(), &["--preauth"]).await.unwrap();
        let mut client = server.client();

        let body = client.authenticate(Some("alice"), true).await.unwrap();
        assert!(body.remember_token.is_some());

        client.logout().await.unwrap();

        // The session is gone
        assert!(client.refresh_groups().await.is_err());

        // Logging out again is harmless
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_users_persist_across_restart() {
        let data_dir = TempDir::new().unwrap();

        // 1. First run creates alice
        let port = next_port();
        let mut server = TestServer::start_in(port, data_dir.path(), &["--preauth"])
            .await
            .unwrap();
        let body = server
            .client()
            .authenticate(Some("alice"), false)
            .await
            .unwrap();
        let alice_id = body.user.unwrap().id;
        server.stop();

        // 2. Second run refuses unknown principals
        let server = TestServer::start_in(
            next_port(),
            data_dir.path(),
            &["--preauth", "--no-auto-create"],
        )
        .await
        .unwrap();

        let body = server
            .client()
            .authenticate(Some("alice"), false)
            .await
            .unwrap();
        assert_eq!(body.outcome, "authenticated");
        assert_eq!(body.user.unwrap().id, alice_id);

        let body = server
            .client()
            .authenticate(Some("bob"), false)
            .await
            .unwrap();
        assert_eq!(body.outcome, "failed");
        assert_eq!(body.reason.as_deref(), Some("credentials_rejected"));
        assert!(body.user.is_none());
    }
}
