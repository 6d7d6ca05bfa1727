// # Torrent Client Trait
//
// Defines the interface for the torrent client's management API.
//
// ## Implementations
//
// - qBittorrent WebUI API v2: `portsync-qbittorrent` crate
//
// ## Usage
//
// ```rust,ignore
// use portsync_core::{Credentials, TorrentClient};
//
// let client = /* TorrentClient implementation */;
// let session = client.login(&Credentials::new("admin", "secret")).await?;
// client.set_listen_port(51413, Some(&session)).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Login credentials for the management API
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login user name
    pub username: String,
    /// Login password
    /// ⚠️ NEVER log this value
    pub password: String,
}

impl Credentials {
    /// Create a new set of credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// An authenticated session credential returned by [`TorrentClient::login`]
///
/// Opaque to the sync loop: it is held, handed back to the client on every
/// request, and dropped when the client reports an authentication failure.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Value sent back to the API (e.g. `SID=...` cookie pair)
    /// ⚠️ NEVER log this value
    token: String,
}

impl Session {
    /// Wrap a session token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw token, for attaching to outgoing requests
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// What a health probe learned about the torrent client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStatus {
    /// Listening port currently configured in the client, if reported
    pub listen_port: Option<u16>,
}

/// Trait for torrent client implementations
///
/// # Trust Level: Untrusted
///
/// Clients are isolated, stateless and single-shot. Each method performs one
/// API call and reports the outcome.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by `PortSync`, which retries on the next cycle)
/// - ❌ Hold the session themselves (owned by `PortSync`)
/// - ❌ Decide whether an update is needed (owned by `PortSync`)
///
/// ## Error Contract
///
/// A rejected login or an expired/invalid session MUST be reported as
/// [`crate::Error::Authentication`]; `PortSync` uses that to discard its
/// session and log in again on the next cycle.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Exchange credentials for a session
    async fn login(&self, credentials: &Credentials) -> Result<Session, crate::Error>;

    /// Set the client's listening port
    ///
    /// `session` is `None` when authentication is disabled; the request must
    /// then be sent without any session credential.
    async fn set_listen_port(
        &self,
        port: u16,
        session: Option<&Session>,
    ) -> Result<(), crate::Error>;

    /// Lightweight reachability probe used for health checks
    async fn status(&self, session: Option<&Session>) -> Result<ClientStatus, crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
