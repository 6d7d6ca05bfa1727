// # qBittorrent Client
//
// This crate provides a qBittorrent WebUI API v2 implementation of the
// `TorrentClient` trait.
//
// ## Implementation Status
//
// - ✅ Makes one HTTP request per trait call
// - ✅ Full error propagation to `PortSync` (which retries on the next cycle)
// - ✅ HTTP timeout configured (default 10 seconds)
// - ✅ 401/403 mapped to authentication errors so the session gets renewed
// - ✅ Dry-run mode for safe testing
// - ✅ Works with authentication disabled (localhost / subnet whitelist)
// - ❌ NO retry logic (intentionally omitted - owned by PortSync)
// - ❌ NO session storage (intentionally omitted - owned by PortSync)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - Password and SID cookie NEVER appear in logs
//
// ## API Reference
//
// - Login: POST `/api/v2/auth/login` (form: username, password)
// - Set preferences: POST `/api/v2/app/setPreferences` (form: json)
// - Get preferences: GET `/api/v2/app/preferences`

use async_trait::async_trait;
use portsync_core::config::ClientConfig;
use portsync_core::traits::{ClientStatus, Credentials, Session, TorrentClient};
use portsync_core::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use serde::Deserialize;
use std::time::Duration;

/// Login endpoint
const LOGIN_PATH: &str = "/api/v2/auth/login";

/// Preference update endpoint
const SET_PREFERENCES_PATH: &str = "/api/v2/app/setPreferences";

/// Preference read endpoint (used as the health probe)
const PREFERENCES_PATH: &str = "/api/v2/app/preferences";

/// Name of the session cookie set by the WebUI
const SESSION_COOKIE: &str = "SID";

/// Body returned by the login endpoint for rejected credentials
const LOGIN_REJECTED_BODY: &str = "Fails.";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of `/api/v2/app/preferences` the health probe reads
#[derive(Debug, Deserialize)]
struct Preferences {
    #[serde(default)]
    listen_port: Option<u16>,
}

/// qBittorrent WebUI client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. The session is passed in by the caller on
/// every request.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Log in and probe preferences normally
/// - Log the intended setPreferences payload
/// - **NOT** actually change the listening port
pub struct QBittorrentClient {
    /// WebUI base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, skip the setPreferences request
    dry_run: bool,
}

// Custom Debug implementation that keeps the reqwest internals out of logs
impl std::fmt::Debug for QBittorrentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QBittorrentClient")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl QBittorrentClient {
    /// Create a new qBittorrent client
    ///
    /// # Parameters
    ///
    /// - `base_url`: WebUI URL, e.g. "http://localhost:8080"
    /// - `timeout`: Per-request timeout
    /// - `dry_run`: If true, log port changes instead of sending them
    pub fn new(base_url: impl Into<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("qBittorrent URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            dry_run,
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let timeout = if config.timeout_secs == 0 {
            DEFAULT_HTTP_TIMEOUT
        } else {
            Duration::from_secs(config.timeout_secs)
        };

        if config.dry_run {
            tracing::warn!("qBittorrent client running in DRY-RUN mode - the port will not be changed");
        }

        Self::new(config.base_url.clone(), timeout, config.dry_run)
    }

    /// The WebUI base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the session cookie if there is one
    fn with_session(
        request: reqwest::RequestBuilder,
        session: Option<&Session>,
    ) -> reqwest::RequestBuilder {
        match session {
            Some(session) => request.header(COOKIE, session.token()),
            None => request,
        }
    }
}

/// Form payload for setPreferences
///
/// UPnP and random port are switched off: both would move the port away
/// from the one the VPN forwards.
pub fn listen_port_preferences(port: u16) -> serde_json::Value {
    serde_json::json!({
        "listen_port": port,
        "upnp": false,
        "random_port": false,
    })
}

/// Pick the session cookie from the response's Set-Cookie headers
///
/// Prefers the `SID=...` pair. Deployments that rename the session cookie
/// get the first non-empty pair instead.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<(&str, &str)> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .collect();

    pairs
        .iter()
        .find(|(name, _)| *name == SESSION_COOKIE)
        .or_else(|| pairs.first())
        .map(|(name, value)| format!("{}={}", name, value))
}

/// Map a non-success response to an error
fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: session missing, expired or banned. Status: {}",
            action, status
        )),
        500..=599 => Error::http(format!(
            "{} failed, qBittorrent server error (transient): {} - {}",
            action,
            status,
            body.trim()
        )),
        _ => Error::http(format!("{} failed: {} - {}", action, status, body.trim())),
    }
}

fn transport_error(e: reqwest::Error, action: &str) -> Error {
    if e.is_timeout() {
        Error::network(format!("{} timed out: {}", action, e))
    } else {
        Error::network(format!("{} request failed: {}", action, e))
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        tracing::debug!("Logging in to qBittorrent as {}", credentials.username);

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, "Login"))?;

        let status = response.status();
        let cookie = session_cookie(response.headers());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(status_error(status, &body, "Login"));
        }

        if body.trim() == LOGIN_REJECTED_BODY {
            return Err(Error::auth("qBittorrent rejected the username or password"));
        }

        match cookie {
            Some(cookie) => Ok(Session::new(cookie)),
            None => Err(Error::auth(format!(
                "Login returned no session cookie (body: {:?}). If qBittorrent bypasses \
                authentication for this host, disable authentication instead.",
                body.trim()
            ))),
        }
    }

    async fn set_listen_port(&self, port: u16, session: Option<&Session>) -> Result<()> {
        let preferences = listen_port_preferences(port);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST {} with json={}",
                self.url(SET_PREFERENCES_PATH),
                preferences
            );
            return Ok(());
        }

        let request = self
            .client
            .post(self.url(SET_PREFERENCES_PATH))
            .form(&[("json", preferences.to_string())]);

        let response = Self::with_session(request, session)
            .send()
            .await
            .map_err(|e| transport_error(e, "Set preferences"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response".to_string());
            return Err(status_error(status, &body, "Set preferences"));
        }

        tracing::debug!("qBittorrent accepted listen_port={}", port);
        Ok(())
    }

    async fn status(&self, session: Option<&Session>) -> Result<ClientStatus> {
        let request = self.client.get(self.url(PREFERENCES_PATH));

        let response = Self::with_session(request, session)
            .send()
            .await
            .map_err(|e| transport_error(e, "Get preferences"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response".to_string());
            return Err(status_error(status, &body, "Get preferences"));
        }

        let preferences: Preferences = response.json().await.map_err(|e| {
            Error::client("qbittorrent", format!("Failed to parse preferences: {}", e))
        })?;

        Ok(ClientStatus {
            listen_port: preferences.listen_port,
        })
    }

    fn client_name(&self) -> &'static str {
        "qbittorrent"
    }
}
