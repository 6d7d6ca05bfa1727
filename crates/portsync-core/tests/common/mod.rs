//! Test doubles and common utilities for sync loop contract tests
//!
//! The doubles are cheap handles over shared state: clone one, give the clone
//! to `PortSync`, and keep the original to drive and inspect it.

#![allow(dead_code)]

use portsync_core::error::{Error, Result};
use portsync_core::traits::{ClientStatus, Credentials, PortSource, Session, TorrentClient};
use portsync_core::{AuthConfig, ClientConfig, PortSync, SourceConfig, SyncConfig, SyncEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A port "file" the test writes into
#[derive(Clone, Default)]
pub struct FakePortFile {
    /// `None` means the file does not exist
    contents: Arc<Mutex<Option<String>>>,
    /// Call counter for read()
    read_count: Arc<AtomicUsize>,
}

impl FakePortFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: &str) -> Self {
        let file = Self::new();
        file.write(contents);
        file
    }

    pub fn write(&self, contents: &str) {
        *self.contents.lock().unwrap() = Some(contents.to_string());
    }

    pub fn remove(&self) {
        *self.contents.lock().unwrap() = None;
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PortSource for FakePortFile {
    async fn read(&self) -> Result<String> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.contents
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::port_source("Port file /fake/port.dat does not exist"))
    }

    fn describe(&self) -> String {
        "/fake/port.dat".to_string()
    }
}

/// Failure to inject into the next call of a `MockTorrentClient` method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transport failure (timeout, connection refused)
    Network,
    /// Non-2xx response
    Http,
    /// Rejected credentials or session
    Auth,
}

impl Fault {
    fn into_error(self) -> Error {
        match self {
            Fault::Network => Error::network("connection refused"),
            Fault::Http => Error::http("500 Internal Server Error"),
            Fault::Auth => Error::auth("403 Forbidden"),
        }
    }
}

/// A mock TorrentClient that records every call
#[derive(Clone, Default)]
pub struct MockTorrentClient {
    login_count: Arc<AtomicUsize>,
    status_count: Arc<AtomicUsize>,
    /// Ports passed to set_listen_port(), in call order
    applied_ports: Arc<Mutex<Vec<u16>>>,
    /// Session tokens passed to set_listen_port(), in call order
    apply_sessions: Arc<Mutex<Vec<Option<String>>>>,
    /// Session tokens passed to status(), in call order
    status_sessions: Arc<Mutex<Vec<Option<String>>>>,
    login_faults: Arc<Mutex<VecDeque<Fault>>>,
    apply_faults: Arc<Mutex<VecDeque<Fault>>>,
    status_faults: Arc<Mutex<VecDeque<Fault>>>,
    /// Port reported by status()
    reported_port: Arc<Mutex<Option<u16>>>,
    /// How long set_listen_port() takes before answering
    apply_delay: Arc<Mutex<Duration>>,
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_login(&self, fault: Fault) {
        self.login_faults.lock().unwrap().push_back(fault);
    }

    pub fn fail_next_apply(&self, fault: Fault) {
        self.apply_faults.lock().unwrap().push_back(fault);
    }

    pub fn fail_next_status(&self, fault: Fault) {
        self.status_faults.lock().unwrap().push_back(fault);
    }

    /// Make every set_listen_port() call take this long, like a request
    /// waiting out its timeout against an unresponsive host
    pub fn delay_applies(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = delay;
    }

    pub fn report_port(&self, port: u16) {
        *self.reported_port.lock().unwrap() = Some(port);
    }

    pub fn login_count(&self) -> usize {
        self.login_count.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }

    /// Number of set_listen_port() calls, including failed ones
    pub fn apply_count(&self) -> usize {
        self.applied_ports.lock().unwrap().len()
    }

    pub fn applied_ports(&self) -> Vec<u16> {
        self.applied_ports.lock().unwrap().clone()
    }

    pub fn apply_sessions(&self) -> Vec<Option<String>> {
        self.apply_sessions.lock().unwrap().clone()
    }

    pub fn status_sessions(&self) -> Vec<Option<String>> {
        self.status_sessions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TorrentClient for MockTorrentClient {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let attempt = self.login_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(fault) = self.login_faults.lock().unwrap().pop_front() {
            return Err(fault.into_error());
        }
        Ok(Session::new(format!(
            "SID={}-{}",
            credentials.username, attempt
        )))
    }

    async fn set_listen_port(&self, port: u16, session: Option<&Session>) -> Result<()> {
        self.applied_ports.lock().unwrap().push(port);
        self.apply_sessions
            .lock()
            .unwrap()
            .push(session.map(|s| s.token().to_string()));

        let delay = *self.apply_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.apply_faults.lock().unwrap().pop_front() {
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }

    async fn status(&self, session: Option<&Session>) -> Result<ClientStatus> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        self.status_sessions
            .lock()
            .unwrap()
            .push(session.map(|s| s.token().to_string()));

        if let Some(fault) = self.status_faults.lock().unwrap().pop_front() {
            return Err(fault.into_error());
        }
        Ok(ClientStatus {
            listen_port: *self.reported_port.lock().unwrap(),
        })
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// Configuration with authentication enabled for user "admin"
pub fn auth_config() -> SyncConfig {
    SyncConfig::new(
        ClientConfig::new("http://localhost:8080").with_auth(AuthConfig::Credentials {
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
        }),
        SourceConfig::new("/fake/port.dat"),
    )
}

/// Configuration with authentication disabled
pub fn no_auth_config() -> SyncConfig {
    SyncConfig::new(
        ClientConfig::new("http://localhost:8080"),
        SourceConfig::new("/fake/port.dat"),
    )
}

/// Build a loop over the given doubles
pub fn build(
    file: &FakePortFile,
    client: &MockTorrentClient,
    config: &SyncConfig,
) -> (PortSync, mpsc::Receiver<SyncEvent>) {
    PortSync::new(Box::new(file.clone()), Box::new(client.clone()), config)
        .expect("valid test configuration")
}

/// Drain every event currently buffered in the receiver
pub fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
