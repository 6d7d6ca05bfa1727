//! Core port sync loop
//!
//! The PortSync loop is responsible for:
//! - Reading the forwarded port via PortSource
//! - Detecting changes against the last successfully applied port
//! - Logging in via TorrentClient when authentication is enabled
//! - Applying the new listening port
//! - Probing the torrent client on its own cadence
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ PortSource  │──── raw contents ───┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │   PortSync   │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ last_applied│           │TorrentClient │           │   Events    │
//! │ (compare)   │           │(login/apply) │           │  (notify)   │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Read the source; missing, empty or invalid contents skip the cycle
//! 2. Compare with the last applied port; equal ports skip the cycle
//! 3. Log in if authentication is enabled and no session is held
//! 4. Apply the port; only a successful apply updates the last applied port
//!
//! Every failure ends the cycle. The next cycle starts again from step 1,
//! which retries naturally because the port still differs.

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::port::{PortReading, parse_port};
use crate::traits::{Credentials, PortSource, Session, TorrentClient};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Consecutive failures after which failures are logged at error level
pub const FAILURE_ESCALATION_THRESHOLD: usize = 3;

/// The last port that was successfully applied to the torrent client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPort {
    /// The applied port
    pub port: u16,
    /// When the apply call succeeded
    pub applied_at: DateTime<Utc>,
}

impl AppliedPort {
    /// Record a port applied just now
    pub fn now(port: u16) -> Self {
        Self {
            port,
            applied_at: Utc::now(),
        }
    }

    /// Time elapsed between the apply and `now`, zero if `now` is earlier
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.applied_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Why a cycle did not attempt an apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source could not be read (missing file, I/O error)
    SourceUnavailable(String),
    /// The source was blank
    Empty,
    /// The source held something that is not a usable port
    Invalid(String),
}

/// Which step of a cycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Obtaining a session
    Login,
    /// Submitting the listening port
    Apply,
}

/// Result of a single poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No apply was attempted
    Skipped(SkipReason),
    /// The source holds the port that is already applied
    Unchanged(u16),
    /// The port was applied
    Applied {
        port: u16,
        previous: Option<u16>,
    },
    /// Login or apply failed; the next cycle retries
    Failed {
        port: u16,
        stage: FailureStage,
        error: String,
    },
}

/// Result of a health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    /// The client answered
    Healthy { listen_port: Option<u16> },
    /// The client could not be reached or rejected the probe
    Unreachable { error: String },
}

/// Events emitted by the PortSync loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Loop started
    Started { source: String, client: String },

    /// A poll cycle finished
    Cycle(CycleOutcome),

    /// A health probe finished
    HealthCheck(HealthOutcome),

    /// Loop stopped
    Stopped { reason: String },
}

/// Core port sync loop
///
/// Owns all mutable state of the daemon: the last applied port and the
/// session. Exactly one task drives it, so no locking is involved.
///
/// ## Lifecycle
///
/// 1. Create with [`PortSync::new()`]
/// 2. Start with [`PortSync::run()`] or [`PortSync::run_until()`]
/// 3. Loop runs until the shutdown future resolves
///
/// Single cycles can be driven directly with [`PortSync::run_cycle()`] and
/// [`PortSync::run_health_check()`].
pub struct PortSync {
    /// Where the forwarded port is read from
    source: Box<dyn PortSource>,

    /// Torrent client management API
    client: Box<dyn TorrentClient>,

    /// Login credentials, `None` when authentication is disabled
    credentials: Option<Credentials>,

    /// Delay between poll cycles
    poll_interval: Duration,

    /// Delay between health probes
    health_check_interval: Duration,

    /// Last successfully applied port
    last_applied: Option<AppliedPort>,

    /// Current session, if logged in
    session: Option<Session>,

    /// Failed cycles since the last successful apply
    consecutive_failures: usize,

    /// Failed health probes since the last successful one
    consecutive_health_failures: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl PortSync {
    /// Create a new sync loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields sync events
    pub fn new(
        source: Box<dyn PortSource>,
        client: Box<dyn TorrentClient>,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let sync = Self {
            source,
            client,
            credentials: config.client.auth.credentials(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            health_check_interval: Duration::from_secs(config.health_check_interval_secs),
            last_applied: None,
            session: None,
            consecutive_failures: 0,
            consecutive_health_failures: 0,
            event_tx: tx,
        };

        Ok((sync, rx))
    }

    /// Override both cadences with sub-second precision
    pub fn with_intervals(mut self, poll: Duration, health_check: Duration) -> Result<Self> {
        if poll.is_zero() || health_check.is_zero() {
            return Err(Error::config("Intervals must be > 0"));
        }
        self.poll_interval = poll;
        self.health_check_interval = health_check;
        Ok(self)
    }

    /// The last successfully applied port
    pub fn last_applied(&self) -> Option<AppliedPort> {
        self.last_applied
    }

    /// Port number of the last successful apply
    pub fn last_port(&self) -> Option<u16> {
        self.last_applied.map(|applied| applied.port)
    }

    /// Whether a session is currently held
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Failed cycles since the last successful apply
    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Failed health probes since the last successful one
    pub fn consecutive_health_failures(&self) -> usize {
        self.consecutive_health_failures
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            "SIGINT"
        })
        .await
    }

    /// Run both cadences until `shutdown` resolves
    ///
    /// The first poll cycle runs immediately; the first health probe runs
    /// after one health-check interval. Each cadence is rescheduled one
    /// interval after its run finishes. When both are due, both run, so a
    /// slow cadence never starves the other. A cycle in progress is finished
    /// before shutdown is observed.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = &'static str>,
    {
        self.emit_event(SyncEvent::Started {
            source: self.source.describe(),
            client: self.client.client_name().to_string(),
        });
        info!(
            "Watching {} every {:?}, health check every {:?}",
            self.source.describe(),
            self.poll_interval,
            self.health_check_interval
        );

        let mut next_poll = Instant::now();
        let mut next_health = Instant::now() + self.health_check_interval;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                reason = &mut shutdown => {
                    info!("Shutdown signal received: {}", reason);
                    self.emit_event(SyncEvent::Stopped {
                        reason: reason.to_string(),
                    });
                    break;
                }

                _ = tokio::time::sleep_until(next_poll.min(next_health)) => {}
            }

            if Instant::now() >= next_poll {
                self.run_cycle().await;
                next_poll = Instant::now() + self.poll_interval;
            }

            if Instant::now() >= next_health {
                self.run_health_check().await;
                next_health = Instant::now() + self.health_check_interval;
            }
        }
    }

    /// Perform one poll cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.sync_once().await;
        self.emit_event(SyncEvent::Cycle(outcome.clone()));
        outcome
    }

    async fn sync_once(&mut self) -> CycleOutcome {
        let raw = match self.source.read().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping cycle, port source unavailable: {}", e);
                return CycleOutcome::Skipped(SkipReason::SourceUnavailable(e.to_string()));
            }
        };

        let port = match parse_port(&raw) {
            PortReading::Port(port) => port,
            PortReading::Empty => {
                debug!(
                    "Port source is empty, keeping last known port {:?}",
                    self.last_port()
                );
                return CycleOutcome::Skipped(SkipReason::Empty);
            }
            PortReading::Invalid(text) => {
                warn!("Invalid port number in source: {:?}", text);
                return CycleOutcome::Skipped(SkipReason::Invalid(text));
            }
        };

        let previous = self.last_port();
        if previous == Some(port) {
            debug!("Port unchanged: {}", port);
            return CycleOutcome::Unchanged(port);
        }

        info!("Port changed from {:?} to {}", previous, port);

        if let Err(e) = self.ensure_session().await {
            self.record_failure(FailureStage::Login, &e);
            return CycleOutcome::Failed {
                port,
                stage: FailureStage::Login,
                error: e.to_string(),
            };
        }

        match self.client.set_listen_port(port, self.session.as_ref()).await {
            Ok(()) => {
                self.last_applied = Some(AppliedPort::now(port));
                self.consecutive_failures = 0;
                info!(
                    "Set {} listening port to {} (previous: {:?})",
                    self.client.client_name(),
                    port,
                    previous
                );
                CycleOutcome::Applied { port, previous }
            }
            Err(e) => {
                if e.is_auth() {
                    debug!("Discarding rejected session");
                    self.session = None;
                }
                self.record_failure(FailureStage::Apply, &e);
                CycleOutcome::Failed {
                    port,
                    stage: FailureStage::Apply,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Perform one health probe
    ///
    /// Observability only: the outcome is logged and emitted, nothing is
    /// re-applied. A rejected session is discarded so the next call logs in.
    pub async fn run_health_check(&mut self) -> HealthOutcome {
        let status = match self.ensure_session().await {
            Ok(()) => self.client.status(self.session.as_ref()).await,
            Err(e) => Err(e),
        };

        let outcome = match status {
            Ok(status) => {
                match status.listen_port {
                    Some(reported) => debug!(
                        "Current {} listening port: {}",
                        self.client.client_name(),
                        reported
                    ),
                    None => debug!("{} is reachable", self.client.client_name()),
                }

                if let (Some(reported), Some(applied)) = (status.listen_port, self.last_applied)
                    && reported != applied.port
                {
                    warn!(
                        "{} reports listening port {} but {} was applied at {} ({}s ago)",
                        self.client.client_name(),
                        reported,
                        applied.port,
                        applied.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        applied.age(Utc::now()).as_secs()
                    );
                }

                if self.consecutive_health_failures > 0 {
                    info!(
                        "{} reachable again after {} failed health checks",
                        self.client.client_name(),
                        self.consecutive_health_failures
                    );
                    self.consecutive_health_failures = 0;
                }

                HealthOutcome::Healthy {
                    listen_port: status.listen_port,
                }
            }
            Err(e) => {
                if e.is_auth() {
                    self.session = None;
                }
                self.consecutive_health_failures += 1;
                if self.consecutive_health_failures >= FAILURE_ESCALATION_THRESHOLD {
                    error!(
                        "Health check against {} failed ({} consecutive failures): {}",
                        self.client.client_name(),
                        self.consecutive_health_failures,
                        e
                    );
                } else {
                    warn!(
                        "Health check against {} failed: {}",
                        self.client.client_name(),
                        e
                    );
                }
                HealthOutcome::Unreachable {
                    error: e.to_string(),
                }
            }
        };

        self.emit_event(SyncEvent::HealthCheck(outcome.clone()));
        outcome
    }

    /// Log in if authentication is enabled and no session is held
    async fn ensure_session(&mut self) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };

        if self.session.is_some() {
            return Ok(());
        }

        let session = self.client.login(credentials).await?;
        info!("Logged in to {}", self.client.client_name());
        self.session = Some(session);
        Ok(())
    }

    fn record_failure(&mut self, stage: FailureStage, err: &Error) {
        self.consecutive_failures += 1;
        let action = match stage {
            FailureStage::Login => "log in to",
            FailureStage::Apply => "update listening port on",
        };

        // Rejected or unreachable logins are always errors; apply failures
        // escalate once they persist
        if stage == FailureStage::Login
            || self.consecutive_failures >= FAILURE_ESCALATION_THRESHOLD
        {
            error!(
                "Failed to {} {} ({} consecutive failures): {}",
                action,
                self.client.client_name(),
                self.consecutive_failures,
                err
            );
        } else {
            warn!(
                "Failed to {} {}, will retry next cycle: {}",
                action,
                self.client.client_name(),
                err
            );
        }
    }

    /// Emit a sync event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            // Channel is full - the consumer is slower than the loop
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
