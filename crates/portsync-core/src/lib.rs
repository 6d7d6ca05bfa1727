// # portsync-core
//
// Core library for keeping a torrent client's listening port in sync with
// the port a VPN provider forwards to this host.
//
// ## Architecture Overview
//
// - **PortSource**: Trait for reading the published forwarded port
// - **TorrentClient**: Trait for the torrent client's management API
// - **PortSync**: The polling loop that detects changes and applies them
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The loop knows nothing about files or HTTP
// 2. **Library-First**: The daemon is a thin layer over this crate
// 3. **Never Clear**: An empty or unreadable source never unsets a working port
// 4. **Apply Then Record**: The last known port only moves after a successful apply

pub mod config;
pub mod engine;
pub mod error;
pub mod port;
pub mod traits;

// Re-export core types for convenience
pub use config::{AuthConfig, ClientConfig, SourceConfig, SyncConfig};
pub use engine::{
    AppliedPort, CycleOutcome, FailureStage, HealthOutcome, PortSync, SkipReason, SyncEvent,
};
pub use error::{Error, Result};
pub use port::{PortReading, parse_port};
pub use traits::{ClientStatus, Credentials, PortSource, Session, TorrentClient};
