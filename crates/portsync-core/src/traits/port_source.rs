// # Port Source Trait
//
// Defines the interface for reading the forwarded port published by the
// VPN client.
//
// ## Implementations
//
// - File-based: `portsync-source-file` crate
//
// ## Usage
//
// ```rust,ignore
// use portsync_core::{PortSource, PortReading, parse_port};
//
// let source = /* PortSource implementation */;
// match parse_port(&source.read().await?) {
//     PortReading::Port(port) => println!("forwarded port: {}", port),
//     other => println!("nothing usable yet: {:?}", other),
// }
// ```

use async_trait::async_trait;

/// Trait for port source implementations
///
/// A port source is a passive observer: it returns whatever is currently
/// published and makes no decisions about it. Parsing, change detection and
/// the "never clear a working port" policy live in [`crate::PortSync`].
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Read local files or other platform-specific locations
///
/// ## Forbidden Capabilities
/// - ❌ Talk to the torrent client (use `TorrentClient`)
/// - ❌ Cache or remember previous values (owned by `PortSync`)
/// - ❌ Spawn tasks or poll on its own schedule (owned by `PortSync`)
#[async_trait]
pub trait PortSource: Send + Sync {
    /// Read the raw published value
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The raw contents, possibly empty or malformed
    /// - `Err(Error)`: If the value could not be read at all (missing, unreadable)
    async fn read(&self) -> Result<String, crate::Error>;

    /// Human-readable description of where the port is read from (for logging)
    fn describe(&self) -> String;
}
