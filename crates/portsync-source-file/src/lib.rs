// # File Port Source
//
// This crate provides a file-based port source for the port sync system.
//
// ## Purpose
//
// VPN clients with port forwarding (PIA, gluetun, ...) publish the forwarded
// port as a plain-text file on a shared mount. This source reads that file
// whenever the sync loop polls.
//
// ## Behavior
//
// - Read-only; the file is never created, locked or written
// - A missing file is expected until the VPN client has a port
// - Contents are returned raw; parsing is owned by `PortSync`

use async_trait::async_trait;
use portsync_core::config::SourceConfig;
use portsync_core::{Error, PortSource, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Port source backed by a plain-text file
#[derive(Debug, Clone)]
pub struct FilePortSource {
    /// Path the VPN client writes the forwarded port into
    path: PathBuf,
}

impl FilePortSource {
    /// Create a source for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a source from configuration
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.path.clone())
    }

    /// The watched file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PortSource for FilePortSource {
    async fn read(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                tracing::trace!("Read {} bytes from {}", contents.len(), self.path.display());
                Ok(contents)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::port_source(format!(
                "Port file {} does not exist yet",
                self.path.display()
            ))),
            Err(e) => Err(Error::port_source(format!(
                "Failed to read port file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
