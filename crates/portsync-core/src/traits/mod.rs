//! Core traits for the port sync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`PortSource`]: Read the currently published forwarded port
//! - [`TorrentClient`]: Authenticate against and configure a torrent client

pub mod port_source;
pub mod torrent_client;

pub use port_source::PortSource;
pub use torrent_client::{ClientStatus, Credentials, Session, TorrentClient};
