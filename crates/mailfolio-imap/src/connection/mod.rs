//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, limits)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for IMAP protocol
//! - The dispatcher task and the [`Connection`] handle

mod client;
mod config;
mod dispatcher;
mod framed;
mod stream;

pub use client::Connection;
pub use config::{Config, ConfigBuilder, Limits, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, tls_connector};
