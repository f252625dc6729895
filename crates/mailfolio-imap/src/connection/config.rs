//! Connection configuration types.

use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Size limits enforced while reading responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest response line accepted, literals excluded.
    pub max_line_length: usize,
    /// Largest literal accepted.
    pub max_literal_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_length: 1024 * 1024,
            max_literal_size: 100 * 1024 * 1024,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Time allowed for one command, from write to tagged completion.
    pub command_timeout: Duration,
    /// Response size limits.
    pub limits: Limits,
    /// Most messages named in one FETCH command.
    pub fetch_batch_size: usize,
    /// Commands that may wait for the dispatcher before callers block.
    pub queue_depth: usize,
    /// First character of every command tag.
    pub tag_prefix: char,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

impl Default for Config {
    /// Configuration for a stream opened by the caller.
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    command_timeout: Duration,
    limits: Limits,
    fetch_batch_size: usize,
    queue_depth: usize,
    tag_prefix: char,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            limits: Limits::default(),
            fetch_batch_size: 500,
            queue_depth: 32,
            tag_prefix: 'A',
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the maximum response line length.
    #[must_use]
    pub const fn max_line_length(mut self, bytes: usize) -> Self {
        self.limits.max_line_length = bytes;
        self
    }

    /// Sets the maximum literal size.
    #[must_use]
    pub const fn max_literal_size(mut self, bytes: usize) -> Self {
        self.limits.max_literal_size = bytes;
        self
    }

    /// Sets the FETCH batch size. Zero is treated as one.
    #[must_use]
    pub const fn fetch_batch_size(mut self, messages: usize) -> Self {
        self.fetch_batch_size = if messages == 0 { 1 } else { messages };
        self
    }

    /// Sets the request queue depth. Zero is treated as one.
    #[must_use]
    pub const fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = if depth == 0 { 1 } else { depth };
        self
    }

    /// Sets the tag prefix.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            limits: self.limits,
            fetch_batch_size: self.fetch_batch_size,
            queue_depth: self.queue_depth,
            tag_prefix: self.tag_prefix,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.command_timeout, Duration::from_secs(60));
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.fetch_batch_size, 500);
        assert_eq!(config.queue_depth, 32);
        assert_eq!(config.tag_prefix, 'A');
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .port(1993)
            .connect_timeout(Duration::from_secs(10))
            .command_timeout(Duration::from_secs(5))
            .max_line_length(4096)
            .max_literal_size(1 << 20)
            .fetch_batch_size(0)
            .tag_prefix('x')
            .build();

        assert_eq!(config.port, 1993);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.limits.max_line_length, 4096);
        assert_eq!(config.limits.max_literal_size, 1 << 20);
        assert_eq!(config.fetch_batch_size, 1);
        assert_eq!(config.tag_prefix, 'x');
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();

        assert_eq!(config.port, 143);
    }
}
