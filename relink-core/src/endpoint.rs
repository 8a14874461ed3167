//! Endpoint abstraction for the remote service a client stays connected to.
//!
//! An endpoint is a host name (or IP literal) plus a port. Resolution is
//! deferred to connect time so that a reconnect picks up DNS changes.

use std::fmt;
use std::str::FromStr;

/// Remote TCP endpoint: `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    ///
    /// IPv6 literals may be given with or without brackets.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(str::to_string)
            .unwrap_or(host);
        Self { host, port }
    }

    /// Parse an endpoint from a string.
    ///
    /// Supported formats:
    /// - `127.0.0.1:5555`
    /// - `localhost:5555`
    /// - `tcp://example.com:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    ///
    /// # Examples
    ///
    /// ```
    /// use relink_core::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("tcp://localhost:5555").unwrap();
    /// assert_eq!(endpoint.host(), "localhost");
    /// assert_eq!(endpoint.port(), 5555);
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// Host name or IP literal (without IPv6 brackets).
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port.
    #[inline]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Address string accepted by the resolver (`host:port`, IPv6 bracketed).
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = match s.split_once("://") {
            Some(("tcp", rest)) => rest,
            Some(_) => return Err(EndpointError::InvalidScheme(s.to_string())),
            None => s,
        };

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_string()))?;

        // A bare IPv6 literal without brackets is ambiguous.
        if host.contains(':') && !host.starts_with('[') {
            return Err(EndpointError::InvalidHost(host.to_string()));
        }
        if host.is_empty() || host == "[]" {
            return Err(EndpointError::InvalidHost(host.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointError::InvalidPort(port.to_string()))?;

        Ok(Endpoint::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}", self.authority())
    }
}

/// Errors that can occur when parsing endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid scheme in endpoint: {0} (expected tcp:// or none)")]
    InvalidScheme(String),

    #[error("Endpoint has no port: {0}")]
    MissingPort(String),

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),
}
