//! Proxy candidates and request routes

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Scheme spoken to a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyProtocol {
    Http,
    Https,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Parses a protocol name; unsupported schemes (socks4/5) yield None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

/// A candidate network egress point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCandidate {
    pub address: String,
    pub port: u16,
    pub protocol: ProxyProtocol,

    /// When the candidate last passed validation against the target
    pub last_validated_at: Option<DateTime<Utc>>,

    /// Outcome of the last validation; None until validated
    pub working_for_target: Option<bool>,
}

impl ProxyCandidate {
    /// Creates an unvalidated candidate
    pub fn new(address: impl Into<String>, port: u16, protocol: ProxyProtocol) -> Self {
        Self {
            address: address.into(),
            port,
            protocol,
            last_validated_at: None,
            working_for_target: None,
        }
    }

    /// URL handed to the HTTP client, e.g. `http://10.0.0.1:8080`
    pub fn proxy_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.as_str(), self.address, self.port)
    }

    /// Identity used for dedup and eviction: address and port only
    pub fn same_endpoint(&self, other: &ProxyCandidate) -> bool {
        self.address == other.address && self.port == other.port
    }

    /// True if the candidate was validated within `window` of `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_validated_at {
            Some(at) => now - at < window,
            None => false,
        }
    }

    /// Stamps a successful validation
    pub fn mark_validated(&mut self, now: DateTime<Utc>) {
        self.last_validated_at = Some(now);
        self.working_for_target = Some(true);
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// The route one request takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    /// No proxy: pool empty or proxy use disabled
    Direct,
    Proxy(ProxyCandidate),
}

impl Egress {
    pub fn proxy(&self) -> Option<&ProxyCandidate> {
        match self {
            Self::Direct => None,
            Self::Proxy(p) => Some(p),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}

impl fmt::Display for Egress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct connection"),
            Self::Proxy(p) => write!(f, "proxy {}", p),
        }
    }
}
