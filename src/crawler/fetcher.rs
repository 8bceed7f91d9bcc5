//! Resilient listing-page fetcher
//!
//! This module handles every request to the registry itself, including:
//! - Process-wide request spacing via the shared RateLimiter
//! - Proxy selection and rotation on a consecutive-failure threshold
//! - Eviction of proxies that were rotated away from
//! - Randomized user agents and the fixed browser header table
//! - Retry with randomized backoff and soft-block detection

use crate::config::FetchConfig;
use crate::crawler::RateLimiter;
use crate::proxy::{Egress, ProxyPool};
use crate::HarvestError;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

/// Browser user agents rotated per request
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 11.5; rv:90.0) Gecko/20100101 Firefox/90.0",
];

pub const ACCEPT_LANGUAGE_VALUE: &str = "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7";
pub const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml";
pub const REFERER_VALUE: &str = "https://firmenregister.de/";
pub const CACHE_CONTROL_VALUE: &str = "no-cache";

/// A logical fetch that used up all of its attempts
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch exhausted for {url} after {attempts} attempts (last: {last})")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptOutcome,
    },
}

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,

    /// 403 or 429
    SoftBlock { status: u16 },

    /// Any other non-200 status
    HttpStatus { status: u16 },

    /// Timeout, connection reset, unusable proxy, unreadable body
    Transport { message: String },
}

impl AttemptOutcome {
    /// Converts a failed outcome into the matching error for logging
    pub fn to_error(&self, url: &str) -> Option<HarvestError> {
        match self {
            Self::Success => None,
            Self::SoftBlock { status } => Some(HarvestError::SoftBlock {
                url: url.to_string(),
                status: *status,
            }),
            Self::HttpStatus { status } => Some(HarvestError::TransientNetwork {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            }),
            Self::Transport { message } => Some(HarvestError::TransientNetwork {
                url: url.to_string(),
                message: message.clone(),
            }),
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::SoftBlock { status } => write!(f, "soft block (HTTP {})", status),
            Self::HttpStatus { status } => write!(f, "HTTP {}", status),
            Self::Transport { message } => write!(f, "{}", message),
        }
    }
}

/// One attempt of a logical fetch; lives only for the duration of the call
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub url: String,
    pub egress: Egress,
    /// 1-based
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

#[derive(Default)]
struct RouteState {
    egress: Option<Egress>,
    client: Option<Client>,
    consecutive_failures: u32,
}

/// Builds an HTTP client routed through `egress`
///
/// # Arguments
///
/// * `egress` - Direct connection or the proxy to use
/// * `config` - Timeout settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - The proxy URL was rejected or the client failed to build
pub fn build_http_client(egress: &Egress, config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true);

    let builder = match egress {
        Egress::Direct => builder.no_proxy(),
        Egress::Proxy(candidate) => builder.proxy(Proxy::all(candidate.proxy_url())?),
    };

    builder.build()
}

/// Picks a user agent uniformly from [`USER_AGENTS`]
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Issues one logical GET through the proxy pool and rate limiter
///
/// Fetches are serialized: the route state (current proxy, its client and
/// the consecutive-failure counter) is held for the whole call.
pub struct ResilientFetcher {
    config: FetchConfig,
    pool: ProxyPool,
    limiter: Arc<RateLimiter>,
    route: Mutex<RouteState>,
}

impl ResilientFetcher {
    pub fn new(config: FetchConfig, pool: ProxyPool, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            pool,
            limiter,
            route: Mutex::new(RouteState::default()),
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches `url` with the configured number of attempts
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.fetch_with_retries(url, self.config.max_retries).await
    }

    /// Fetches `url`, making at most `max_attempts` requests
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Body of the first 200 response
    /// * `Err(FetchError::Exhausted)` - Every attempt failed
    pub async fn fetch_with_retries(&self, url: &Url, max_attempts: u32) -> Result<String, FetchError> {
        let max_attempts = max_attempts.max(1);
        let threshold = self.config.rotate_after_failures.max(1);
        let mut route = self.route.lock().await;
        let mut last = AttemptOutcome::Transport {
            message: "no attempt made".to_string(),
        };

        for attempt in 1..=max_attempts {
            self.limiter.acquire().await;

            if route.egress.is_none() || route.consecutive_failures >= threshold {
                self.rotate(&mut route);
            }

            let egress = route.egress.clone().unwrap_or(Egress::Direct);
            let (outcome, body) = match &route.client {
                Some(client) => send(client, url).await,
                None => (
                    AttemptOutcome::Transport {
                        message: format!("no usable client for {}", egress),
                    },
                    None,
                ),
            };

            let record = FetchAttempt {
                url: url.to_string(),
                egress,
                attempt,
                outcome,
            };

            if let Some(body) = body {
                tracing::debug!("Fetched {} via {} (attempt {})", record.url, record.egress, attempt);
                route.consecutive_failures = 0;
                return Ok(body);
            }

            route.consecutive_failures += 1;
            if let Some(err) = record.outcome.to_error(&record.url) {
                tracing::warn!(
                    "Attempt {}/{} via {} failed: {}",
                    attempt,
                    max_attempts,
                    record.egress,
                    err
                );
            }

            let abandon = matches!(record.outcome, AttemptOutcome::SoftBlock { .. })
                || route.consecutive_failures >= threshold;
            if abandon {
                self.abandon(&mut route);
            }

            last = record.outcome;

            if attempt < max_attempts {
                tokio::time::sleep(self.backoff()).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last,
        })
    }

    fn rotate(&self, route: &mut RouteState) {
        let egress = self.pool.next();
        route.client = match build_http_client(&egress, &self.config) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Could not build client for {}: {}", egress, e);
                None
            }
        };
        tracing::debug!("Routing through {}", egress);
        route.egress = Some(egress);
        route.consecutive_failures = 0;
    }

    fn abandon(&self, route: &mut RouteState) {
        if let Some(Egress::Proxy(candidate)) = route.egress.take() {
            tracing::info!("Rotating away from proxy {}", candidate);
            self.pool.mark_failed(&candidate);
        }
        route.client = None;
    }

    fn backoff(&self) -> Duration {
        let min = self.config.backoff_min_ms;
        let max = self.config.backoff_max_ms.max(min);
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

async fn send(client: &Client, url: &Url) -> (AttemptOutcome, Option<String>) {
    let response = client
        .get(url.clone())
        .header(USER_AGENT, random_user_agent())
        .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
        .header(ACCEPT, ACCEPT_VALUE)
        .header(REFERER, REFERER_VALUE)
        .header(CACHE_CONTROL, CACHE_CONTROL_VALUE)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => return (transport(e), None),
    };

    match response.status() {
        StatusCode::OK => match response.text().await {
            Ok(body) => (AttemptOutcome::Success, Some(body)),
            Err(e) => (transport(e), None),
        },
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => (
            AttemptOutcome::SoftBlock {
                status: response.status().as_u16(),
            },
            None,
        ),
        status => (
            AttemptOutcome::HttpStatus {
                status: status.as_u16(),
            },
            None,
        ),
    }
}

fn transport(e: reqwest::Error) -> AttemptOutcome {
    let message = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection failed".to_string()
    } else {
        e.to_string()
    };
    AttemptOutcome::Transport { message }
}
