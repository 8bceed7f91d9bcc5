//! Public proxy list sources
//!
//! Two wire formats are understood: a plain `ip:port` per line list and the
//! geonode JSON document. Unsupported protocols (socks) are dropped here.

use crate::config::{ProxySourceConfig, ProxySourceFormat};
use crate::proxy::{ProxyCandidate, ProxyProtocol};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
struct GeonodeResponse {
    #[serde(default)]
    data: Vec<GeonodeEntry>,
}

#[derive(Debug, Deserialize)]
struct GeonodeEntry {
    ip: String,
    port: GeonodePort,
    #[serde(default)]
    protocols: Vec<String>,
}

// geonode serves ports as strings, older dumps as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeonodePort {
    Number(u16),
    Text(String),
}

impl GeonodePort {
    fn value(&self) -> Option<u16> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Parses a plain `ip:port` list
///
/// Blank lines, comments and malformed entries are skipped.
pub fn parse_plain_list(body: &str) -> Vec<ProxyCandidate> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (address, port) = line.rsplit_once(':')?;
            let port: u16 = port.trim().parse().ok()?;
            let address = address.trim();
            if address.is_empty() || port == 0 {
                return None;
            }
            Some(ProxyCandidate::new(address, port, ProxyProtocol::Http))
        })
        .collect()
}

/// Parses a geonode JSON proxy list
///
/// Each entry takes the first protocol we can speak; entries offering only
/// socks are dropped. A body that is not valid JSON yields nothing.
pub fn parse_geonode_list(body: &str) -> Vec<ProxyCandidate> {
    let response: GeonodeResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Malformed geonode proxy list: {}", e);
            return Vec::new();
        }
    };

    response
        .data
        .into_iter()
        .filter_map(|entry| {
            let port = entry.port.value().filter(|p| *p != 0)?;
            let protocol = entry.protocols.iter().find_map(|p| ProxyProtocol::parse(p))?;
            Some(ProxyCandidate::new(entry.ip.trim(), port, protocol))
        })
        .collect()
}

/// Parses a list body according to its declared format
pub fn parse_list(body: &str, format: ProxySourceFormat) -> Vec<ProxyCandidate> {
    match format {
        ProxySourceFormat::Plain => parse_plain_list(body),
        ProxySourceFormat::Geonode => parse_geonode_list(body),
    }
}

/// Collects candidates from the configured sources
///
/// Sources are consulted in order; later sources are skipped once `enough`
/// candidates were collected. The result is deduplicated by address and
/// port and capped at `max`. Unreachable sources are logged and skipped.
///
/// # Arguments
///
/// * `client` - Client used to download the lists (direct connection)
/// * `sources` - Configured list sources
/// * `enough` - Candidate count after which further sources are skipped
/// * `max` - Hard cap on returned candidates
pub async fn fetch_candidates(
    client: &Client,
    sources: &[ProxySourceConfig],
    enough: usize,
    max: usize,
) -> Vec<ProxyCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for source in sources {
        if candidates.len() >= enough {
            break;
        }

        let body = match download(client, &source.url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Proxy source {} unavailable: {}", source.url, e);
                continue;
            }
        };

        let parsed = parse_list(&body, source.format);
        tracing::debug!("Proxy source {} listed {} candidates", source.url, parsed.len());

        for candidate in parsed {
            if seen.insert((candidate.address.clone(), candidate.port)) {
                candidates.push(candidate);
            }
        }
    }

    candidates.truncate(max);
    candidates
}

async fn download(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}
