//! Candidate validation against the target site
//!
//! A candidate is valid only if a GET of the target through it answers 200
//! and the body carries the target marker. Captive portals and transparent
//! error pages answer 200 too, hence the marker.

use crate::proxy::ProxyCandidate;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use url::Url;

/// Probes one candidate against `target`
///
/// Returns true if the response was 200 and its body contains `marker`
/// (case-insensitive). Every failure, including a client that cannot be
/// built for the candidate, is a plain false.
pub async fn validate_candidate(
    candidate: &ProxyCandidate,
    target: &Url,
    marker: &str,
    timeout: Duration,
) -> bool {
    let proxy = match Proxy::all(candidate.proxy_url()) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Unusable proxy {}: {}", candidate, e);
            return false;
        }
    };

    let client = match Client::builder().proxy(proxy).timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Could not build client for {}: {}", candidate, e);
            return false;
        }
    };

    let response = match client.get(target.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::trace!("Proxy {} failed validation: {}", candidate, e);
            return false;
        }
    };

    if response.status() != StatusCode::OK {
        tracing::trace!("Proxy {} answered {}", candidate, response.status());
        return false;
    }

    match response.text().await {
        Ok(body) => body.to_lowercase().contains(&marker.to_lowercase()),
        Err(_) => false,
    }
}

/// Validates all candidates with at most `concurrency` probes in flight
///
/// Survivors are stamped as validated now. Their order is completion order.
pub async fn validate_all(
    candidates: Vec<ProxyCandidate>,
    target: &Url,
    marker: &str,
    timeout: Duration,
    concurrency: usize,
) -> Vec<ProxyCandidate> {
    let total = candidates.len();

    let validated: Vec<ProxyCandidate> = stream::iter(candidates)
        .map(|candidate| async move {
            let ok = validate_candidate(&candidate, target, marker, timeout).await;
            (candidate, ok)
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(mut candidate, ok)| async move {
            if ok {
                candidate.mark_validated(Utc::now());
                Some(candidate)
            } else {
                None
            }
        })
        .collect()
        .await;

    tracing::info!("{} of {} proxy candidates passed validation", validated.len(), total);
    validated
}
