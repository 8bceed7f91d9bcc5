//! Homepage probing and the CMS decision tree
//!
//! A homepage and its `/backend` and `/admin` paths are fetched in turn and
//! matched against platform markers. The first decisive match wins.

use crate::config::ProbeConfig;
use crate::crawler::random_user_agent;
use crate::record::{CmsStatus, EnrichedRecord, Field, Record};
use futures::stream::{self, StreamExt};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

/// Outcome of one probe fetch
///
/// Any HTTP response counts as a body, whatever its status; only a
/// transport failure (timeout, refused, TLS) is `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeBody {
    Body(String),
    Failed,
}

impl ProbeBody {
    fn contains(&self, marker: &str) -> bool {
        match self {
            Self::Body(body) => body.contains(marker),
            Self::Failed => false,
        }
    }

    fn failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// URLs of the three probes: homepage, `/backend`, `/admin`
///
/// A homepage without a scheme is probed over `http://`.
pub fn probe_urls(homepage: &str) -> [String; 3] {
    let homepage = homepage.trim();
    let home = if homepage.contains("://") {
        homepage.to_string()
    } else {
        format!("http://{}", homepage)
    };

    let root = home.trim_end_matches('/');
    let backend = format!("{}/backend", root);
    let admin = format!("{}/admin", root);
    [home, backend, admin]
}

/// Final classification once all three probes ran without a match
///
/// Platform A depends only on the homepage probe. Platform B is
/// `ProbeError` when both of its probes failed, `Possibly` when one did and
/// `LikelyNot` when both answered.
pub fn classify(home: &ProbeBody, backend: &ProbeBody, admin: &ProbeBody) -> (CmsStatus, CmsStatus) {
    let platform_a = if home.failed() {
        CmsStatus::ProbeError
    } else {
        CmsStatus::LikelyNot
    };

    let platform_b = match (backend.failed(), admin.failed()) {
        (true, true) => CmsStatus::ProbeError,
        (true, false) | (false, true) => CmsStatus::Possibly,
        (false, false) => CmsStatus::LikelyNot,
    };

    (platform_a, platform_b)
}

/// Homepage CMS classifier
pub struct CmsProbe {
    client: Client,
    config: ProbeConfig,
}

impl CmsProbe {
    /// Builds a probe with its own direct-connection client
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Classifies one record
    ///
    /// Records without a homepage come back unclassified. The walk stops at
    /// the first probe whose body matches a marker.
    pub async fn enrich(&self, record: Record) -> EnrichedRecord {
        let Some(homepage) = record.get(Field::Homepage).map(str::to_string) else {
            return EnrichedRecord::unprobed(record);
        };

        let [home_url, backend_url, admin_url] = probe_urls(&homepage);
        let mut enriched = EnrichedRecord::unprobed(record);

        let home = self.fetch(&home_url).await;
        if home.contains(&self.config.platform_a_marker) {
            enriched.platform_a = Some(CmsStatus::Likely);
            return enriched;
        }

        let backend = self.fetch(&backend_url).await;
        if backend.contains(&self.config.platform_b_marker) {
            enriched.platform_b = Some(CmsStatus::Likely);
            return enriched;
        }

        let admin = self.fetch(&admin_url).await;
        if admin.contains(&self.config.platform_b_strong_marker) {
            enriched.platform_b = Some(CmsStatus::Likely);
        } else if home.contains(&self.config.platform_b_hint) {
            enriched.platform_b = Some(CmsStatus::Possibly);
        } else {
            let (a, b) = classify(&home, &backend, &admin);
            enriched.platform_a = Some(a);
            enriched.platform_b = Some(b);
        }

        tracing::debug!(
            "Probed {}: platform A {:?}, platform B {:?}",
            home_url,
            enriched.platform_a,
            enriched.platform_b
        );
        enriched
    }

    /// Classifies all records with bounded concurrency
    ///
    /// The output is positionally aligned with the input.
    pub async fn enrich_all(&self, records: Vec<Record>) -> Vec<EnrichedRecord> {
        let with_homepage = records.iter().filter(|r| r.contains(Field::Homepage)).count();
        tracing::info!(
            "Probing {} of {} homepages ({} at a time)",
            with_homepage,
            records.len(),
            self.config.concurrency
        );

        stream::iter(records)
            .map(|record| self.enrich(record))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn fetch(&self, url: &str) -> ProbeBody {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await;

        let body = match response {
            Ok(r) => r.text().await,
            Err(e) => Err(e),
        };

        match body {
            Ok(body) => ProbeBody::Body(body),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", url, e);
                ProbeBody::Failed
            }
        }
    }
}
