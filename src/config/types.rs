use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Registry-Harvest
///
/// Every section and key is optional; missing values fall back to the
/// defaults the registry is known to tolerate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub fetch: FetchConfig,
    pub crawl: CrawlConfig,
    pub proxy: ProxyConfig,
    pub probe: ProbeConfig,
    pub output: OutputConfig,
}

/// The registry being harvested
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Site root; relative links and image paths resolve against it
    pub base_url: String,

    /// Marker a genuine registry response contains (case-insensitive)
    pub marker: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.firmenregister.de/".to_string(),
            marker: "firmenregister".to_string(),
        }
    }
}

/// Request pacing, retry and timeout settings for listing-page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Minimum spacing between any two request starts (milliseconds)
    pub min_delay_ms: u64,

    pub request_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Total attempts per logical fetch
    pub max_retries: u32,

    /// Consecutive failures after which the current proxy is abandoned
    pub rotate_after_failures: u32,

    pub backoff_min_ms: u64,

    pub backoff_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            rotate_after_failures: 2,
            backoff_min_ms: 2000,
            backoff_max_ms: 5000,
        }
    }
}

impl FetchConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Pagination walk settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Lower bound of the randomized pause between listing pages (milliseconds)
    pub page_delay_min_ms: u64,

    /// Upper bound of the randomized pause between listing pages (milliseconds)
    pub page_delay_max_ms: u64,

    /// Extra whole-page attempts after a page fetch is exhausted
    pub page_retries: u32,

    pub page_retry_base_ms: u64,

    pub page_retry_step_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_delay_min_ms: 1000,
            page_delay_max_ms: 3000,
            page_retries: 2,
            page_retry_base_ms: 3000,
            page_retry_step_ms: 2000,
        }
    }
}

/// Proxy pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// When false every request goes out directly
    pub enabled: bool,

    /// SQLite file persisting validated candidates across runs
    pub store_path: String,

    /// Below this many fresh candidates a full refresh is triggered
    pub min_pool_size: usize,

    /// Candidates validated longer ago than this are discarded
    pub freshness_hours: i64,

    /// A background refill starts when the cursor is this close to the end
    pub low_water_mark: usize,

    pub refill_cooldown_secs: u64,

    pub validation_timeout_secs: u64,

    pub validation_concurrency: usize,

    pub max_candidates: usize,

    /// Further sources are skipped once this many candidates were collected
    pub enough_candidates: usize,

    pub sources: Vec<ProxySourceConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_path: "proxies.db".to_string(),
            min_pool_size: 5,
            freshness_hours: 24,
            low_water_mark: 3,
            refill_cooldown_secs: 600,
            validation_timeout_secs: 10,
            validation_concurrency: 32,
            max_candidates: 500,
            enough_candidates: 10,
            sources: vec![
                ProxySourceConfig {
                    url: "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt"
                        .to_string(),
                    format: ProxySourceFormat::Plain,
                },
                ProxySourceConfig {
                    url: "https://proxylist.geonode.com/api/proxy-list?limit=50&page=1&sort_by=lastChecked&sort_type=desc&filterUpTime=90&protocols=http%2Chttps"
                        .to_string(),
                    format: ProxySourceFormat::Geonode,
                },
            ],
        }
    }
}

/// A public list of candidate proxies
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySourceConfig {
    pub url: String,

    #[serde(default)]
    pub format: ProxySourceFormat,
}

/// Wire format of a proxy list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxySourceFormat {
    /// One `ip:port` per line
    #[default]
    Plain,

    /// JSON document `{"data": [{"ip", "port", "protocols"}]}`
    Geonode,
}

/// CMS probe settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// Maximum records probed at once
    pub concurrency: usize,

    pub timeout_secs: u64,

    pub platform_a_marker: String,

    pub platform_b_marker: String,

    pub platform_b_strong_marker: String,

    pub platform_b_hint: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_secs: 15,
            platform_a_marker: "typo3".to_string(),
            platform_b_marker: "shopware".to_string(),
            platform_b_strong_marker: "wahrscheinlich shopware".to_string(),
            platform_b_hint: "sw-".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving the CSV exports
    pub csv_dir: String,

    /// Path of the JSON resume checkpoint
    pub checkpoint_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_dir: "csv".to_string(),
            checkpoint_path: "progress.json".to_string(),
        }
    }
}
