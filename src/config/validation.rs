use crate::config::types::{
    Config, CrawlConfig, FetchConfig, OutputConfig, ProbeConfig, ProxyConfig, TargetConfig,
};
use crate::ConfigError;
use url::Url;

/// Longest accepted proxy freshness window (one year)
const MAX_FRESHNESS_HOURS: i64 = 24 * 365;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_fetch_config(&config.fetch)?;
    validate_crawl_config(&config.crawl)?;
    validate_proxy_config(&config.proxy)?;
    validate_probe_config(&config.probe)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    // Page URLs are built by appending to the base
    if !config.base_url.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base-url must end with '/', got '{}'",
            config.base_url
        )));
    }

    if config.marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "target marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max-retries must be >= 1".to_string(),
        ));
    }

    if config.rotate_after_failures < 1 {
        return Err(ConfigError::Validation(
            "rotate-after-failures must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be > 0".to_string(),
        ));
    }

    check_range(
        "backoff-min-ms",
        config.backoff_min_ms,
        "backoff-max-ms",
        config.backoff_max_ms,
    )
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    check_range(
        "page-delay-min-ms",
        config.page_delay_min_ms,
        "page-delay-max-ms",
        config.page_delay_max_ms,
    )
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.store_path.is_empty() {
        return Err(ConfigError::Validation(
            "proxy store-path cannot be empty".to_string(),
        ));
    }

    if config.freshness_hours <= 0 || config.freshness_hours > MAX_FRESHNESS_HOURS {
        return Err(ConfigError::Validation(format!(
            "freshness-hours must be in 1..={}, got {}",
            MAX_FRESHNESS_HOURS, config.freshness_hours
        )));
    }

    if config.validation_concurrency < 1 {
        return Err(ConfigError::Validation(
            "validation-concurrency must be >= 1".to_string(),
        ));
    }

    for source in &config.sources {
        Url::parse(&source.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid proxy source '{}': {}", source.url, e))
        })?;
    }

    Ok(())
}

fn validate_probe_config(config: &ProbeConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "probe concurrency must be between 1 and 256, got {}",
            config.concurrency
        )));
    }

    let markers = [
        ("platform-a-marker", &config.platform_a_marker),
        ("platform-b-marker", &config.platform_b_marker),
        ("platform-b-strong-marker", &config.platform_b_strong_marker),
        ("platform-b-hint", &config.platform_b_hint),
    ];
    for (name, value) in markers {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_dir.is_empty() {
        return Err(ConfigError::Validation(
            "csv-dir cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn check_range(min_name: &str, min: u64, max_name: &str, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} ({}) must not exceed {} ({})",
            min_name, min, max_name, max
        )));
    }
    Ok(())
}
