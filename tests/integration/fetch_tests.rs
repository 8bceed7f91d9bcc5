//! Integration tests for the resilient fetcher
//!
//! These tests use wiremock to create mock HTTP servers standing in for the
//! registry and, where proxies are involved, for the proxies themselves.

use registry_harvest::config::Config;
use registry_harvest::crawler::{AttemptOutcome, FetchError, RateLimiter, ResilientFetcher, USER_AGENTS};
use registry_harvest::proxy::{ProxyCandidate, ProxyPool, ProxyProtocol};
use registry_harvest::storage::{ProxyStore, SqliteProxyStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a direct-connection configuration with fast backoff
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.proxy.enabled = false;
    config.proxy.sources.clear();
    config.proxy.min_pool_size = 0;
    config.proxy.low_water_mark = 0;
    config.fetch.min_delay_ms = 1;
    config.fetch.backoff_min_ms = 1;
    config.fetch.backoff_max_ms = 2;
    config.fetch.request_timeout_secs = 5;
    config
}

fn direct_fetcher(config: &Config) -> ResilientFetcher {
    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    let pool = ProxyPool::new(config, store).unwrap();
    let limiter = Arc::new(RateLimiter::new(config.fetch.min_delay()));
    ResilientFetcher::new(config.fetch.clone(), pool, limiter)
}

fn listing_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/register.php", server.uri())).unwrap()
}

#[tokio::test]
async fn test_fetch_returns_body_with_browser_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/register.php"))
        .and(header("accept-language", "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"))
        .and(header("referer", "https://firmenregister.de/"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Liste</html>"))
        .mount(&server)
        .await;

    let fetcher = direct_fetcher(&create_test_config());
    let body = fetcher.fetch(&listing_url(&server)).await.unwrap();
    assert_eq!(body, "<html>Liste</html>");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(USER_AGENTS.contains(&agent));
}

#[tokio::test]
async fn test_soft_block_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetcher = direct_fetcher(&create_test_config());
    let body = fetcher.fetch(&listing_url(&server)).await.unwrap();

    assert_eq!(body, "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fetch_exhausted_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config();
    let fetcher = direct_fetcher(&config);
    let err = fetcher.fetch(&listing_url(&server)).await.unwrap_err();

    let FetchError::Exhausted { attempts, last, .. } = err;
    assert_eq!(attempts, config.fetch.max_retries);
    assert_eq!(last, AttemptOutcome::HttpStatus { status: 500 });
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        config.fetch.max_retries as usize
    );
}

#[tokio::test]
async fn test_unreachable_host_is_transport_failure() {
    let mut config = create_test_config();
    config.fetch.max_retries = 2;
    config.fetch.connect_timeout_secs = 1;
    let fetcher = direct_fetcher(&config);

    let url = Url::parse("http://127.0.0.1:1/register.php").unwrap();
    let FetchError::Exhausted { attempts, last, .. } = fetcher.fetch(&url).await.unwrap_err();

    assert_eq!(attempts, 2);
    assert!(matches!(last, AttemptOutcome::Transport { .. }));
}

#[tokio::test]
async fn test_requests_respect_min_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.fetch.min_delay_ms = 100;
    let fetcher = Arc::new(direct_fetcher(&config));
    let url = listing_url(&server);

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        handles.push(tokio::spawn(async move { fetcher.fetch(&url).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Three request starts need at least two full gaps
    assert!(start.elapsed() >= Duration::from_millis(190));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_soft_blocking_proxy_is_evicted() {
    let blocking_proxy = MockServer::start().await;
    let working_proxy = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(403))
        .mount(&blocking_proxy)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("Firmenregister Liste"))
        .mount(&working_proxy)
        .await;

    let candidate = |server: &MockServer| {
        let addr = server.address();
        let mut c = ProxyCandidate::new(addr.ip().to_string(), addr.port(), ProxyProtocol::Http);
        c.mark_validated(chrono::Utc::now());
        c
    };
    let blocked = candidate(&blocking_proxy);
    let working = candidate(&working_proxy);

    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    store.replace_all(&[blocked.clone(), working.clone()]).unwrap();

    let mut config = create_test_config();
    config.proxy.enabled = true;
    let pool = ProxyPool::new(&config, store.clone()).unwrap();
    pool.initialize().await;
    assert_eq!(pool.len(), 2);

    let limiter = Arc::new(RateLimiter::new(config.fetch.min_delay()));
    let fetcher = ResilientFetcher::new(config.fetch.clone(), pool.clone(), limiter);

    let url = Url::parse("http://registry.test/register.php").unwrap();
    let body = fetcher.fetch(&url).await.unwrap();

    assert_eq!(body, "Firmenregister Liste");
    let remaining = pool.snapshot();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].same_endpoint(&working));

    let persisted = store.load().unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(persisted[0].same_endpoint(&working));
}
