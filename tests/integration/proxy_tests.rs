//! Integration tests for the proxy pool
//!
//! These tests use wiremock to create mock HTTP servers that serve proxy
//! lists and that act as the proxies being validated.

use chrono::Utc;
use registry_harvest::config::{Config, ProxySourceConfig, ProxySourceFormat};
use registry_harvest::proxy::{Egress, ProxyCandidate, ProxyPool, ProxyProtocol};
use registry_harvest::storage::{ProxyStore, SqliteProxyStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a proxy-enabled configuration with no list sources
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.target.base_url = "http://registry.test/".to_string();
    config.target.marker = "firmenregister".to_string();
    config.proxy.enabled = true;
    config.proxy.sources.clear();
    config.proxy.min_pool_size = 0;
    config.proxy.low_water_mark = 0;
    config.proxy.validation_timeout_secs = 2;
    config.fetch.request_timeout_secs = 5;
    config
}

fn fresh_candidate(address: &str, port: u16) -> ProxyCandidate {
    let mut c = ProxyCandidate::new(address, port, ProxyProtocol::Http);
    c.mark_validated(Utc::now());
    c
}

fn endpoint(server: &MockServer) -> String {
    let addr = server.address();
    format!("{}:{}", addr.ip(), addr.port())
}

/// A proxy stand-in answering every request with `body`
async fn fake_proxy(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

async fn list_server(route: &str, body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

async fn seeded_pool(config: &Config, candidates: &[ProxyCandidate]) -> ProxyPool {
    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    store.replace_all(candidates).unwrap();
    let pool = ProxyPool::new(config, store).unwrap();
    pool.initialize().await;
    pool
}

fn endpoint_of(egress: Egress) -> String {
    egress.proxy().map(|p| p.to_string()).unwrap_or_default()
}

#[tokio::test]
async fn test_next_visits_every_candidate_before_repeating() {
    let candidates: Vec<ProxyCandidate> = (1..=4)
        .map(|i| fresh_candidate(&format!("10.0.0.{}", i), 8080))
        .collect();
    let pool = seeded_pool(&create_test_config(), &candidates).await;

    let first: Vec<String> = (0..4).map(|_| endpoint_of(pool.next())).collect();
    let second: Vec<String> = (0..4).map(|_| endpoint_of(pool.next())).collect();

    assert_eq!(first, vec!["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.3:8080", "10.0.0.4:8080"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_disabled_pool_goes_direct() {
    let mut config = create_test_config();
    config.proxy.enabled = false;
    let pool = seeded_pool(&config, &[fresh_candidate("10.0.0.1", 8080)]).await;

    assert!(pool.next().is_direct());
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_stale_candidates_are_discarded() {
    let mut stale = ProxyCandidate::new("10.0.0.9", 3128, ProxyProtocol::Http);
    stale.mark_validated(Utc::now() - chrono::Duration::hours(48));

    let pool = seeded_pool(
        &create_test_config(),
        &[stale, fresh_candidate("10.0.0.1", 8080)],
    )
    .await;

    assert_eq!(pool.len(), 1);
    assert_eq!(endpoint_of(pool.next()), "10.0.0.1:8080");
}

#[tokio::test]
async fn test_failed_candidate_is_never_returned() {
    let candidates: Vec<ProxyCandidate> = (1..=3)
        .map(|i| fresh_candidate(&format!("10.0.0.{}", i), 8080))
        .collect();
    let pool = seeded_pool(&create_test_config(), &candidates).await;

    assert!(pool.mark_failed(&candidates[1]));
    assert!(!pool.mark_failed(&candidates[1]));

    for _ in 0..6 {
        assert_ne!(endpoint_of(pool.next()), "10.0.0.2:8080");
    }
    assert_eq!(pool.len(), 2);
}

#[tokio::test]
async fn test_eviction_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("proxies.db");
    let config = create_test_config();
    let candidates = [fresh_candidate("10.0.0.1", 8080), fresh_candidate("10.0.0.2", 8080)];

    {
        let store = Arc::new(SqliteProxyStore::new(&db).unwrap());
        store.replace_all(&candidates).unwrap();
        let pool = ProxyPool::new(&config, store).unwrap();
        pool.initialize().await;
        pool.mark_failed(&candidates[0]);
    }

    let store = Arc::new(SqliteProxyStore::new(&db).unwrap());
    let pool = ProxyPool::new(&config, store).unwrap();
    pool.initialize().await;

    let remaining = pool.snapshot();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].same_endpoint(&candidates[1]));
}

#[tokio::test]
async fn test_refresh_keeps_only_candidates_showing_marker() {
    let genuine = fake_proxy("<title>Firmenregister - Suche</title>").await;
    let portal = fake_proxy("<title>Hotel WiFi Login</title>").await;

    let list = format!("{}\n{}\n127.0.0.1:1\n", endpoint(&genuine), endpoint(&portal));
    let source = list_server("/http.txt", list).await;

    let mut config = create_test_config();
    config.proxy.sources = vec![ProxySourceConfig {
        url: format!("{}/http.txt", source.uri()),
        format: ProxySourceFormat::Plain,
    }];

    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    let pool = ProxyPool::new(&config, store.clone()).unwrap();
    let size = pool.refresh().await;

    assert_eq!(size, 1);
    assert_eq!(endpoint_of(pool.next()), endpoint(&genuine));

    let persisted = store.load().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].working_for_target, Some(true));
    assert!(persisted[0].last_validated_at.is_some());
}

#[tokio::test]
async fn test_refresh_without_candidates_keeps_pool() {
    let source = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&source)
        .await;

    let mut config = create_test_config();
    config.proxy.sources = vec![ProxySourceConfig {
        url: format!("{}/http.txt", source.uri()),
        format: ProxySourceFormat::Plain,
    }];

    let pool = seeded_pool(&config, &[fresh_candidate("10.0.0.1", 8080)]).await;
    assert_eq!(pool.refresh().await, 1);
    assert_eq!(endpoint_of(pool.next()), "10.0.0.1:8080");
}

#[tokio::test]
async fn test_later_sources_skipped_once_enough() {
    let genuine = fake_proxy("firmenregister").await;
    let plain = list_server("/http.txt", endpoint(&genuine)).await;

    let geonode_body = r#"{"data": [{"ip": "10.1.1.1", "port": "3128", "protocols": ["http"]}]}"#;
    let geonode = list_server("/api/proxy-list", geonode_body.to_string()).await;

    let mut config = create_test_config();
    config.proxy.enough_candidates = 1;
    config.proxy.sources = vec![
        ProxySourceConfig {
            url: format!("{}/http.txt", plain.uri()),
            format: ProxySourceFormat::Plain,
        },
        ProxySourceConfig {
            url: format!("{}/api/proxy-list", geonode.uri()),
            format: ProxySourceFormat::Geonode,
        },
    ];

    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    let pool = ProxyPool::new(&config, store).unwrap();

    assert_eq!(pool.refresh().await, 1);
    assert!(geonode.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initialize_refreshes_small_pool() {
    let genuine = fake_proxy("Firmenregister").await;
    let source = list_server("/http.txt", endpoint(&genuine)).await;

    let mut config = create_test_config();
    config.proxy.min_pool_size = 1;
    config.proxy.sources = vec![ProxySourceConfig {
        url: format!("{}/http.txt", source.uri()),
        format: ProxySourceFormat::Plain,
    }];

    let store = Arc::new(SqliteProxyStore::open_in_memory().unwrap());
    let pool = ProxyPool::new(&config, store).unwrap();
    pool.initialize().await;

    assert_eq!(pool.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_low_water_mark_triggers_background_refill() {
    let genuine = fake_proxy("firmenregister").await;
    let source = list_server("/http.txt", endpoint(&genuine)).await;

    let mut config = create_test_config();
    config.proxy.low_water_mark = 5;
    config.proxy.sources = vec![ProxySourceConfig {
        url: format!("{}/http.txt", source.uri()),
        format: ProxySourceFormat::Plain,
    }];

    let pool = seeded_pool(&config, &[fresh_candidate("10.0.0.1", 8080)]).await;
    assert_eq!(endpoint_of(pool.next()), "10.0.0.1:8080");

    let mut refilled = false;
    for _ in 0..100 {
        if pool.snapshot().iter().any(|c| c.to_string() == endpoint(&genuine)) {
            refilled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refilled);
}
