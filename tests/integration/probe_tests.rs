//! Integration tests for CMS probing
//!
//! These tests use wiremock to serve company homepages and their
//! `/backend` and `/admin` paths.

use registry_harvest::cms::CmsProbe;
use registry_harvest::config::ProbeConfig;
use registry_harvest::record::{CmsStatus, Field, Record};
use std::time::Duration;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config() -> ProbeConfig {
    ProbeConfig {
        timeout_secs: 1,
        ..ProbeConfig::default()
    }
}

fn company(homepage: Option<String>) -> Record {
    let mut record = Record::new();
    record.set(Field::Name, "Muster GmbH");
    if let Some(homepage) = homepage {
        record.set(Field::Homepage, homepage);
    }
    record
}

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn requested(server: &MockServer, route: &str) -> bool {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .any(|r| r.url.path() == route)
}

#[tokio::test]
async fn test_homepage_marker_stops_probing() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<meta name="generator" content="typo3 CMS">"#).await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_a, Some(CmsStatus::Likely));
    assert_eq!(enriched.platform_b, None);
    assert!(!requested(&server, "/backend").await);
}

#[tokio::test]
async fn test_backend_marker_is_likely() {
    let server = MockServer::start().await;
    serve(&server, "/", "<html>Willkommen</html>").await;
    serve(&server, "/backend", "<html>shopware Administration</html>").await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_a, None);
    assert_eq!(enriched.platform_b, Some(CmsStatus::Likely));
    assert!(!requested(&server, "/admin").await);
}

#[tokio::test]
async fn test_admin_strong_marker_is_likely() {
    let server = MockServer::start().await;
    serve(&server, "/", "<html>Willkommen</html>").await;
    serve(&server, "/admin", "Das ist wahrscheinlich shopware").await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_b, Some(CmsStatus::Likely));
}

#[tokio::test]
async fn test_weak_hint_is_possibly() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<div class="sw-header">Shop</div>"#).await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_a, None);
    assert_eq!(enriched.platform_b, Some(CmsStatus::Possibly));
}

#[tokio::test]
async fn test_no_marker_anywhere_is_likely_not() {
    let server = MockServer::start().await;
    // /backend and /admin answer 404, which still counts as an answer
    serve(&server, "/", "<html>Handwerksbetrieb</html>").await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_a, Some(CmsStatus::LikelyNot));
    assert_eq!(enriched.platform_b, Some(CmsStatus::LikelyNot));
}

#[tokio::test]
async fn test_unresponsive_site_is_probe_error() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(server.uri()))).await;

    assert_eq!(enriched.platform_a, Some(CmsStatus::ProbeError));
    assert_eq!(enriched.platform_b, Some(CmsStatus::ProbeError));
}

#[tokio::test]
async fn test_homepage_without_scheme() {
    let server = MockServer::start().await;
    serve(&server, "/", "powered by typo3").await;

    let addr = server.address();
    let homepage = format!("{}:{}", addr.ip(), addr.port());

    let probe = CmsProbe::new(&create_test_config()).unwrap();
    let enriched = probe.enrich(company(Some(homepage))).await;

    assert_eq!(enriched.platform_a, Some(CmsStatus::Likely));
}

#[tokio::test]
async fn test_enrich_all_keeps_input_order() {
    let server = MockServer::start().await;
    serve(&server, "/alpha", "typo3").await;
    serve(&server, "/beta", "nothing here").await;
    serve(&server, "/gamma/backend", "shopware").await;
    serve(&server, "/gamma", "plain").await;

    let records = vec![
        company(Some(format!("{}/alpha", server.uri()))),
        company(None),
        company(Some(format!("{}/beta", server.uri()))),
        company(Some(format!("{}/gamma", server.uri()))),
    ];

    let probe = CmsProbe::new(&ProbeConfig {
        concurrency: 4,
        ..create_test_config()
    })
    .unwrap();
    let enriched = probe.enrich_all(records.clone()).await;

    assert_eq!(enriched.len(), 4);
    for (out, input) in enriched.iter().zip(&records) {
        assert_eq!(&out.record, input);
    }
    assert_eq!(enriched[0].platform_a, Some(CmsStatus::Likely));
    assert_eq!(enriched[1].platform_a, None);
    assert_eq!(enriched[1].platform_b, None);
    assert_eq!(enriched[2].platform_b, Some(CmsStatus::LikelyNot));
    assert_eq!(enriched[3].platform_b, Some(CmsStatus::Likely));
}
