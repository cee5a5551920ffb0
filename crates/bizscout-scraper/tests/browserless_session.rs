//! Integration tests for the Browserless-backed browser session.
//!
//! Uses `wiremock` to stand up a fake rendering backend for each test so no
//! real browser or network traffic is involved.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bizscout_scraper::{BrowserLauncher, BrowserlessLauncher, ScraperError};

const TIMEOUT: Duration = Duration::from_secs(5);

fn launcher(server: &MockServer, token: Option<&str>) -> BrowserlessLauncher {
    BrowserlessLauncher::new(&server.uri(), token, "bizscout-test/0.1")
        .expect("failed to build test BrowserlessLauncher")
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Browser": "Chrome" })))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// launch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_fails_with_capability_unavailable_when_version_check_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = launcher(&server, None).launch().await;
    assert!(
        matches!(result, Err(ScraperError::CapabilityUnavailable { .. })),
        "expected CapabilityUnavailable"
    );
}

#[tokio::test]
async fn launch_fails_when_backend_is_unreachable() {
    let launcher = BrowserlessLauncher::new("http://127.0.0.1:9", None, "ua").unwrap();
    let result = launcher.launch().await;
    assert!(matches!(
        result,
        Err(ScraperError::CapabilityUnavailable { .. })
    ));
}

#[tokio::test]
async fn token_is_sent_as_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .and(query_param("token", "s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = launcher(&server, Some("s3cret")).launch().await;
    assert!(session.is_ok(), "expected the token-matching version check to succeed");
}

// ---------------------------------------------------------------------------
// navigate / read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn navigate_renders_with_network_idle_and_exposes_dom() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .and(body_partial_json(json!({
            "url": "https://ig.test/acme/",
            "gotoOptions": { "waitUntil": "networkidle2" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><header><section><h2>Acme</h2></section></header></body></html>"#,
        ))
        .mount(&server)
        .await;

    let mut session = launcher(&server, None).launch().await.unwrap();
    session
        .navigate("https://ig.test/acme/", TIMEOUT)
        .await
        .expect("navigate failed");

    assert_eq!(session.current_url(), Some("https://ig.test/acme/"));
    assert_eq!(session.read_text("header h2").unwrap().as_deref(), Some("Acme"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn navigate_maps_client_errors_to_navigation_failure() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let mut session = launcher(&server, None).launch().await.unwrap();
    let result = session.navigate("https://ig.test/gone/", TIMEOUT).await;
    assert!(matches!(
        result,
        Err(ScraperError::Navigation { status: 404, .. })
    ));
}

// ---------------------------------------------------------------------------
// wait_for_element
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wait_for_element_rerenders_with_wait_for_selector() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .and(body_partial_json(json!({ "waitForSelector": { "selector": "article a" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><article><a href="/p/1/">1</a></article></body></html>"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let mut session = launcher(&server, None).launch().await.unwrap();
    session.navigate("https://ig.test/explore/tags/x/", TIMEOUT).await.unwrap();
    assert!(!session.exists("article a").unwrap());

    session
        .wait_for_element("article a", TIMEOUT)
        .await
        .expect("element should appear after re-render");
    assert!(session.exists("article a").unwrap());
}

#[tokio::test]
async fn wait_for_element_reports_backend_timeout() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .and(body_partial_json(json!({ "waitForSelector": { "selector": "header section" } })))
        .respond_with(ResponseTemplate::new(408).set_body_string("Timeout waiting for selector"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let mut session = launcher(&server, None).launch().await.unwrap();
    session.navigate("https://ig.test/acme/", TIMEOUT).await.unwrap();
    let result = session.wait_for_element("header section", TIMEOUT).await;
    assert!(matches!(result, Err(ScraperError::Timeout { .. })));
}

#[tokio::test]
async fn wait_for_element_without_page_is_an_error() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    let mut session = launcher(&server, None).launch().await.unwrap();
    let result = session.wait_for_element("header", TIMEOUT).await;
    assert!(matches!(result, Err(ScraperError::NoPage { .. })));
}
