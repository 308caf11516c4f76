#![allow(clippy::unwrap_used)]
// Integration tests for `BridgeDiscovery` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huelink_api::{BridgeDiscovery, Error};

async fn setup() -> (MockServer, BridgeDiscovery) {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&server.uri()).unwrap();
    let discovery = BridgeDiscovery::with_client(reqwest::Client::new(), endpoint);
    (server, discovery)
}

#[tokio::test]
async fn search_parses_candidates() {
    let (server, discovery) = setup().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "001788fffe23a1b2", "internalipaddress": "10.0.0.5" },
            { "id": "001788fffe99cc01", "internalipaddress": "10.0.0.6" }
        ])))
        .mount(&server)
        .await;

    let results = discovery.search().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "001788fffe23a1b2");
    assert_eq!(results[0].internal_ip_address, "10.0.0.5");
}

#[tokio::test]
async fn search_with_no_bridges_is_empty_not_error() {
    let (server, discovery) = setup().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let results = discovery.search().await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_reports_portal_failure() {
    let (server, discovery) = setup().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("portal down"))
        .mount(&server)
        .await;

    let err = discovery.search().await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 500, .. }), "got: {err:?}");
}
