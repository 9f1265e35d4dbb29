// Integration tests for `AferoClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use afero_api::{AferoClient, Endpoints, Error, RawState, RetryPolicy};

// ── Helpers ─────────────────────────────────────────────────────────

const ACCOUNT: &str = "acct-1";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

async fn setup() -> (MockServer, AferoClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = AferoClient::with_client(
        reqwest::Client::new(),
        Endpoints::custom(base.clone(), base),
        SecretString::from("token-abc"),
        fast_retry(),
    );

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountAccess": [{ "account": { "accountId": ACCOUNT } }]
        })))
        .mount(&server)
        .await;

    (server, client)
}

fn power_on() -> Vec<RawState> {
    vec![RawState {
        function_class: "power".into(),
        function_instance: None,
        value: json!("on"),
        last_update_time: 1,
    }]
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_metadevices_sends_bearer_and_expansion() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices")))
        .and(query_param("expansions", "state"))
        .and(header("authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "light-1",
                "typeId": "metadevice.device",
                "deviceId": "parent-1",
                "friendlyName": "Kitchen",
                "description": {
                    "defaultImage": "ceiling-fan-icon",
                    "device": { "defaultName": "Light", "deviceClass": "light", "model": "L1" }
                },
                "state": {
                    "metadeviceId": "light-1",
                    "values": [
                        { "functionClass": "power", "value": "on", "lastUpdateTime": 10 }
                    ]
                }
            }
        ])))
        .mount(&server)
        .await;

    let devices = client.list_metadevices().await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "light-1");
    assert_eq!(devices[0].description.device.device_class.as_deref(), Some("light"));
    assert_eq!(devices[0].state.values[0].value, json!("on"));
}

#[tokio::test]
async fn test_account_id_is_cached() {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = AferoClient::with_client(
        reqwest::Client::new(),
        Endpoints::custom(base.clone(), base),
        SecretString::from("t"),
        fast_retry(),
    );

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountAccess": [{ "account": { "accountId": "cached" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.account_id().await.unwrap(), "cached");
    assert_eq!(client.account_id().await.unwrap(), "cached");
}

#[tokio::test]
async fn test_put_state_payload_shape() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices/light-1/state")))
        .and(body_json(json!({
            "metadeviceId": "light-1",
            "values": [
                { "functionClass": "power", "functionInstance": null, "value": "on", "lastUpdateTime": 1 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.put_state("light-1", &power_on()).await.unwrap();
}

// ── Retry and failure paths ─────────────────────────────────────────

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, client) = setup().await;
    let state_path = format!("/v1/accounts/{ACCOUNT}/metadevices/light-1/state");

    Mock::given(method("PUT"))
        .and(path(state_path.clone()))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(state_path))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    client.put_state("light-1", &power_on()).await.unwrap();
}

#[tokio::test]
async fn test_retries_exhausted() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices/light-1/state")))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.put_state("light-1", &power_on()).await.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_auth() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_metadevices().await.unwrap_err();
    assert!(err.is_auth_invalid());
}

#[tokio::test]
async fn test_forbidden() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.list_metadevices().await.unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }));
}

#[tokio::test]
async fn test_bad_request_is_invalid_payload() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices/light-1/state")))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad value"))
        .mount(&server)
        .await;

    let err = client.put_state("light-1", &power_on()).await.unwrap_err();
    match err {
        Error::InvalidPayload { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad value");
        }
        other => panic!("expected InvalidPayload, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_account() {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = AferoClient::with_client(
        reqwest::Client::new(),
        Endpoints::custom(base.clone(), base),
        SecretString::from("t"),
        fast_retry(),
    );

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accountAccess": [] })))
        .mount(&server)
        .await;

    let err = client.account_id().await.unwrap_err();
    assert!(matches!(err, Error::MissingAccount));
}

#[tokio::test]
async fn test_token_swap_applies_to_next_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{ACCOUNT}/metadevices")))
        .and(header("authorization", "Bearer rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client.set_token(SecretString::from("rotated"));
    assert!(client.list_metadevices().await.unwrap().is_empty());
}
