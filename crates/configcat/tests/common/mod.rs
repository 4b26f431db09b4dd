#![allow(dead_code)]

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A config covering every setting type, a targeting rule and a percentage rollout.
pub fn sample_config() -> serde_json::Value {
    json!({
        "p": {"u": "https://cdn-global.configcat.com", "r": 0},
        "f": {
            "keyBool": {"v": true, "t": 0, "i": "bool-default"},
            "keyInteger": {"v": 42, "t": 2, "i": "int-default"},
            "keyDouble": {"v": 2.5, "t": 3, "i": "double-default"},
            "keyString": {"v": "hello", "t": 1, "i": "string-default"},
            "bool30TrueAdvancedRules": {
                "v": false,
                "t": 0,
                "i": "advanced-default",
                "r": [
                    {"v": true, "a": "Email", "t": 2, "c": "@example.com", "i": "advanced-email"}
                ]
            },
            "rollout": {
                "v": "off",
                "t": 1,
                "i": "rollout-default",
                "p": [
                    {"v": "none", "p": 0, "i": "rollout-none"},
                    {"v": "all", "p": 100, "i": "rollout-all"}
                ]
            }
        }
    })
}

/// The same config with `keyString` changed.
pub fn changed_config() -> serde_json::Value {
    let mut config = sample_config();
    config["f"]["keyString"]["v"] = json!("changed");
    config
}

pub fn config_path(sdk_key: &str) -> String {
    format!("/configuration-files/{}/config_v5.json", sdk_key)
}

/// Mock CDN serving `body` for `sdk_key`.
pub async fn start_cdn(sdk_key: &str, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(config_path(sdk_key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Mock CDN that answers every request with `status`.
pub async fn start_failing_cdn(sdk_key: &str, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(config_path(sdk_key)))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
