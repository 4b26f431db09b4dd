use configcat::{ConfigCatClient, OverrideBehaviour, OverrideDataSource, PollingMode};
use open_feature::provider::FeatureProvider;
use open_feature::{EvaluationContext, EvaluationErrorCode, EvaluationReason as Reason};
use open_feature_configcat::{ConfigCatProvider, ConfigCatProviderError};
use serde_json::json;
use std::sync::Arc;
use test_log::test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> serde_json::Value {
    json!({
        "f": {
            "enabled": {
                "v": false,
                "t": 0,
                "i": "enabled-off",
                "r": [{"v": true, "a": "Email", "t": 2, "c": "@example.com", "i": "enabled-on"}]
            },
            "greeting": {"v": "hello", "t": 1, "i": "greeting-default"},
            "limit": {"v": 10, "t": 2, "i": "limit-default"},
            "ratio": {"v": 0.25, "t": 3, "i": "ratio-default"},
            "rollout": {
                "v": "off",
                "t": 1,
                "p": [{"v": "on", "p": 100, "i": "rollout-on"}]
            }
        }
    })
}

async fn provider(sdk_key: &str) -> (ConfigCatProvider, MockServer) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/configuration-files/{}/config_v5.json", sdk_key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(config()))
        .mount(&server)
        .await;

    let client = ConfigCatClient::builder()
        .mode(PollingMode::manual_poll())
        .base_url(server.uri())
        .build(sdk_key)
        .unwrap();
    assert!(client.force_refresh().await.success);
    (ConfigCatProvider::from_client(Arc::new(client)), server)
}

#[test]
fn test_empty_sdk_key_fails() {
    let result = ConfigCatProvider::new("", configcat::ClientOptions::default());
    assert!(matches!(result, Err(ConfigCatProviderError::Config(_))));
}

#[test(tokio::test)]
async fn test_resolves_every_type() {
    let (provider, _server) = provider("provider-test-types").await;
    let context = EvaluationContext::default();

    let greeting = provider.resolve_string_value("greeting", &context).await.unwrap();
    assert_eq!(greeting.value, "hello");
    assert_eq!(greeting.variant.as_deref(), Some("greeting-default"));
    assert_eq!(greeting.reason, Some(Reason::Default));

    let limit = provider.resolve_int_value("limit", &context).await.unwrap();
    assert_eq!(limit.value, 10);

    let ratio = provider.resolve_float_value("ratio", &context).await.unwrap();
    assert_eq!(ratio.value, 0.25);

    let enabled = provider.resolve_bool_value("enabled", &context).await.unwrap();
    assert!(!enabled.value);

    assert_eq!(provider.metadata().name, "configcat");
}

#[test(tokio::test)]
async fn test_targeting_match() {
    let (provider, _server) = provider("provider-test-targeting").await;
    let context = EvaluationContext::default()
        .with_targeting_key("user-1")
        .with_custom_field("email", "jane@example.com");

    let enabled = provider.resolve_bool_value("enabled", &context).await.unwrap();
    assert!(enabled.value);
    assert_eq!(enabled.variant.as_deref(), Some("enabled-on"));
    assert_eq!(enabled.reason, Some(Reason::TargetingMatch));

    let rollout = provider.resolve_string_value("rollout", &context).await.unwrap();
    assert_eq!(rollout.value, "on");
    assert_eq!(rollout.reason, Some(Reason::TargetingMatch));
}

#[test(tokio::test)]
async fn test_errors() {
    let (provider, _server) = provider("provider-test-errors").await;
    let context = EvaluationContext::default();

    let missing = provider.resolve_bool_value("missing", &context).await.unwrap_err();
    assert_eq!(missing.code, EvaluationErrorCode::FlagNotFound);

    let mismatch = provider.resolve_int_value("greeting", &context).await.unwrap_err();
    assert_eq!(mismatch.code, EvaluationErrorCode::TypeMismatch);

    let structure = provider.resolve_struct_value("greeting", &context).await.unwrap_err();
    assert_eq!(structure.code, EvaluationErrorCode::TypeMismatch);

    assert!(provider.resolve_bool_value("", &context).await.is_err());
}

#[test(tokio::test)]
async fn test_not_ready_without_config() {
    let client = ConfigCatClient::builder()
        .mode(PollingMode::manual_poll())
        .offline(true)
        .build("provider-test-not-ready")
        .unwrap();
    let provider = ConfigCatProvider::from_client(Arc::new(client));

    let error = provider
        .resolve_bool_value("enabled", &EvaluationContext::default())
        .await
        .unwrap_err();
    assert_eq!(error.code, EvaluationErrorCode::ProviderNotReady);
}

#[test(tokio::test)]
async fn test_local_overrides() {
    let client = ConfigCatClient::builder()
        .flag_overrides(
            OverrideDataSource::map([("enabled", json!(true))]),
            OverrideBehaviour::LocalOnly,
        )
        .build("provider-test-overrides")
        .unwrap();
    let provider = ConfigCatProvider::from_client(Arc::new(client));

    let enabled = provider
        .resolve_bool_value("enabled", &EvaluationContext::default())
        .await
        .unwrap();
    assert!(enabled.value);
    assert_eq!(enabled.reason, Some(Reason::Default));
    assert_eq!(enabled.variant, None);
}
