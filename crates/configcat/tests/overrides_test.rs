mod common;

use common::{sample_config, start_cdn, wait_until};
use configcat::{ConfigCatClient, Hooks, OverrideBehaviour, OverrideDataSource, PollingMode, User};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_log::test;

fn local_values() -> OverrideDataSource {
    OverrideDataSource::map([
        ("keyString", json!("local")),
        ("localOnly", json!(true)),
    ])
}

#[test(tokio::test)]
async fn test_local_over_remote() {
    let sdk_key = "overrides-test-local-over-remote";
    let server = start_cdn(sdk_key, sample_config()).await;
    let client = ConfigCatClient::builder()
        .mode(PollingMode::manual_poll())
        .base_url(server.uri())
        .flag_overrides(local_values(), OverrideBehaviour::LocalOverRemote)
        .build(sdk_key)
        .unwrap();
    client.force_refresh().await;

    assert_eq!(client.get_value("keyString", None, String::new()).await, "local");
    assert!(client.get_value("localOnly", None, false).await);
    assert_eq!(client.get_value("keyInteger", None, 0i64).await, 42);
}

#[test(tokio::test)]
async fn test_remote_over_local() {
    let sdk_key = "overrides-test-remote-over-local";
    let server = start_cdn(sdk_key, sample_config()).await;
    let client = ConfigCatClient::builder()
        .mode(PollingMode::manual_poll())
        .base_url(server.uri())
        .flag_overrides(local_values(), OverrideBehaviour::RemoteOverLocal)
        .build(sdk_key)
        .unwrap();

    // only local values until the first download
    assert_eq!(client.get_value("keyString", None, String::new()).await, "local");

    client.force_refresh().await;
    assert_eq!(client.get_value("keyString", None, String::new()).await, "hello");
    assert!(client.get_value("localOnly", None, false).await);
}

#[test(tokio::test)]
async fn test_local_only_never_contacts_cdn() {
    let sdk_key = "overrides-test-local-only";
    let server = wiremock::MockServer::start().await;
    let client = ConfigCatClient::builder()
        .base_url(server.uri())
        .flag_overrides(local_values(), OverrideBehaviour::LocalOnly)
        .build(sdk_key)
        .unwrap();

    assert_eq!(client.get_value("keyString", None, String::new()).await, "local");
    assert!(!client.force_refresh().await.success);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[test(tokio::test)]
async fn test_file_with_targeting_rules() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("overrides.json");
    std::fs::write(
        &file,
        json!({
            "f": {
                "beta": {
                    "v": false,
                    "t": 0,
                    "r": [{"v": true, "a": "Country", "t": 0, "c": "Hungary, Austria", "i": "x"}]
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let client = ConfigCatClient::builder()
        .flag_overrides(OverrideDataSource::file(&file, false), OverrideBehaviour::LocalOnly)
        .build("overrides-test-file-rules")
        .unwrap();

    let hungarian = User::builder().country("Hungary").build("a");
    let german = User::builder().country("Germany").build("b");
    assert!(client.get_value("beta", Some(&hungarian), false).await);
    assert!(!client.get_value("beta", Some(&german), true).await);
}

#[test(tokio::test)]
async fn test_file_auto_reload() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("flags.json");
    std::fs::write(&file, r#"{"flags": {"enabled": false, "name": "first"}}"#).unwrap();

    let changes = Arc::new(AtomicUsize::new(0));
    let hooks = Arc::new(Hooks::new());
    {
        let changes = changes.clone();
        hooks.add_on_config_changed(move |_| {
            changes.fetch_add(1, Ordering::SeqCst);
        });
    }

    let client = ConfigCatClient::builder()
        .flag_overrides(OverrideDataSource::file(&file, true), OverrideBehaviour::LocalOnly)
        .hooks(hooks)
        .build("overrides-test-file-reload")
        .unwrap();

    assert!(!client.get_value("enabled", None, true).await);

    // give the watcher a moment before touching the file
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(&file, r#"{"flags": {"enabled": true, "name": "second"}}"#).unwrap();

    let reloaded = wait_until(Duration::from_secs(5), || changes.load(Ordering::SeqCst) > 0).await;
    assert!(reloaded, "file change was not picked up");
    assert!(client.get_value("enabled", None, false).await);
    assert_eq!(client.get_value("name", None, String::new()).await, "second");

    // a broken file keeps the previous values
    std::fs::write(&file, "{ not json").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(client.get_value("enabled", None, false).await);
}
