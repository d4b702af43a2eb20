//! End-to-end tests: launch the real provider binary and talk to it

use base64::{engine::general_purpose::STANDARD, Engine as _};
use provider_harness::config::CallableRef;
use provider_harness::launcher::{start_provider, with_provider, LaunchOptions, StartupError};
use provider_harness::ProviderConfig;
use serde_json::{json, Value};
use std::time::Duration;

const PROVIDER_BIN: &str = env!("CARGO_BIN_EXE_provider-harness");

fn options(config: ProviderConfig) -> LaunchOptions {
    LaunchOptions::new(PROVIDER_BIN, config).with_startup_timeout(Duration::from_secs(20))
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .no_proxy()
        .build()
        .expect("client")
}

#[tokio::test]
async fn test_session_serves_ping_and_hello() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "hello"));
    let session = start_provider(options(config))
        .await
        .expect("provider should start");
    let client = client();

    let ping = client
        .get(session.endpoint("/_test/ping").unwrap())
        .send()
        .await
        .expect("ping");
    assert_eq!(ping.status(), 200);
    assert_eq!(ping.text().await.unwrap(), "pong");

    let produce = client
        .post(session.endpoint("/produce_message").unwrap())
        .json(&json!({ "description": "a hello message" }))
        .send()
        .await
        .expect("produce");
    assert_eq!(produce.status(), 200);
    assert_eq!(produce.headers()["content-type"], "text/plain");
    assert!(produce.headers().get("pact-message-metadata").is_none());
    assert_eq!(produce.text().await.unwrap(), "hello");

    session.shutdown().await.expect("provider should exit");
}

#[tokio::test]
async fn test_failing_handler_returns_500() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "boom"));
    let session = start_provider(options(config))
        .await
        .expect("provider should start");

    let produce = client()
        .post(session.endpoint("/produce_message").unwrap())
        .json(&json!({}))
        .send()
        .await
        .expect("produce");
    assert_eq!(produce.status(), 500);
    assert_eq!(produce.text().await.unwrap(), "boom");
}

#[tokio::test]
async fn test_product_event_with_state_and_custom_routes() {
    let config = ProviderConfig::new(CallableRef::new("products", "product_event"))
        .with_state_provider(CallableRef::new("products", "given"))
        .with_produce_message_url("/pact-messages")
        .with_set_provider_state_url("/pact-state");
    let session = start_provider(options(config))
        .await
        .expect("provider should start");
    let client = client();

    let set_state = client
        .post(
            session
                .endpoint("/pact-state?state=a%20product%20event%20delete")
                .unwrap(),
        )
        .send()
        .await
        .expect("set state");
    assert_eq!(set_state.status(), 200);
    assert_eq!(set_state.text().await.unwrap(), "Provider state set");

    let produce = client
        .post(session.endpoint("/pact-messages").unwrap())
        .json(&json!({ "description": "a product event update" }))
        .send()
        .await
        .expect("produce");
    assert_eq!(produce.status(), 200);
    assert_eq!(produce.headers()["content-type"], "application/json");

    let metadata = produce.headers()["pact-message-metadata"]
        .to_str()
        .unwrap()
        .to_string();
    let metadata: Value = serde_json::from_slice(&STANDARD.decode(metadata).unwrap()).unwrap();
    assert_eq!(metadata, json!({ "kafka_topic": "products" }));

    let event: Value = produce.json().await.unwrap();
    assert_eq!(event["event"], "UPDATED");
    assert_eq!(event["id"], "some-uuid-1234-5678");
    assert_eq!(event["version"], "v2");

    session.shutdown().await.expect("provider should exit");
}

#[tokio::test]
async fn test_unknown_handler_fails_startup() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "missing"));

    let result = start_provider(options(config)).await;

    match result {
        Err(StartupError::ExitedBeforeAnnouncing { stderr, .. }) => {
            assert!(stderr.contains("missing"), "stderr was {:?}", stderr);
        }
        Err(other) => panic!("expected early exit, got {:?}", other),
        Ok(_) => panic!("unknown handler should not start"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_sends_sigint_and_provider_exits_cleanly() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "hello"));
    let session = start_provider(options(config))
        .await
        .expect("provider should start");
    assert!(session.pid().is_some());

    let status = tokio::time::timeout(Duration::from_secs(10), session.shutdown())
        .await
        .expect("provider should exit after SIGINT")
        .expect("wait should succeed");
    assert!(status.success(), "graceful shutdown should exit 0: {}", status);
}

#[tokio::test]
async fn test_with_provider_scopes_the_session() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "hello"));

    let body = with_provider(options(config), |url| async move {
        client()
            .post(format!("{}produce_message", url))
            .send()
            .await
            .expect("produce")
            .text()
            .await
            .expect("body")
    })
    .await
    .expect("provider should start");

    assert_eq!(body, "hello");
}

#[test]
fn test_usage_error_exits_with_code_1() {
    let output = std::process::Command::new(PROVIDER_BIN)
        .args(["fixtures", "hello"])
        .output()
        .expect("run provider binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:"), "stderr was {:?}", stderr);
}
