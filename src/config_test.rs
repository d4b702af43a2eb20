//! Tests for positional argument parsing

use super::*;

#[test]
fn test_from_args_with_all_arguments() {
    let config = ProviderConfig::from_args([
        "products",
        "product_event",
        "/messages",
        "products",
        "given",
        "/state",
    ])
    .expect("full argument list should parse");

    assert_eq!(config.handler, CallableRef::new("products", "product_event"));
    assert_eq!(config.produce_message_url, "/messages");
    assert_eq!(
        config.state_provider,
        Some(CallableRef::new("products", "given"))
    );
    assert_eq!(config.set_provider_state_url, "/state");
}

#[test]
fn test_from_args_rejects_fewer_than_four_arguments() {
    let result = ProviderConfig::from_args(["fixtures", "hello", "/produce_message"]);
    assert_eq!(result, Err(ConfigError::Usage(3)));
}

#[test]
fn test_from_args_empty_state_module_means_no_state_provider() {
    let config = ProviderConfig::from_args(["fixtures", "hello", "", ""])
        .expect("four arguments should parse");

    assert!(config.state_provider.is_none());
    assert_eq!(config.produce_message_url, DEFAULT_PRODUCE_MESSAGE_URL);
    assert_eq!(config.set_provider_state_url, DEFAULT_SET_PROVIDER_STATE_URL);
}

#[test]
fn test_from_args_state_module_without_function_is_an_error() {
    let result = ProviderConfig::from_args(["fixtures", "hello", "", "products"]);
    assert_eq!(
        result,
        Err(ConfigError::MissingStateFunction("products".to_string()))
    );
}

#[test]
fn test_validate_rejects_relative_route() {
    let config = ProviderConfig::new(CallableRef::new("fixtures", "hello"))
        .with_produce_message_url("produce");
    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidRoute("produce".to_string()))
    );
}

#[test]
fn test_validate_rejects_ping_and_duplicate_routes() {
    let ping = ProviderConfig::new(CallableRef::new("fixtures", "hello"))
        .with_set_provider_state_url(PING_PATH);
    assert!(matches!(
        ping.validate(),
        Err(ConfigError::ConflictingRoutes(_))
    ));

    let duplicate = ProviderConfig::new(CallableRef::new("fixtures", "hello"))
        .with_set_provider_state_url(DEFAULT_PRODUCE_MESSAGE_URL);
    assert!(matches!(
        duplicate.validate(),
        Err(ConfigError::ConflictingRoutes(_))
    ));
}

#[test]
fn test_to_args_matches_from_args_order() {
    let config = ProviderConfig::new(CallableRef::new("products", "product_event"))
        .with_state_provider(CallableRef::new("products", "given"));

    let args = config.to_args();
    assert_eq!(
        args,
        vec![
            "products",
            "product_event",
            "/produce_message",
            "products",
            "given",
            "/set_provider_state",
        ]
    );
    assert_eq!(ProviderConfig::from_args(args), Ok(config));
}

#[test]
fn test_to_args_without_state_provider_passes_empty_strings() {
    let args = ProviderConfig::new(CallableRef::new("fixtures", "hello")).to_args();
    assert_eq!(args[3], "");
    assert_eq!(args[4], "");
}

#[test]
fn test_callable_ref_display() {
    assert_eq!(
        CallableRef::new("products", "given").to_string(),
        "products.given"
    );
}

#[test]
fn test_usage_names_every_argument() {
    let text = usage("provider-harness");
    assert!(text.starts_with("Usage: provider-harness"));
    assert!(text.contains("<handler_module>"));
    assert!(text.contains("<set_provider_state_url>"));
}
