use std::time::Duration;
use toolloop::options::{AgentOptions, ModelOptions, TransportOptions, DEFAULT_MAX_ITERATIONS};
use toolloop::providers::OpenAiModel;

#[test]
fn test_transport_options_builder() {
    let options = TransportOptions::new()
        .with_timeout(Duration::from_secs(30))
        .with_proxy("http://proxy.example.com".to_string())
        .with_header("X-Custom-Header".to_string(), "Value".to_string());

    match options {
        TransportOptions::Http {
            timeout,
            proxy,
            headers,
        } => {
            assert_eq!(timeout, Some(Duration::from_secs(30)));
            assert_eq!(proxy, Some("http://proxy.example.com".to_string()));

            let headers = headers.unwrap();
            assert_eq!(headers.get("X-Custom-Header"), Some(&"Value".to_string()));
        }
    }
}

#[test]
fn test_model_options_new() {
    let options: ModelOptions<OpenAiModel> = ModelOptions::new("gpt-4o-mini");

    assert_eq!(options.model, "gpt-4o-mini");
    assert_eq!(options.system, None);
    assert_eq!(options.temperature, None);
    assert_eq!(options.max_tokens, None);
    assert_eq!(options.provider.parallel_tool_calls, None);
}

#[test]
fn test_model_options_custom() {
    let mut options = ModelOptions::<OpenAiModel>::new("gpt-4o-mini")
        .with_system("You are a helpful assistant.")
        .with_temperature(0.7)
        .with_max_tokens(100);
    options.provider.parallel_tool_calls = Some(true);

    assert_eq!(options.system.as_deref(), Some("You are a helpful assistant."));
    assert_eq!(options.temperature, Some(0.7));
    assert_eq!(options.max_tokens, Some(100));

    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(json["provider"]["parallel_tool_calls"], true);
    assert!(json.get("top_p").is_none());
}

#[test]
fn test_agent_options_from_partial_config() {
    let options: AgentOptions = serde_json::from_str(r#"{ "max_iterations": 5 }"#).unwrap();

    assert_eq!(options.max_iterations, 5);
    assert!(options.parallel_tool_calls);

    let defaults: AgentOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, AgentOptions::default());
    assert_eq!(defaults.max_iterations, DEFAULT_MAX_ITERATIONS);
}
