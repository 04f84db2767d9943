mod common;

use common::{call, init_tracing, MockClient};
use nonempty::nonempty;
use serde_json::json;
use toolloop::model::{Message, Response, ToolOutcome};
use toolloop::providers::{Ollama, OpenAi, Provider};
use toolloop::servers::{connect_in_process, MailServer, SlackServer};
use toolloop::{Agent, ToolRegistry};

#[test]
fn test_client_creation() {
    let client = OpenAi::create("test-key".to_string(), "gpt-4o-mini".to_string());
    assert_eq!(client.model_options().model, "gpt-4o-mini");

    let local = Ollama::create(String::new(), "llama3.1".to_string());
    assert_eq!(local.model_options().model, "llama3.1");
}

#[test]
fn test_transcript_serializes_tagged_messages() {
    let msg = Message::user("Hello");

    assert_eq!(msg.text(), Some("Hello"));
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({ "type": "user_text", "text": "Hello" })
    );
}

#[tokio::test]
async fn test_gmail_agent_end_to_end() {
    init_tracing();
    let mut registry = ToolRegistry::new();
    registry
        .register(connect_in_process(MailServer::new()).await.unwrap())
        .await
        .unwrap();

    let client = MockClient::new(vec![
        Response::tool_calls(nonempty![call(
            "call_1",
            "get_gmail_emails",
            json!({ "max_results": 3 })
        )]),
        Response::text("Your latest emails are Sample Email 1, 2 and 3."),
    ]);
    let agent = Agent::new(client.clone(), registry);

    let answer = agent.run("Get my latest 3 emails from Gmail").await.unwrap();
    assert_eq!(answer, "Your latest emails are Sample Email 1, 2 and 3.");

    let second = client.request(1);
    let result = match second.last().unwrap() {
        Message::ToolResult(result) => result,
        other => panic!("Expected tool result, got {:?}", other),
    };
    match &result.outcome {
        ToolOutcome::Success { content } => {
            let emails = content["emails"].as_array().unwrap();
            assert_eq!(emails.len(), 3);
            assert_eq!(emails[0]["subject"], "Sample Email 1");
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slack_agent_parallel_batch() {
    let mut registry = ToolRegistry::new();
    registry
        .register(connect_in_process(SlackServer::new()).await.unwrap())
        .await
        .unwrap();

    let client = MockClient::new(vec![
        Response::tool_calls(nonempty![
            call("call_1", "list_channels", json!({})),
            call("call_2", "get_workspace_info", json!({})),
            call("call_3", "send_message", json!({ "channel": "general" })),
        ]),
        Response::text("Done."),
    ]);
    let agent = Agent::new(client, registry);

    let completion = agent
        .run_with_cancel(
            "Summarize the workspace",
            &tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap();

    let results: Vec<_> = completion.transcript.tool_results().collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "call_1");
    assert!(!results[0].is_failure());
    assert!(!results[1].is_failure());
    // Missing `text` is caught before the server sees it.
    assert!(results[2].is_failure());
}
