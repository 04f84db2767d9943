use futures::StreamExt;
use rmcp::{transport::StreamableHttpClientTransport, ServiceExt};
use std::time::Duration;
use toolloop::{
    providers::{OpenAi, Provider},
    servers::MAIL_SERVER_PORT,
    Agent, AgentEvent, ToolRegistry,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ============================================================================================
    // Step 1: Connect to an external MCP server (Streamable HTTP)
    // ============================================================================================
    // Pass the server URL as the first argument; the default is the mail server started by the
    // `mock_servers` demo. For stdio or SSE transports, see the `rmcp` documentation; every
    // client session registers the same way.
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("http://localhost:{}/mcp", MAIL_SERVER_PORT));
    println!("Connecting to {}...", url);

    let transport = StreamableHttpClientTransport::from_uri(url);
    let session = ().serve(transport).await?;

    // ============================================================================================
    // Step 2: Discover its tools
    // ============================================================================================
    // Remote calls get a time limit so a hung server turns into a tool failure the model can
    // react to.
    let mut registry = ToolRegistry::new().with_call_timeout(Duration::from_secs(30));
    let tools = registry.register(session).await?;
    println!("Discovered {} tools", tools.len());
    for tool in &tools {
        println!("- {}", tool.name);
    }

    // ============================================================================================
    // Step 3: Stream an agent run
    // ============================================================================================
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");
    let client = OpenAi::create(api_key, "gpt-4o-mini".to_string());
    let agent = Agent::new(client, registry);

    let mut events = agent.run_stream("Get my latest 3 emails from Gmail", None);
    while let Some(event) = events.next().await {
        match event? {
            AgentEvent::ToolCallStarted(req) => println!("> {}({})", req.name, req.arguments),
            AgentEvent::ToolCallFinished(result) => println!("< {}", result.render()),
            AgentEvent::PartialText(delta) => print!("{}", delta),
            AgentEvent::FinalText(_) => println!(),
        }
    }

    Ok(())
}
