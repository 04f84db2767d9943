use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use toolloop::options::{ModelOptions, TransportOptions};
use toolloop::providers::{OpenAi, Provider};
use toolloop::servers::{connect_in_process, MailServer, SlackServer};
use toolloop::{Agent, AgentError, Client, ToolRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    // ============================================================================================
    // Step 1: Connect the mock tool servers
    // ============================================================================================
    // Both servers run in-process over an in-memory pipe. Any other `rmcp` client session
    // (stdio, streamable HTTP) can be registered the same way.
    let mut registry = ToolRegistry::new();
    registry
        .register(connect_in_process(MailServer::new()).await?)
        .await?;
    registry
        .register(connect_in_process(SlackServer::new()).await?)
        .await?;

    for descriptor in registry.descriptors() {
        println!("- {}: {}", descriptor.name, descriptor.description);
    }

    // ============================================================================================
    // Step 2: Setup the model client
    // ============================================================================================
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let client = OpenAi::create_with_options(
        api_key,
        ModelOptions::new(model).with_system(
            "You are a helpful assistant with access to Gmail, Instagram and Slack tools.",
        ),
        TransportOptions::default(),
    );

    // The registry is discovered once and shared by every query below.
    let agent = Agent::new(client, registry).with_max_iterations(10);

    // ============================================================================================
    // Step 3: Answer queries
    // ============================================================================================
    // With arguments, answer that one query. Otherwise read queries until `quit`.
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !query.is_empty() {
        return answer(&agent, &query).await;
    }

    println!("\nAsk about emails, Instagram profiles or Slack. Type 'quit' or 'exit' to stop.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYour query: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        // One failed query does not end the session.
        if let Err(e) = answer(&agent, query).await {
            eprintln!("Error: {}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn answer<C: Client>(agent: &Agent<C>, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    match agent.run(query).await {
        Ok(answer) => println!("{}", answer),
        Err(AgentError::MaxIterationsExceeded { limit, transcript }) => {
            eprintln!("Gave up after {} model calls", limit);
            if let Some(failure) = transcript.last_failure() {
                eprintln!("Last tool failure: {}", failure.render());
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
