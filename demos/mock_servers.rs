use std::net::SocketAddr;
use toolloop::servers::{
    streamable_http_service, MailServer, SlackServer, MAIL_SERVER_PORT, SLACK_SERVER_PORT,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ============================================================================================
    // Step 1: Build the MCP endpoints
    // ============================================================================================
    // Each session gets its own handler; the payloads are static, so nothing is shared.
    let mail = axum::Router::new().nest_service("/mcp", streamable_http_service(MailServer::new));
    let slack = axum::Router::new().nest_service("/mcp", streamable_http_service(SlackServer::new));

    // ============================================================================================
    // Step 2: Serve them
    // ============================================================================================
    // Point `remote_server` (or any MCP client) at http://localhost:8002/mcp or
    // http://localhost:8003/mcp.
    let mail_addr = SocketAddr::from(([0, 0, 0, 0], MAIL_SERVER_PORT));
    let slack_addr = SocketAddr::from(([0, 0, 0, 0], SLACK_SERVER_PORT));
    let mail_listener = tokio::net::TcpListener::bind(mail_addr).await?;
    let slack_listener = tokio::net::TcpListener::bind(slack_addr).await?;
    info!("Mail server listening on http://{}/mcp", mail_addr);
    info!("Slack server listening on http://{}/mcp", slack_addr);

    tokio::try_join!(
        async {
            axum::serve(mail_listener, mail)
                .with_graceful_shutdown(shutdown())
                .await
        },
        async {
            axum::serve(slack_listener, slack)
                .with_graceful_shutdown(shutdown())
                .await
        },
    )?;

    info!("Servers stopped");
    Ok(())
}

async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
