//! Mock MCP tool servers with static payloads, and an in-process connector for them.
//!
//! These stand in for real Gmail, Instagram and Slack integrations so the agent loop can be
//! exercised end to end without network access. [`streamable_http_service`] exposes the same
//! servers over HTTP for out-of-process clients.

use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::{ServerHandler, ServiceExt};
use tracing::{debug, warn};

use crate::mcp::BackendError;
use crate::registry::DiscoveryError;

pub mod mail;
pub mod slack;

pub use mail::MailServer;
pub use slack::SlackServer;

/// Port the mail server listens on in the demos.
pub const MAIL_SERVER_PORT: u16 = 8002;
/// Port the Slack server listens on in the demos.
pub const SLACK_SERVER_PORT: u16 = 8003;

/// Serve `handler` over an in-memory pipe and return the connected client session.
///
/// The server runs on a background task until the client session is dropped.
pub async fn connect_in_process<H: ServerHandler>(
    handler: H,
) -> Result<RunningService<RoleClient, ()>, DiscoveryError> {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);

    tokio::spawn(async move {
        match handler.serve(server_io).await {
            Ok(service) => match service.waiting().await {
                Ok(reason) => debug!("In-process MCP server stopped: {:?}", reason),
                Err(e) => warn!("In-process MCP server task failed: {}", e),
            },
            Err(e) => warn!("In-process MCP server failed to start: {}", e),
        }
    });

    ().serve(client_io)
        .await
        .map_err(|e| DiscoveryError::Backend(BackendError::Transport(e.to_string())))
}

/// Streamable-HTTP MCP endpoint serving a fresh handler from `factory` per session.
///
/// The result is a tower service; mount it on any HTTP router, e.g.
/// `axum::Router::new().nest_service("/mcp", service)`.
pub fn streamable_http_service<H, F>(factory: F) -> StreamableHttpService<H, LocalSessionManager>
where
    H: ServerHandler,
    F: Fn() -> H + Send + Sync + 'static,
{
    StreamableHttpService::new(
        move || Ok(factory()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    )
}
