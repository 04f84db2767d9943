//! # toolloop
//!
//! Connects a conversational model to tools discovered from MCP servers and lets the model
//! decide when to call them.
//!
//! ## Architecture
//!
//! 1. **Back ends** ([`ToolBackend`]) advertise a catalog of tools. Any `rmcp` client session
//!    is a back end; [`servers`] holds mock ones.
//! 2. The **registry** ([`ToolRegistry`]) discovers those catalogs once, validates arguments
//!    against each tool's schema and turns every tool failure into a typed [`ToolResult`].
//! 3. The **agent** ([`Agent`]) alternates between the model ([`Client`]) and the registry
//!    until the model answers in plain text, bounded by a maximum number of iterations.
//!
//! ## Example
//! ```no_run
//! use toolloop::providers::{OpenAi, Provider};
//! use toolloop::servers::{connect_in_process, MailServer};
//! use toolloop::{Agent, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = ToolRegistry::new();
//!     registry.register(connect_in_process(MailServer::new()).await?).await?;
//!
//!     let client = OpenAi::create("your-api-key".to_string(), "gpt-4o-mini".to_string());
//!     let agent = Agent::new(client, registry);
//!
//!     let answer = agent.run("Get my latest 3 emails from Gmail").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod api;
pub mod client;
pub mod http;
pub mod mcp;
pub mod model;
pub mod options;
pub mod providers;
pub mod registry;
pub mod servers;
pub mod sse;
pub mod tools;

pub use agent::{Agent, AgentError, AgentEvent, Completion};
pub use client::{Client, ClientError, StreamingClient};
pub use mcp::{BackendError, ToolBackend};
pub use model::{Message, Response, ToolRequest, ToolResult, Transcript};
pub use options::AgentOptions;
pub use registry::{DiscoveryError, ToolRegistry};
pub use tools::{ToolDescriptor, ToolError};

// Re-export rmcp for convenience
pub use rmcp;
