//! Tool registry: discovery from back ends and validated dispatch.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mcp::{BackendError, ToolBackend};
use crate::model::{ToolRequest, ToolResult};
use crate::tools::{ToolDescriptor, ToolError};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("tool back end unreachable: {0}")]
    Backend(#[from] BackendError),
}

/// List a back end's catalog as descriptors.
///
/// Malformed entries are skipped with a warning; only an unreachable back end fails.
pub async fn discover(backend: &dyn ToolBackend) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
    let tools = backend.list_tools().await?;
    let mut descriptors: Vec<ToolDescriptor> = Vec::with_capacity(tools.len());

    for tool in &tools {
        match ToolDescriptor::try_from(tool) {
            Ok(descriptor) => {
                if descriptors.iter().any(|d| d.name == descriptor.name) {
                    warn!("Back end advertises `{}` twice, keeping the first", descriptor.name);
                    continue;
                }
                debug!("Discovered tool {}", descriptor.name);
                descriptors.push(descriptor);
            }
            Err(e) => warn!("Skipping malformed catalog entry `{}`: {}", tool.name, e),
        }
    }

    Ok(descriptors)
}

/// Name-indexed set of tools, each paired with the back end that serves it.
///
/// Built once, then shared read-only (typically behind an `Arc`) by agent runs.
#[derive(Default)]
pub struct ToolRegistry {
    backends: Vec<Arc<dyn ToolBackend>>,
    descriptors: Vec<ToolDescriptor>,
    /// Index into `backends`, parallel to `descriptors`.
    owners: Vec<usize>,
    by_name: HashMap<String, usize>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort back-end calls that take longer than `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Discover a back end's tools and add them to the registry.
    ///
    /// Returns the descriptors that were actually registered. A name already provided by an
    /// earlier back end is skipped.
    pub async fn register<B: ToolBackend + 'static>(
        &mut self,
        backend: B,
    ) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        self.register_shared(Arc::new(backend)).await
    }

    pub async fn register_shared(
        &mut self,
        backend: Arc<dyn ToolBackend>,
    ) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        let discovered = discover(backend.as_ref()).await?;
        self.backends.push(backend);
        let owner = self.backends.len() - 1;
        let added = self.insert_all(owner, discovered);
        info!(
            "Registered {} tools from back end #{} ({} total)",
            added.len(),
            owner,
            self.descriptors.len()
        );
        Ok(added)
    }

    /// Re-list every registered back end and rebuild the descriptor set.
    ///
    /// The registry is left untouched if any back end cannot be reached.
    pub async fn refresh(&mut self) -> Result<(), DiscoveryError> {
        let mut catalogs = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            catalogs.push(discover(backend.as_ref()).await?);
        }

        self.descriptors.clear();
        self.owners.clear();
        self.by_name.clear();
        for (owner, catalog) in catalogs.into_iter().enumerate() {
            self.insert_all(owner, catalog);
        }
        info!("Refreshed registry: {} tools", self.descriptors.len());
        Ok(())
    }

    fn insert_all(&mut self, owner: usize, catalog: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        let mut added = Vec::new();
        for descriptor in catalog {
            if self.by_name.contains_key(&descriptor.name) {
                warn!(
                    "Tool `{}` is already registered by another back end, skipping",
                    descriptor.name
                );
                continue;
            }
            self.by_name
                .insert(descriptor.name.clone(), self.descriptors.len());
            self.owners.push(owner);
            added.push(descriptor.clone());
            self.descriptors.push(descriptor);
        }
        added
    }

    /// Descriptors in discovery order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Validate `arguments` against the tool's schema and call its back end.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let descriptor = &self.descriptors[index];
        let backend = &self.backends[self.owners[index]];

        let args = descriptor
            .input_schema
            .validate(arguments)
            .map_err(|reason| ToolError::Validation {
                tool: name.to_string(),
                reason,
            })?;

        let call = AssertUnwindSafe(backend.call_tool(name, args)).catch_unwind();
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(BackendError::Timeout(limit))),
            },
            None => call.await,
        };

        outcome
            .unwrap_or_else(|panic| Err(BackendError::Panicked(panic_message(panic))))
            .map_err(|source| ToolError::Execution {
                tool: name.to_string(),
                source,
            })
    }

    /// Run one tool request. Every failure becomes a failed [`ToolResult`].
    pub async fn execute(&self, request: &ToolRequest) -> ToolResult {
        info!("Tool call requested: {}", request.name);
        debug!("Tool arguments: {}", request.arguments);

        match self.invoke(&request.name, &request.arguments).await {
            Ok(content) => {
                info!("Tool {} executed successfully", request.name);
                debug!("Tool result: {}", content);
                ToolResult::success(request, content)
            }
            Err(e) => {
                warn!("Tool {} execution failed: {}", request.name, e);
                ToolResult::failure(request, e.kind(), e.to_string())
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
