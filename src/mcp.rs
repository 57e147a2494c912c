//! MCP bridging: wraps tools exposed by an external MCP server as local
//! `Tool`s, so the Agent never needs to know a tool call crossed a process
//! boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::tools::{Action, Executor, Observation, Tool, ToolDef};

/// One tool as advertised by an MCP server's `tools/list` response.
#[derive(Debug, Clone)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// The transport contract an MCP server implementation must satisfy. Kept
/// separate from `Executor` because one connection serves many tools.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>>;
    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value>;
}

/// Lazily connects on first use and enumerates the server's tools exactly
/// once, regardless of how many local `Tool`s proxy through it.
pub struct McpServer<T> {
    transport: T,
    connected: OnceCell<()>,
}

impl<T: McpTransport> McpServer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, connected: OnceCell::new() }
    }

    async fn ensure_connected(&self) -> Result<()> {
        self.connected
            .get_or_try_init(|| async {
                self.transport.connect().await.map_err(|e| Error::tool_transport(e.to_string()))
            })
            .await?;
        Ok(())
    }

    /// Enumerate the remote server's tools and wrap each as a local `Tool`
    /// whose executor proxies calls over this connection.
    pub async fn bridged_tools(self: &Arc<Self>) -> Result<Vec<Tool>> {
        self.ensure_connected().await?;
        let descriptors = self.transport.list_tools().await.map_err(|e| Error::tool_transport(e.to_string()))?;
        Ok(descriptors
            .into_iter()
            .map(|d| Tool {
                def: ToolDef {
                    name: d.name.clone(),
                    description: d.description,
                    parameters_schema: d.input_schema,
                    dangerous: true,
                },
                executor: Box::new(McpToolExecutor { server: self.clone(), remote_name: d.name }),
            })
            .collect())
    }
}

/// Proxies a single tool's `Action`s over its owning `McpServer`'s
/// connection. Failures surface as `Error::ToolTransport`, which the
/// conversation driver converts into an error `Observation` rather than
/// aborting the run.
struct McpToolExecutor<T> {
    server: Arc<McpServer<T>>,
    remote_name: String,
}

#[async_trait]
impl<T: McpTransport> Executor for McpToolExecutor<T> {
    async fn execute(&self, action: &Action) -> Result<Observation> {
        self.server.ensure_connected().await?;
        match self.server.transport.call_tool(&self.remote_name, &action.arguments).await {
            Ok(result) => Ok(Observation::ok(result.to_string())),
            Err(Error::ToolTransport(msg)) => Err(Error::tool_transport(msg)),
            Err(other) => Err(Error::tool_transport(other.to_string())),
        }
    }
}
