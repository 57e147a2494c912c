//! Tool registry and dispatch: typed Action/Observation schemas, the
//! `Executor` contract, and per-path schema emission.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

/// Result of executing an `Action`. Expected failures (non-zero shell exit,
/// a file not found) are represented here, not as an `Err` — executors only
/// return `Err` for programming/transport errors.
#[derive(Debug, Clone)]
pub struct Observation {
    pub content: String,
    pub is_error: bool,
}

impl Observation {
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }

    /// Render as content parts for LLM consumption.
    pub fn to_content_parts(&self) -> Vec<crate::types::ContentBlock> {
        vec![crate::types::ContentBlock::text(self.content.clone())]
    }
}

/// A normalized tool call awaiting execution.
#[derive(Debug, Clone)]
pub struct Action {
    pub tool_name: String,
    pub arguments: Value,
    pub call_id: String,
}

/// A registered tool's static declaration: name, description, JSON schema of
/// its arguments, and whether it requires confirmation by default.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub dangerous: bool,
}

impl ToolDef {
    /// The completions-path named-function schema shape.
    pub fn to_completions_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema,
            }
        })
    }

    /// The responses-path top-level function-tool shape with `strict: true`.
    pub fn to_responses_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_schema,
            "strict": true,
        })
    }
}

/// Executes a single `Action` for a registered tool. May own private state
/// (a long-lived shell); lives for the conversation's duration.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, action: &Action) -> Result<Observation>;
}

/// A lightweight, serializable reference to a registered tool plus its
/// construction parameters, held by the Agent instead of a concrete `Tool`.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub params: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Value::Null }
    }

    pub fn with_params(name: impl Into<String>, params: Value) -> Self {
        Self { name: name.into(), params }
    }
}

/// A resolved tool: its declaration plus a live executor.
pub struct Tool {
    pub def: ToolDef,
    pub executor: Box<dyn Executor>,
}

type ToolFactory = Box<dyn Fn(&Value) -> Result<Tool> + Send + Sync>;

/// Process-wide tool registry, resolved lazily once on first use. Holds
/// factories, not live tools, so each conversation gets its own executor
/// instances (a tool with a persistent shell must not be shared across
/// conversations).
pub struct ToolRegistry {
    factories: Mutex<HashMap<String, ToolFactory>>,
}

impl ToolRegistry {
    fn new() -> Self {
        let registry = Self { factories: Mutex::new(HashMap::new()) };
        registry.register("finish", |_params| Ok(build_finish_tool()));
        registry
    }

    /// Register a tool factory under `name`, overwriting any prior registration.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Tool> + Send + Sync + 'static,
    {
        let mut guard = self.factories.lock().expect("tool registry mutex poisoned");
        guard.insert(name.into(), Box::new(factory));
    }

    /// Resolve a `ToolSpec` into a concrete `Tool` + `Executor`, at `init_state` time.
    pub fn resolve(&self, spec: &ToolSpec) -> Result<Tool> {
        let guard = self.factories.lock().expect("tool registry mutex poisoned");
        let factory = guard
            .get(&spec.name)
            .ok_or_else(|| Error::tool(format!("no tool registered under name '{}'", spec.name)))?;
        factory(&spec.params)
    }
}

static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();

/// The process-wide tool registry, initialized on first access.
pub fn registry() -> &'static ToolRegistry {
    REGISTRY.get_or_init(ToolRegistry::new)
}

/// The distinguished built-in `finish` tool: no-arg, its executor signals
/// completion to the driver via an `AgentFinished` sentinel observation
/// rather than a side-effectful action.
pub const FINISH_SENTINEL: &str = "__agent_finished__";

struct FinishExecutor;

#[async_trait]
impl Executor for FinishExecutor {
    async fn execute(&self, _action: &Action) -> Result<Observation> {
        Ok(Observation::ok(FINISH_SENTINEL))
    }
}

fn build_finish_tool() -> Tool {
    Tool {
        def: ToolDef {
            name: "finish".to_string(),
            description: "Signal that the task is complete and no further actions are needed.".to_string(),
            parameters_schema: serde_json::json!({"type": "object", "properties": {}, "required": []}),
            dangerous: false,
        },
        executor: Box::new(FinishExecutor),
    }
}

/// Whether an `Observation` is the sentinel produced by the `finish` tool.
pub fn is_finish_observation(obs: &Observation) -> bool {
    !obs.is_error && obs.content == FINISH_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        async fn execute(&self, action: &Action) -> Result<Observation> {
            Ok(Observation::ok(action.arguments.to_string()))
        }
    }

    #[test]
    fn completions_schema_wraps_as_named_function() {
        let def = ToolDef {
            name: "bash".into(),
            description: "run a shell command".into(),
            parameters_schema: serde_json::json!({"type": "object"}),
            dangerous: true,
        };
        let schema = def.to_completions_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "bash");
    }

    #[test]
    fn responses_schema_is_flat_and_strict() {
        let def = ToolDef {
            name: "bash".into(),
            description: "run a shell command".into(),
            parameters_schema: serde_json::json!({"type": "object"}),
            dangerous: true,
        };
        let schema = def.to_responses_schema();
        assert_eq!(schema["name"], "bash");
        assert_eq!(schema["strict"], true);
    }

    #[test]
    fn finish_tool_is_registered_by_default() {
        let spec = ToolSpec::new("finish");
        let tool = registry().resolve(&spec).unwrap();
        assert_eq!(tool.def.name, "finish");
    }

    #[test]
    fn resolving_unknown_tool_fails() {
        let spec = ToolSpec::new("does_not_exist");
        let err = registry().resolve(&spec).unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn finish_executor_returns_sentinel() {
        let tool = build_finish_tool();
        let action = Action { tool_name: "finish".into(), arguments: Value::Null, call_id: "c1".into() };
        let obs = tool.executor.execute(&action).await.unwrap();
        assert!(is_finish_observation(&obs));
    }

    #[tokio::test]
    async fn custom_tool_can_be_registered_and_resolved() {
        let reg = ToolRegistry::new();
        reg.register("echo", |_params| {
            Ok(Tool {
                def: ToolDef {
                    name: "echo".into(),
                    description: "echoes its arguments".into(),
                    parameters_schema: serde_json::json!({"type": "object"}),
                    dangerous: false,
                },
                executor: Box::new(EchoExecutor),
            })
        });
        let tool = reg.resolve(&ToolSpec::new("echo")).unwrap();
        let action = Action { tool_name: "echo".into(), arguments: serde_json::json!({"x": 1}), call_id: "c2".into() };
        let obs = tool.executor.execute(&action).await.unwrap();
        assert_eq!(obs.content, "{\"x\":1}");
    }
}
