//! Tool registry: name → callable tool.

use std::collections::HashMap;
use std::sync::Arc;

use cg_domain::error::{Error, Result};
use cg_domain::tool::ToolDefinition;
use serde_json::Value;

use crate::calculator::CalculatorTool;
use crate::weather::WeatherTool;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A callable tool.
///
/// `call` returns the observation text handed back to the agent. Failures
/// the model can learn from (bad arithmetic, unknown city) are observations,
/// not errors; `Err` is reserved for arguments that do not match the schema.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: Value) -> Result<String>;
}

/// Pull a required string argument out of a tool-call payload.
pub(crate) fn required_str<'a>(tool: &str, args: &'a Value, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Tool {
            tool: tool.into(),
            message: format!("missing string argument '{field}'"),
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registry of tools, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Returns self for chaining.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
        self
    }

    /// All tool definitions, sorted by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut v: Vec<_> = self.tools.values().map(|t| t.definition()).collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Call a tool by name.
    pub async fn call(&self, name: &str, args: Value) -> Result<String> {
        let tool = self.tools.get(name).ok_or_else(|| Error::Tool {
            tool: name.into(),
            message: "unknown tool".into(),
        })?;
        tracing::debug!(tool = %name, "calling tool");
        tool.call(args).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The registry with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    ToolRegistry::new()
        .register(Arc::new(CalculatorTool))
        .register(Arc::new(WeatherTool))
}
