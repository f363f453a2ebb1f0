use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::types::ToolArgs;

/// A tool's execution handler. Consumers implement this for each tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// A tool definition: schema for the LLM + handler for execution.
pub struct ToolDef {
    pub name: String,
    pub definition: Value,
    pub(crate) handler: Box<dyn ToolHandler>,
}
