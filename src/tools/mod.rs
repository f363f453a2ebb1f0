pub mod handler;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::types::ToolArgs;

pub use handler::{ToolDef, ToolHandler};
pub use registry::ToolRegistry;

/// Read-only source of tool definitions offered to the model.
///
/// Each definition is a JSON object with `name`, `description` and
/// `parameters`. Validation happens when the request is assembled.
pub trait ToolCatalog: Send + Sync {
    fn definitions(&self) -> Vec<Value>;
}

impl ToolCatalog for Vec<Value> {
    fn definitions(&self) -> Vec<Value> {
        self.clone()
    }
}

impl ToolCatalog for &[Value] {
    fn definitions(&self) -> Vec<Value> {
        self.to_vec()
    }
}

/// Runs a tool the model asked for.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &ToolArgs) -> Result<Value, ToolError>;
}
