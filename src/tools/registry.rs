use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::handler::{ToolDef, ToolHandler};
use super::{ToolCatalog, ToolExecutor};
use crate::error::ToolError;
use crate::types::ToolArgs;

/// Catalog of available tools. Stores definitions for the model and
/// dispatches calls to handlers by name.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. The definition is the JSON object
    /// (name, description, parameters) offered to the model.
    /// Registering an existing name replaces the earlier entry.
    pub fn add(
        mut self,
        name: impl Into<String>,
        definition: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        let def = ToolDef {
            name: name.into(),
            definition,
            handler: Box::new(handler),
        };
        match self.tools.iter_mut().find(|t| t.name == def.name) {
            Some(existing) => *existing = def,
            None => self.tools.push(def),
        }
        self
    }

    /// Definition for a specific tool by name.
    pub fn definition(&self, name: &str) -> Option<&Value> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.definition)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog for ToolRegistry {
    fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        debug!(tool = name, "executing tool");
        tool.handler.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct ConstHandler(&'static str);

    #[async_trait]
    impl ToolHandler for ConstHandler {
        async fn call(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
            Ok(json!(self.0))
        }
    }

    struct LessonHandler;

    #[async_trait]
    impl ToolHandler for LessonHandler {
        async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
            let lesson = args
                .get("lesson")
                .and_then(Value::as_u64)
                .ok_or_else(|| ToolError::InvalidArguments("lesson must be a number".into()))?;
            Ok(json!(format!("lesson {lesson}")))
        }
    }

    fn definition(name: &str) -> Value {
        json!({
            "name": name,
            "description": format!("The {name} tool"),
            "parameters": {"type": "object", "properties": {}}
        })
    }

    fn test_registry() -> ToolRegistry {
        ToolRegistry::new()
            .add("search_course_content", definition("search_course_content"), LessonHandler)
            .add("get_course_outline", definition("get_course_outline"), ConstHandler("outline"))
    }

    #[test]
    fn definitions_in_registration_order() {
        assert!(ToolRegistry::default().is_empty());

        let reg = test_registry();
        assert!(!reg.is_empty());
        let defs = reg.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0]["name"], "search_course_content");
        assert_eq!(defs[1]["name"], "get_course_outline");
    }

    #[test]
    fn duplicate_name_replaces_entry() {
        let reg = test_registry().add(
            "get_course_outline",
            json!({"name": "get_course_outline", "description": "v2", "parameters": {}}),
            ConstHandler("outline v2"),
        );
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.definition("get_course_outline").unwrap()["description"], "v2");
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let reg = test_registry();
        let mut args = ToolArgs::new();
        args.insert("lesson".into(), json!(3));
        let out = reg.execute("search_course_content", &args).await.unwrap();
        assert_eq!(out, json!("lesson 3"));

        let out = reg.execute("get_course_outline", &ToolArgs::new()).await.unwrap();
        assert_eq!(out, json!("outline"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let reg = test_registry();
        let err = reg.execute("delete_course", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("delete_course".into()));
    }

    #[tokio::test]
    async fn handler_rejection_passes_through() {
        let reg = test_registry();
        let err = reg
            .execute("search_course_content", &ToolArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().starts_with("invalid arguments"));
    }
}
