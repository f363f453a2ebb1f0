use serde_json::Value;

use crate::error::GenerateError;
use crate::types::{Part, ToolDeclaration, Turn};

/// Convert catalog definitions into provider tool declarations, one per entry.
///
/// `name`, `description` and a parameter schema are required. The schema is
/// read from `parameters`, falling back to an Anthropic-style `input_schema`.
/// Nothing is defaulted: a malformed entry fails the whole request.
pub fn to_provider_tools(catalog: &[Value]) -> Result<Vec<ToolDeclaration>, GenerateError> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let name = required_str(def, "name", i)?;
            let description = required_str(def, "description", i)?;
            let parameters = def
                .get("parameters")
                .or_else(|| def.get("input_schema"))
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| {
                    GenerateError::Configuration(format!(
                        "tool '{name}' has no parameter schema"
                    ))
                })?;
            Ok(ToolDeclaration {
                name,
                description,
                parameters,
            })
        })
        .collect()
}

fn required_str(def: &Value, field: &str, index: usize) -> Result<String, GenerateError> {
    def.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GenerateError::Configuration(format!(
                "tool definition #{index} is missing string field '{field}'"
            ))
        })
}

/// The user's query as a single-part user turn.
pub fn user_message(query: &str) -> Turn {
    Turn::user(vec![Part::Text(query.to_string())])
}
