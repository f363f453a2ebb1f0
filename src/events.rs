use serde_json::Value;

/// Events emitted during a generation, for UI streaming.
#[derive(Debug, Clone)]
pub enum GenerateEvent {
    ModelCall { call: usize, tools_enabled: bool },
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: String, is_error: bool },
    Answer { text: String },
}
