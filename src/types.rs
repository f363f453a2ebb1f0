use serde::Serialize;
use serde_json::{json, Map, Value};

/// Arguments the model supplied for a tool call.
pub type ToolArgs = Map<String, Value>;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single part of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    ToolCall(ToolCallRequest),
    ToolResult(ToolCallResult),
    /// Provider-native part that must be echoed back unmodified
    /// (e.g. a Gemini function call carrying a `thoughtSignature`).
    Raw(Value),
}

/// One turn of the conversation sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// The model asking for a tool to be run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Provider correlation id, when the provider issues one.
    pub id: Option<String>,
    pub name: String,
    /// `None` when the provider omitted the arguments field entirely.
    pub arguments: Option<ToolArgs>,
}

/// Outcome of running one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success(Value),
    Failure(String),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Failure(_))
    }

    /// Response payload handed back to the model.
    pub fn to_payload(&self) -> Value {
        match self {
            ToolOutput::Success(v) => json!({ "result": v }),
            ToolOutput::Failure(e) => json!({ "error": e }),
        }
    }

    /// Plain-text rendering, for providers that only accept strings.
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Success(Value::String(s)) => s.clone(),
            ToolOutput::Success(v) => v.to_string(),
            ToolOutput::Failure(e) => format!("error: {e}"),
        }
    }
}

/// Result for one [`ToolCallRequest`], tagged with the originating tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub id: Option<String>,
    pub name: String,
    pub output: ToolOutput,
}

/// A validated tool declaration, ready to be rendered into a provider's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Sampling and prompt settings for a single provider call.
///
/// Two values are built per round: one carrying tools for the first call and
/// one without, via [`GenerationConfig::without_tools`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub tools: Option<Vec<ToolDeclaration>>,
}

impl GenerationConfig {
    pub fn new(system_instruction: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            temperature: 0.0,
            max_output_tokens,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }

    /// Same settings with tool calling disabled.
    pub fn without_tools(&self) -> Self {
        Self {
            tools: None,
            ..self.clone()
        }
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Fully-formed request. The provider just sends it.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub config: GenerationConfig,
}

/// What came back from the LLM.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// The model's turn exactly as it must be echoed back on a follow-up call.
    pub turn: Turn,
    pub usage: Usage,
}

impl InferenceResponse {
    /// A plain text answer with no tool calls.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            turn: Turn::model(vec![Part::Text(text.clone())]),
            text: Some(text),
            tool_calls: Vec::new(),
            usage: Usage::default(),
        }
    }
}

/// Token usage for a single inference call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}
