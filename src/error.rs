#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("invalid tool definition: {0}")]
    Configuration(String),
    #[error("malformed call to tool '{name}': {reason}")]
    MalformedToolCall { name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Failure raised by a tool executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("tool '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    Failed(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}
