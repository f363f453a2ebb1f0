use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::InferenceProvider;
use crate::error::InferenceError;
use crate::types::{
    InferenceRequest, InferenceResponse, Part, Role, ToolCallRequest, ToolDeclaration, Turn, Usage,
};

/// OpenAI-compatible provider. Works with vLLM, LM Studio, OpenRouter,
/// or any server that implements the `/v1/chat/completions` endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Set an API key (required for OpenAI, OpenRouter, etc.).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn convert_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    /// Convert turns to OpenAI chat messages. Tool results become one
    /// `tool` message each, carrying the JSON result payload as its content;
    /// raw provider parts from other APIs are dropped.
    fn convert_messages(system: &str, messages: &[Turn]) -> Vec<Value> {
        let mut out = Vec::new();

        if !system.is_empty() {
            out.push(json!({ "role": "system", "content": system }));
        }

        for turn in messages {
            match turn.role {
                Role::User => {
                    let mut text_parts = Vec::new();
                    for part in &turn.parts {
                        match part {
                            Part::Text(t) => text_parts.push(t.as_str()),
                            Part::ToolResult(result) => out.push(json!({
                                "role": "tool",
                                "tool_call_id": result.id,
                                "content": result.output.to_payload().to_string(),
                            })),
                            _ => {}
                        }
                    }
                    if !text_parts.is_empty() {
                        out.push(json!({ "role": "user", "content": text_parts.join("\n") }));
                    }
                }
                Role::Model => {
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();

                    for part in &turn.parts {
                        match part {
                            Part::Text(t) => text_parts.push(t.as_str()),
                            Part::ToolCall(call) => {
                                let arguments = call
                                    .arguments
                                    .as_ref()
                                    .map(|a| Value::Object(a.clone()).to_string())
                                    .unwrap_or_default();
                                tool_calls.push(json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": arguments,
                                    }
                                }));
                            }
                            _ => {}
                        }
                    }

                    let mut assistant_msg =
                        json!({ "role": "assistant", "content": text_parts.join("\n") });
                    if !tool_calls.is_empty() {
                        assistant_msg["tool_calls"] = Value::Array(tool_calls);
                    }
                    out.push(assistant_msg);
                }
            }
        }

        out
    }

    fn parse_response(parsed: &Value) -> Result<InferenceResponse, InferenceError> {
        let message = parsed
            .pointer("/choices/0/message")
            .ok_or_else(|| InferenceError::Parse("response has no choices".into()))?;

        let mut parts = Vec::new();

        let text = message["content"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if let Some(ref t) = text {
            parts.push(Part::Text(t.clone()));
        }

        let mut tool_calls = Vec::new();
        if let Some(raw_calls) = message["tool_calls"].as_array() {
            for (i, tc) in raw_calls.iter().enumerate() {
                let name = tc["function"]["name"]
                    .as_str()
                    .ok_or_else(|| InferenceError::Parse("tool call without name".into()))?
                    .to_string();
                // Arguments arrive as a JSON string. Anything that isn't an
                // object is reported as missing and rejected downstream.
                let arguments = tc["function"]["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str::<Value>(s).ok())
                    .and_then(|v| v.as_object().cloned());
                let id = tc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{i}"));

                let call = ToolCallRequest {
                    id: Some(id),
                    name,
                    arguments,
                };
                parts.push(Part::ToolCall(call.clone()));
                tool_calls.push(call);
            }
        }

        let usage = Usage {
            input_tokens: parsed["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: parsed["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(InferenceResponse {
            text,
            tool_calls,
            turn: Turn::model(parts),
            usage,
        })
    }
}

#[async_trait]
impl InferenceProvider for OpenAiProvider {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let config = &request.config;
        let messages = Self::convert_messages(&config.system_instruction, &request.messages);

        debug!(
            model = %request.model,
            messages = messages.len(),
            tools = config.tools_enabled(),
            "openai inference request"
        );

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": config.temperature,
            "max_tokens": config.max_output_tokens,
        });

        if let Some(ref tools) = config.tools {
            if !tools.is_empty() {
                body["tools"] = Value::Array(Self::convert_tools(tools));
            }
        }

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json");

        if let Some(ref key) = self.api_key {
            req = req.header("authorization", format!("Bearer {key}"));
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        if status != 200 {
            return Err(InferenceError::ApiError { status, body: text });
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| InferenceError::Parse(e.to_string()))?;

        Self::parse_response(&parsed)
    }
}
