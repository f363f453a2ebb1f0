use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::InferenceProvider;
use crate::error::InferenceError;
use crate::types::{
    InferenceRequest, InferenceResponse, Part, Role, ToolCallRequest, ToolDeclaration, Turn, Usage,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini provider using the `generateContent` endpoint.
///
/// Wire differences from chat-completion APIs:
/// - `contents` with `parts`, roles `user` and `model`
/// - the system prompt travels in `systemInstruction`
/// - sampling settings live under `generationConfig`
/// - tool calls and results are `functionCall` / `functionResponse` parts
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Declarations serialize straight into Gemini's `FunctionDeclaration` shape.
    fn convert_tools(tools: &[ToolDeclaration]) -> Value {
        json!([{ "functionDeclarations": tools }])
    }

    fn convert_part(part: &Part) -> Value {
        match part {
            Part::Text(text) => json!({ "text": text }),
            Part::ToolCall(call) => {
                let mut fc = json!({ "name": call.name });
                if let Some(ref args) = call.arguments {
                    fc["args"] = Value::Object(args.clone());
                }
                if let Some(ref id) = call.id {
                    fc["id"] = json!(id);
                }
                json!({ "functionCall": fc })
            }
            Part::ToolResult(result) => {
                let mut fr = json!({
                    "name": result.name,
                    "response": result.output.to_payload(),
                });
                if let Some(ref id) = result.id {
                    fr["id"] = json!(id);
                }
                json!({ "functionResponse": fr })
            }
            Part::Raw(raw) => raw.clone(),
        }
    }

    fn convert_messages(messages: &[Turn]) -> Vec<Value> {
        messages
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": turn.parts.iter().map(Self::convert_part).collect::<Vec<_>>(),
                })
            })
            .collect()
    }

    /// Parse a function call. Parts carrying anything beyond the bare call
    /// (e.g. `thoughtSignature`) are kept raw so they round-trip untouched.
    fn parse_function_call(part: &Value) -> Result<(ToolCallRequest, Part), InferenceError> {
        let fc = &part["functionCall"];
        let name = fc["name"]
            .as_str()
            .ok_or_else(|| InferenceError::Parse("functionCall without name".into()))?
            .to_string();
        let call = ToolCallRequest {
            id: fc["id"].as_str().map(str::to_string),
            name,
            arguments: fc["args"].as_object().cloned(),
        };
        let typed = part.as_object().is_some_and(|o| o.len() == 1);
        let echo = if typed {
            Part::ToolCall(call.clone())
        } else {
            Part::Raw(part.clone())
        };
        Ok((call, echo))
    }

    fn parse_response(parsed: &Value) -> Result<InferenceResponse, InferenceError> {
        let candidate = parsed
            .pointer("/candidates/0")
            .ok_or_else(|| match parsed.pointer("/promptFeedback/blockReason") {
                Some(reason) => InferenceError::Parse(format!("prompt blocked: {reason}")),
                None => InferenceError::Parse("response has no candidates".into()),
            })?;

        let raw_parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut parts = Vec::with_capacity(raw_parts.len());
        let mut tool_calls = Vec::new();
        let mut texts = Vec::new();

        for part in &raw_parts {
            if part.get("functionCall").is_some() {
                let (call, echo) = Self::parse_function_call(part)?;
                tool_calls.push(call);
                parts.push(echo);
            } else if let Some(text) = part["text"].as_str() {
                let thought = part["thought"].as_bool().unwrap_or(false);
                if !thought {
                    texts.push(text);
                }
                if part.as_object().is_some_and(|o| o.len() == 1) {
                    parts.push(Part::Text(text.to_string()));
                } else {
                    parts.push(Part::Raw(part.clone()));
                }
            } else {
                parts.push(Part::Raw(part.clone()));
            }
        }

        let text = if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        };

        let usage = Usage {
            input_tokens: parsed["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
            output_tokens: parsed["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        };

        Ok(InferenceResponse {
            text,
            tool_calls,
            turn: Turn {
                role: Role::Model,
                parts,
            },
            usage,
        })
    }

    fn build_body(request: &InferenceRequest) -> Value {
        let config = &request.config;
        let mut body = json!({
            "contents": Self::convert_messages(&request.messages),
            "generationConfig": {
                "temperature": config.temperature,
                "maxOutputTokens": config.max_output_tokens,
            },
        });

        if !config.system_instruction.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": config.system_instruction }]
            });
        }

        if let Some(ref tools) = config.tools {
            if !tools.is_empty() {
                body["tools"] = Self::convert_tools(tools);
            }
        }

        body
    }
}

#[async_trait]
impl InferenceProvider for GeminiProvider {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.config.tools_enabled(),
            "gemini inference request"
        );

        let resp = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationConfig, ToolCallResult, ToolOutput};

    fn search_decl() -> ToolDeclaration {
        ToolDeclaration {
            name: "search_course_content".into(),
            description: "Search course materials".into(),
            parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }
    }

    fn request(messages: Vec<Turn>, config: GenerationConfig) -> InferenceRequest {
        InferenceRequest {
            model: "gemini-2.5-flash".into(),
            messages,
            config,
        }
    }

    #[test]
    fn body_carries_config_and_tools() {
        let config = GenerationConfig::new("be brief", 800).with_tools(vec![search_decl()]);
        let body = GeminiProvider::build_body(&request(
            vec![Turn::user(vec![Part::Text("hi".into())])],
            config,
        ));

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 800);
        let decls = &body["tools"][0]["functionDeclarations"];
        assert_eq!(decls[0]["name"], "search_course_content");
        assert_eq!(decls[0]["parameters"]["properties"]["query"]["type"], "string");
    }

    #[test]
    fn body_without_tools_omits_field() {
        let config = GenerationConfig::new("be brief", 800)
            .with_tools(vec![search_decl()])
            .without_tools();
        let body = GeminiProvider::build_body(&request(vec![], config));
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_turns_serialize_as_function_parts() {
        let mut args = serde_json::Map::new();
        args.insert("query".into(), json!("sorting"));
        let turns = vec![
            Turn::model(vec![Part::ToolCall(ToolCallRequest {
                id: None,
                name: "search_course_content".into(),
                arguments: Some(args),
            })]),
            Turn::user(vec![
                Part::ToolResult(ToolCallResult {
                    id: None,
                    name: "search_course_content".into(),
                    output: ToolOutput::Success(json!("Lesson 3 covers sorting.")),
                }),
                Part::ToolResult(ToolCallResult {
                    id: Some("c2".into()),
                    name: "get_course_outline".into(),
                    output: ToolOutput::Failure("course not found".into()),
                }),
            ]),
        ];
        let messages = GeminiProvider::convert_messages(&turns);

        assert_eq!(messages[0]["role"], "model");
        assert_eq!(
            messages[0]["parts"][0]["functionCall"],
            json!({"name": "search_course_content", "args": {"query": "sorting"}})
        );
        let results = &messages[1]["parts"];
        assert_eq!(
            results[0]["functionResponse"]["response"],
            json!({"result": "Lesson 3 covers sorting."})
        );
        assert_eq!(results[1]["functionResponse"]["name"], "get_course_outline");
        assert_eq!(results[1]["functionResponse"]["id"], "c2");
        assert_eq!(
            results[1]["functionResponse"]["response"],
            json!({"error": "course not found"})
        );
    }

    #[test]
    fn parses_text_response() {
        let parsed = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Recursion is "},
                    {"text": "a function calling itself."}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
        });
        let resp = GeminiProvider::parse_response(&parsed).unwrap();
        assert_eq!(resp.text.as_deref(), Some("Recursion is a function calling itself."));
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 7);
    }

    #[test]
    fn parses_function_calls_and_keeps_signed_parts_raw() {
        let signed = json!({
            "functionCall": {"name": "get_course_outline", "args": {"course": "X"}},
            "thoughtSignature": "abc123"
        });
        let parsed = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "search_course_content", "args": {"lesson": 3}}},
                    signed.clone(),
                    {"functionCall": {"name": "list_courses"}}
                ]}
            }]
        });
        let resp = GeminiProvider::parse_response(&parsed).unwrap();
        assert_eq!(resp.text, None);

        let names: Vec<_> = resp.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["search_course_content", "get_course_outline", "list_courses"]);
        assert_eq!(resp.tool_calls[0].arguments.as_ref().unwrap()["lesson"], 3);
        assert!(resp.tool_calls[2].arguments.is_none());

        assert!(matches!(resp.turn.parts[0], Part::ToolCall(_)));
        assert_eq!(resp.turn.parts[1], Part::Raw(signed.clone()));

        // echoed verbatim on the follow-up call
        let echoed = GeminiProvider::convert_messages(&[resp.turn]);
        assert_eq!(echoed[0]["parts"][1], signed);
    }

    #[test]
    fn thought_text_is_not_answer_text() {
        let parsed = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Answer."}
                ]}
            }]
        });
        let resp = GeminiProvider::parse_response(&parsed).unwrap();
        assert_eq!(resp.text.as_deref(), Some("Answer."));
        assert!(matches!(resp.turn.parts[0], Part::Raw(_)));
    }

    #[test]
    fn blocked_prompt_is_parse_error() {
        let parsed = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiProvider::parse_response(&parsed).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn http_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "generationConfig": {"maxOutputTokens": 800}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello!"}]}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.url());
        let resp = provider
            .infer(request(
                vec![Turn::user(vec![Part::Text("hi".into())])],
                GenerationConfig::new("sys", 800),
            ))
            .await
            .unwrap();

        assert_eq!(resp.text.as_deref(), Some("Hello!"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.url());
        let err = provider
            .infer(request(vec![], GenerationConfig::new("sys", 800)))
            .await
            .unwrap_err();

        match err {
            InferenceError::ApiError { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }
}
