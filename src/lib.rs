pub mod error;
pub mod events;
pub mod inference;
pub mod prompt;
pub mod request;
pub mod tools;
pub mod types;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use error::{GenerateError, InferenceError, ToolError};
pub use events::GenerateEvent;
pub use inference::{GeminiProvider, InferenceProvider, OpenAiProvider};
pub use prompt::{build_system_instruction, SYSTEM_PROMPT};
pub use tools::{ToolCatalog, ToolExecutor, ToolHandler, ToolRegistry};
pub use types::{
    GenerationConfig, InferenceRequest, InferenceResponse, Part, Role, ToolArgs, ToolCallRequest,
    ToolCallResult, ToolDeclaration, ToolOutput, Turn, Usage,
};

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model: String,
    pub max_output_tokens: u32,
    /// Instruction text that prior conversation is appended to.
    pub base_instruction: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            max_output_tokens: 800,
            base_instruction: SYSTEM_PROMPT.into(),
        }
    }
}

/// Result of a generation, with bookkeeping.
#[derive(Debug)]
pub struct Generation {
    pub text: String,
    pub provider_calls: usize,
    pub tool_results: Vec<ToolCallResult>,
    pub usage: Usage,
}

/// Answers a query with at most one round of tool calls.
///
/// The first provider call carries the tool catalog. If the model asks for
/// tools and an executor is available, every call is run in order, the
/// results go back in a single user turn, and a second call with tools
/// disabled produces the answer. Holds no per-query state, so one generator
/// can serve concurrent queries.
pub struct Generator {
    provider: Box<dyn InferenceProvider>,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(provider: impl InferenceProvider + 'static, config: GeneratorConfig) -> Self {
        Self {
            provider: Box::new(provider),
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Answer `query`, optionally with prior conversation and tools.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        catalog: Option<&dyn ToolCatalog>,
        executor: Option<&dyn ToolExecutor>,
    ) -> Result<String, GenerateError> {
        self.run_inner(query, history, catalog, executor, None)
            .await
            .map(|g| g.text)
    }

    /// Same as [`generate`](Self::generate), emitting progress events.
    ///
    /// Events are sent without waiting: when the channel is full or closed
    /// they are dropped, so generation never blocks on the receiver.
    pub async fn generate_with_events(
        &self,
        query: &str,
        history: Option<&str>,
        catalog: Option<&dyn ToolCatalog>,
        executor: Option<&dyn ToolExecutor>,
        tx: mpsc::Sender<GenerateEvent>,
    ) -> Result<String, GenerateError> {
        self.run_inner(query, history, catalog, executor, Some(&tx))
            .await
            .map(|g| g.text)
    }

    /// Same as [`generate`](Self::generate), returning tool results and usage too.
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        catalog: Option<&dyn ToolCatalog>,
        executor: Option<&dyn ToolExecutor>,
    ) -> Result<Generation, GenerateError> {
        self.run_inner(query, history, catalog, executor, None).await
    }

    async fn run_inner(
        &self,
        query: &str,
        history: Option<&str>,
        catalog: Option<&dyn ToolCatalog>,
        executor: Option<&dyn ToolExecutor>,
        tx: Option<&mpsc::Sender<GenerateEvent>>,
    ) -> Result<Generation, GenerateError> {
        let system_instruction =
            prompt::build_system_instruction(&self.config.base_instruction, history);
        let mut config = GenerationConfig::new(system_instruction, self.config.max_output_tokens);
        if let Some(catalog) = catalog {
            let tools = request::to_provider_tools(&catalog.definitions())?;
            config = config.with_tools(tools);
        }

        let mut messages = vec![request::user_message(query)];
        let mut usage = Usage::default();

        emit(
            tx,
            GenerateEvent::ModelCall {
                call: 1,
                tools_enabled: config.tools_enabled(),
            },
        );
        let first = self.infer(messages.clone(), config.clone()).await?;
        usage.accumulate(&first.usage);

        let executor = match executor {
            Some(executor) if !first.tool_calls.is_empty() => executor,
            _ => {
                if !first.tool_calls.is_empty() {
                    warn!(
                        calls = first.tool_calls.len(),
                        "model requested tools but no executor was supplied"
                    );
                }
                info!("direct answer");
                let text = first.text.unwrap_or_default();
                emit(tx, GenerateEvent::Answer { text: text.clone() });
                return Ok(Generation {
                    text,
                    provider_calls: 1,
                    tool_results: Vec::new(),
                    usage,
                });
            }
        };

        info!(calls = first.tool_calls.len(), "tool round");
        messages.push(first.turn);

        let mut results = Vec::with_capacity(first.tool_calls.len());
        for call in &first.tool_calls {
            emit(
                tx,
                GenerateEvent::ToolCall {
                    name: call.name.clone(),
                    arguments: call
                        .arguments
                        .clone()
                        .map(Value::Object)
                        .unwrap_or(Value::Null),
                },
            );

            let result = execute_tool(executor, call).await?;

            emit(
                tx,
                GenerateEvent::ToolResult {
                    name: result.name.clone(),
                    output: result.output.to_text(),
                    is_error: result.output.is_error(),
                },
            );
            results.push(result);
        }

        messages.push(Turn::user(
            results.iter().cloned().map(Part::ToolResult).collect(),
        ));

        emit(
            tx,
            GenerateEvent::ModelCall {
                call: 2,
                tools_enabled: false,
            },
        );
        let second = self.infer(messages, config.without_tools()).await?;
        usage.accumulate(&second.usage);

        if !second.tool_calls.is_empty() {
            debug!(
                calls = second.tool_calls.len(),
                "ignoring tool calls in follow-up response"
            );
        }

        let text = second.text.unwrap_or_default();
        info!(
            tools = results.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "generation finished"
        );
        emit(tx, GenerateEvent::Answer { text: text.clone() });

        Ok(Generation {
            text,
            provider_calls: 2,
            tool_results: results,
            usage,
        })
    }

    async fn infer(
        &self,
        messages: Vec<Turn>,
        config: GenerationConfig,
    ) -> Result<InferenceResponse, GenerateError> {
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = config.tools_enabled(),
            "provider call"
        );
        let request = InferenceRequest {
            model: self.config.model.clone(),
            messages,
            config,
        };
        Ok(self.provider.infer(request).await?)
    }
}

/// Run one tool call. Executor failures become result content for the
/// model; only absent arguments abort the generation.
async fn execute_tool(
    executor: &dyn ToolExecutor,
    call: &ToolCallRequest,
) -> Result<ToolCallResult, GenerateError> {
    let args = call
        .arguments
        .as_ref()
        .ok_or_else(|| GenerateError::MalformedToolCall {
            name: call.name.clone(),
            reason: "arguments missing".into(),
        })?;

    let output = match executor.execute(&call.name, args).await {
        Ok(value) => ToolOutput::Success(value),
        Err(e) => {
            warn!(tool = %call.name, error = %e, "tool failed, reporting to model");
            ToolOutput::Failure(e.to_string())
        }
    };

    Ok(ToolCallResult {
        id: call.id.clone(),
        name: call.name.clone(),
        output,
    })
}

fn emit(tx: Option<&mpsc::Sender<GenerateEvent>>, event: GenerateEvent) {
    if let Some(tx) = tx {
        if let Err(e) = tx.try_send(event) {
            debug!(error = %e, "progress event dropped");
        }
    }
}
