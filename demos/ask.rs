//! Interactive course-assistant REPL.
//!
//! Usage:
//!   GEMINI_API_KEY=... cargo run --example ask
//!   GEMINI_API_KEY=... cargo run --example ask -- --model gemini-2.5-pro
//!   OPENAI_API_KEY=sk-... cargo run --example ask -- --provider openai --model gpt-4o-mini
//!   cargo run --example ask -- --provider openai --base-url http://localhost:8000 --model qwen2.5
//!
//! Ctrl-C or type "exit" / "quit" to leave.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use clap::Parser;
use course_assistant::{
    GeminiProvider, GenerateEvent, Generator, GeneratorConfig, InferenceProvider, OpenAiProvider,
    ToolArgs, ToolError, ToolHandler, ToolRegistry,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ask", about = "Ask the course assistant")]
struct Cli {
    /// Provider: "gemini" or "openai"
    #[arg(long, default_value = "gemini")]
    provider: String,

    /// Model to use
    #[arg(long, default_value = "gemini-2.5-flash")]
    model: String,

    /// Max output tokens per call
    #[arg(long, default_value_t = 800)]
    max_tokens: u32,

    /// API base URL (defaults depend on provider)
    #[arg(long)]
    base_url: Option<String>,

    /// Number of previous exchanges passed along as history
    #[arg(long, default_value_t = 2)]
    history: usize,

    /// Disable the demo course search tool
    #[arg(long)]
    no_tools: bool,
}

fn build_provider(cli: &Cli) -> Box<dyn InferenceProvider> {
    match cli.provider.as_str() {
        "gemini" => {
            let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
                eprintln!("error: GEMINI_API_KEY not set");
                std::process::exit(1);
            });
            let mut p = GeminiProvider::new(api_key);
            if let Some(ref url) = cli.base_url {
                p = p.with_base_url(url);
            }
            Box::new(p)
        }
        "openai" => {
            let base = cli
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".into());
            let mut p = OpenAiProvider::new(base);
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                p = p.with_api_key(key);
            }
            Box::new(p)
        }
        other => {
            eprintln!("error: unknown provider '{other}'. Use 'gemini' or 'openai'.");
            std::process::exit(1);
        }
    }
}

/// Toy stand-in for a real course index.
struct DemoSearch;

const LESSONS: &[(&str, u64, &str)] = &[
    ("Intro to Algorithms", 1, "Big-O notation and asymptotic analysis."),
    ("Intro to Algorithms", 2, "Recursion and divide-and-conquer."),
    ("Intro to Algorithms", 3, "Sorting algorithms: quicksort and mergesort."),
    ("Building with LLMs", 1, "Prompting basics and system instructions."),
    ("Building with LLMs", 2, "Tool calling and retrieval."),
];

#[async_trait]
impl ToolHandler for DemoSearch {
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("'query' is required".into()))?
            .to_lowercase();
        let course = args
            .get("course_name")
            .and_then(Value::as_str)
            .map(str::to_lowercase);
        let lesson = args.get("lesson_number").and_then(Value::as_u64);

        let hits: Vec<String> = LESSONS
            .iter()
            .filter(|(c, _, _)| {
                course
                    .as_ref()
                    .map_or(true, |q| c.to_lowercase().contains(q.as_str()))
            })
            .filter(|(_, n, _)| lesson.map_or(true, |l| l == *n))
            .filter(|(c, _, text)| {
                lesson.is_some()
                    || query
                        .split_whitespace()
                        .any(|t| text.to_lowercase().contains(t) || c.to_lowercase().contains(t))
            })
            .map(|(c, n, text)| format!("[{c} - Lesson {n}]\n{text}"))
            .collect();

        if hits.is_empty() {
            return Err(ToolError::Failed("No relevant content found.".into()));
        }
        Ok(json!(hits.join("\n\n")))
    }
}

fn demo_tools() -> ToolRegistry {
    ToolRegistry::new().add(
        "search_course_content",
        json!({
            "name": "search_course_content",
            "description": "Search course materials by course name and lesson number",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work)"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within"
                    }
                },
                "required": ["query"]
            }
        }),
        DemoSearch,
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let provider = build_provider(&cli);

    let generator = Generator::new(
        provider,
        GeneratorConfig {
            model: cli.model.clone(),
            max_output_tokens: cli.max_tokens,
            ..GeneratorConfig::default()
        },
    );
    let tools = demo_tools();

    eprintln!("course-assistant");
    eprintln!("provider: {}", cli.provider);
    eprintln!("model: {}", cli.model);
    let use_tools = !cli.no_tools && !tools.is_empty();
    if use_tools {
        eprintln!("tools: {}", tools.tool_names().join(", "));
    }
    eprintln!("---");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut exchanges: Vec<(String, String)> = Vec::new();

    loop {
        eprint!("\x1b[1;36myou>\x1b[0m ");
        io::stderr().flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "exit" | "quit" | "/q") {
            break;
        }

        let history = exchanges
            .iter()
            .rev()
            .take(cli.history)
            .rev()
            .map(|(q, a)| format!("User: {q}\nAssistant: {a}"))
            .collect::<Vec<_>>()
            .join("\n");
        let history = (!history.is_empty()).then_some(history);

        let (tx, mut rx) = tokio::sync::mpsc::channel::<GenerateEvent>(64);

        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    GenerateEvent::ToolCall { name, arguments } => {
                        eprintln!("\x1b[33m  [tool: {name}]\x1b[0m {arguments}");
                    }
                    GenerateEvent::ToolResult {
                        name,
                        output,
                        is_error,
                    } => {
                        let tag = if is_error { "error" } else { "result" };
                        let truncated: String = output.chars().take(200).collect();
                        eprintln!("\x1b[33m  [{tag}: {name}]\x1b[0m {truncated}");
                    }
                    _ => {}
                }
            }
        });

        let (catalog, executor) = if use_tools {
            (
                Some(&tools as &dyn course_assistant::ToolCatalog),
                Some(&tools as &dyn course_assistant::ToolExecutor),
            )
        } else {
            (None, None)
        };

        let result = generator
            .generate_with_events(trimmed, history.as_deref(), catalog, executor, tx)
            .await;
        printer.await.ok();

        match result {
            Ok(answer) => {
                eprint!("\x1b[1;32massistant>\x1b[0m ");
                println!("{answer}");
                exchanges.push((trimmed.to_string(), answer));
            }
            Err(e) => {
                eprintln!("\x1b[1;31merror:\x1b[0m {e}");
            }
        }
    }

    eprintln!("bye.");
}
