//! Streaming chat REPL on top of nexus-stream.
//!
//! Usage:
//!   ANTHROPIC_API_KEY=sk-... cargo run --example stream_chat
//!   ANTHROPIC_API_KEY=sk-... cargo run --example stream_chat -- --thinking 4000
//!
//! Ctrl-C cancels the reply in flight. Type "exit" / "quit" to leave.

use std::io::{self, BufRead, Write};

use clap::Parser;
use futures::StreamExt;
use nexus_stream::{
    AnthropicProvider, Client, ClientConfig, ContentSegment, StreamConfig, StreamElement,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "stream_chat", about = "Stream replies from a hosted model")]
struct Cli {
    /// Model to use
    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// System prompt
    #[arg(long, short = 's')]
    system: Option<String>,

    /// Max output tokens per reply
    #[arg(long, default_value_t = 4096)]
    max_tokens: u32,

    /// Enable extended thinking with the given token budget
    #[arg(long)]
    thinking: Option<u32>,

    /// Elements buffered between the network and the terminal
    #[arg(long, default_value_t = 64)]
    buffer: usize,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,
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

    let mut provider = match AnthropicProvider::from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(ref url) = cli.base_url {
        provider = provider.with_base_url(url);
    }

    let mut config = ClientConfig {
        max_tokens: cli.max_tokens,
        stream: StreamConfig::default().with_buffer_capacity(cli.buffer),
        ..ClientConfig::default()
    }
    .with_model(&cli.model);
    if let Some(ref sys) = cli.system {
        config = config.with_system(sys);
    }
    if let Some(budget) = cli.thinking {
        config = config.with_thinking(budget);
    }
    let client = Client::new(provider, config);

    eprintln!("nexus-stream chat");
    eprintln!("model: {}", cli.model);
    eprintln!("---");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut history = Vec::new();

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

        history.push(json!({"role": "user", "content": trimmed}));

        let mut reply = match client.respond_streaming(history.clone()).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("\x1b[1;31merror:\x1b[0m {e}");
                history.pop();
                continue;
            }
        };

        let cancel = reply.cancel_handle();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        eprint!("\x1b[1;32magent>\x1b[0m ");
        let mut completed = None;
        while let Some(item) = reply.next().await {
            match item {
                Ok(StreamElement::Segment(ContentSegment::Text { text, .. })) => {
                    print!("{text}");
                    io::stdout().flush().ok();
                }
                Ok(StreamElement::Segment(ContentSegment::Reasoning {
                    text: Some(text), ..
                })) => {
                    eprint!("\x1b[2;3m{text}\x1b[0m");
                }
                Ok(StreamElement::BlockComplete { block, .. }) => {
                    if let nexus_stream::ContentBlock::ToolUse(tool) = block {
                        eprintln!("\n\x1b[33m  [tool: {}]\x1b[0m {}", tool.name, tool.input);
                    }
                }
                Ok(StreamElement::MessageComplete(message)) => completed = Some(message),
                Ok(_) => {}
                Err(e) => eprintln!("\n\x1b[1;31merror:\x1b[0m {e}"),
            }
        }
        ctrl_c.abort();
        println!();

        match completed {
            // Tool calls are not executed here, so a tool_use turn would leave
            // history without the tool_result the API requires next.
            Some(message) if !message.tool_uses().is_empty() => {
                eprintln!("\x1b[2m  [tool calls not executed; turn dropped]\x1b[0m");
                history.pop();
            }
            Some(message) => history.push(message.into_assistant_json()),
            None => {
                eprintln!("\x1b[2m  [reply discarded]\x1b[0m");
                history.pop();
            }
        }
    }

    eprintln!("bye.");
}
