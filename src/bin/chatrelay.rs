//! Interactive chat client for OpenAI-compatible and Azure OpenAI endpoints.
//!
//! # Usage
//!
//! ```bash
//! # Interactive chat
//! chatrelay
//!
//! # One-shot
//! chatrelay --prompt "Your question"
//!
//! # Wait for whole replies instead of streaming them
//! chatrelay --no-stream
//! ```
//!
//! The endpoint is configured through the environment (a `.env` file in the working directory
//! is loaded first):
//! - `OPENAI_API_KEY` (required)
//! - `OPENAI_BASE_URL` (required)
//! - `OPENAI_DEPLOYMENT` (Azure) or `OPENAI_MODEL`
//! - `OPENAI_ORG`, `OPENAI_SYSTEM_PROMPT`, `ASSISTANT_NAME`, `USER_NAME`, `NO_COLOR` (optional)
//!
//! # Commands
//!
//! While chatting:
//! - `/exit`, `/quit` - Exit the chat
//! - `/clear` - Clear conversation history (keeps the system prompt)

use std::io;
use std::sync::Arc;

use arrrg::CommandLine;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chatrelay::chat::{
    ChatArgs, ChatConfig, ChatSession, EditorInput, Mode, ProcessEnv, run_agents_mode,
};
use chatrelay::{Error, OpenAi, OutputSink, Result, TerminalSink, TracingClientLogger};

const USAGE: &str = "chatrelay [--prompt TEXT] [--no-stream] [--mode completions|agents] [OPTIONS]";

/// Main entry point for the chatrelay application.
#[tokio::main]
async fn main() {
    let (args, free) = ChatArgs::from_command_line_relaxed(USAGE);
    if !free.is_empty() {
        eprintln!("Error: unexpected arguments: {}", free.join(" "));
        eprintln!("Usage: {USAGE}");
        std::process::exit(2);
    }
    init_logging(args.log_level.as_deref());

    let code = match run(args).await {
        Ok(()) => 0,
        Err(err @ (Error::Configuration { .. } | Error::BackendUnavailable { .. })) => {
            eprintln!("{err}");
            err.exit_code()
        }
        Err(err) => {
            tracing::error!(error = %err, "chatrelay failed");
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

/// Diagnostics go to stderr, and only when asked for with `--log-level` or `RUST_LOG`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => return,
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: ChatArgs) -> Result<()> {
    if args.mode()? == Mode::Agents {
        return run_agents_mode(args.system.as_deref(), args.one_shot_prompt(), !args.no_stream);
    }

    let config = ChatConfig::from_args_and_env(&args, &ProcessEnv::load())?;
    tracing::debug!(?config, "configuration resolved");
    let client = OpenAi::with_options(
        config.api_key.clone(),
        &config.base_url,
        config.organization.clone(),
        None,
    )?
    .with_logger(Arc::new(TracingClientLogger));

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).map_err(|e| {
        Error::io(
            "failed to install the Ctrl-C handler",
            io::Error::other(e.to_string()),
        )
    })?;

    if let Some(prompt) = args.one_shot_prompt() {
        let mut sink = TerminalSink::with_color(false);
        let mut session = ChatSession::new(client, config.session).with_cancellation(cancel);
        return match session.run_once(prompt, &mut sink).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_abort() => {
                sink.print_interrupted();
                Ok(())
            }
            Err(err) => Err(err),
        };
    }

    let mut sink = TerminalSink::with_color(config.session.use_color);
    let mut session = ChatSession::new(client, config.session).with_cancellation(cancel);
    let mut input = EditorInput::new()?;
    let reason = session.run_interactive(&mut input, &mut sink).await?;
    tracing::debug!(?reason, messages = session.history().len(), "session ended");
    Ok(())
}
