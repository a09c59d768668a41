//! Chat application module for conversations with OpenAI-compatible endpoints.
//!
//! This module provides the conversation engine behind the chatrelay REPL.  It supports:
//!
//! - Streaming replies with a transparent fallback to single requests
//! - Control commands for session lifecycle
//! - One-shot and interactive sessions
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`history`]: the ordered log of conversation messages
//! - [`turn`]: runs one user turn against a [`ChatTransport`](crate::ChatTransport)
//! - [`session`]: the session state machine and its input sources
//! - [`commands`]: control command parsing
//! - [`config`]: CLI arguments, environment and session configuration
//! - [`agents`]: the alternate backend

pub mod agents;
pub mod commands;
pub mod config;
pub mod history;
pub mod session;
pub mod turn;

#[cfg(test)]
mod testing;

pub use agents::run_agents_mode;
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, EnvSource, Mode, ProcessEnv, SessionConfig, resolve_model};
pub use history::MessageHistory;
pub use session::{
    ChatSession, EditorInput, ExitReason, LineReader, ReadOutcome, ScriptedInput, SessionState,
};
pub use turn::{Delivery, TurnExecutor, TurnOutcome};
