//! Core chat session management.
//!
//! This module provides the `ChatSession` state machine, which reads user input, interprets
//! control commands, and hands conversation text to the turn executor.

use std::collections::VecDeque;
use std::io;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::config::SessionConfig;
use crate::chat::history::MessageHistory;
use crate::chat::turn::TurnExecutor;
use crate::error::{Error, Result};
use crate::render::OutputSink;
use crate::transport::ChatTransport;

/// The result of asking for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line, without its newline.
    Line(String),
    /// No more input will arrive.
    Eof,
    /// The user asked to stop.
    Interrupted,
}

/// A source of interactive input lines.
pub trait LineReader {
    /// Shows `prompt` and reads one line.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Terminal input with line editing and history, backed by `rustyline`.
pub struct EditorInput {
    editor: DefaultEditor,
}

impl EditorInput {
    /// Creates a line editor on the controlling terminal.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_error)?;
        Ok(Self { editor })
    }
}

impl LineReader for EditorInput {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => {
                println!();
                Ok(ReadOutcome::Eof)
            }
            Err(err) => Err(readline_error(err)),
        }
    }
}

fn readline_error(err: ReadlineError) -> Error {
    match err {
        ReadlineError::Io(source) => Error::io("terminal input failed", source),
        err => Error::io("terminal input failed", io::Error::other(err.to_string())),
    }
}

/// Input replayed from a fixed script; reports end of input once the script runs out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    script: VecDeque<ReadOutcome>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    /// Creates input that yields each of `lines` in order.
    pub fn new<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            script: lines
                .into_iter()
                .map(|line| ReadOutcome::Line(line.into()))
                .collect(),
            prompts: Vec::new(),
        }
    }

    /// Appends an interruption after the scripted lines.
    pub fn then_interrupt(mut self) -> Self {
        self.script.push_back(ReadOutcome::Interrupted);
        self
    }

    /// The prompts shown so far, one per read.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Returns the number of scripted outcomes not yet read.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        self.prompts.push(prompt.to_string());
        Ok(self.script.pop_front().unwrap_or(ReadOutcome::Eof))
    }
}

/// Remembers whether the assistant's line still needs a newline.
struct ReplyLine<'a> {
    sink: &'a mut dyn OutputSink,
    open: bool,
}

impl OutputSink for ReplyLine<'_> {
    fn emit(&mut self, text: &str) {
        if !text.is_empty() {
            self.open = !text.ends_with('\n');
        }
        self.sink.emit(text);
    }

    fn emit_line(&mut self, text: &str) {
        self.open = false;
        self.sink.emit_line(text);
    }

    fn print_prompt_label(&mut self, name: &str) {
        self.open = true;
        self.sink.print_prompt_label(name);
    }

    fn print_info(&mut self, info: &str) {
        self.sink.print_info(info);
    }

    fn print_error(&mut self, error: &str) {
        self.sink.print_error(error);
    }

    fn print_interrupted(&mut self) {
        self.sink.print_interrupted();
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Input ran out.
    EndOfInput,
    /// The user typed `/exit` or `/quit`.
    Quit,
    /// The user interrupted the session.
    Interrupted,
    /// The one-shot turn finished.
    Completed,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started.
    Starting,
    /// Waiting for the next line of input.
    AwaitingInput,
    /// Running a turn for the given user text.
    ExecutingTurn(String),
    /// Finished; no further input is read.
    Terminated(ExitReason),
}

/// A chat session: one conversation from start to termination.
pub struct ChatSession<T: ChatTransport> {
    executor: TurnExecutor<T>,
    history: MessageHistory,
    config: SessionConfig,
    state: SessionState,
    cancel: CancellationToken,
}

impl<T: ChatTransport> ChatSession<T> {
    /// Creates a session that talks to `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let executor = TurnExecutor::new(transport, config.model.clone());
        let history = MessageHistory::new(config.system_prompt.clone());
        Self {
            executor,
            history,
            config,
            state: SessionState::Starting,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to observe interruptions instead of a private token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The conversation so far.
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// The configuration this session was started with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.executor.transport()
    }

    /// The token that interrupts this session when cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Clears the conversation history, keeping the system prompt.
    pub fn clear(&mut self) {
        self.history.reset(true);
    }

    /// Runs the interactive loop until input ends, the user quits, or the session is interrupted.
    ///
    /// Failed turns are reported to `sink` and the loop carries on.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input fails.
    pub async fn run_interactive(
        &mut self,
        input: &mut dyn LineReader,
        sink: &mut dyn OutputSink,
    ) -> Result<ExitReason> {
        loop {
            let next = match self.state.clone() {
                SessionState::Starting => {
                    sink.print_info(&format!("Type your message. {}", help_text()));
                    SessionState::AwaitingInput
                }
                SessionState::AwaitingInput => self.await_input(input, sink)?,
                SessionState::ExecutingTurn(text) => self.execute_turn(&text, sink).await,
                SessionState::Terminated(reason) => return Ok(reason),
            };
            self.transition(next);
        }
    }

    /// Runs a single turn with `prompt` and terminates the session.
    ///
    /// Nothing is labelled or announced; only the reply is written to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the turn's error, including [`Error::Abort`] if the session was interrupted.
    pub async fn run_once(&mut self, prompt: &str, sink: &mut dyn OutputSink) -> Result<String> {
        self.transition(SessionState::ExecutingTurn(prompt.to_string()));
        let result = self
            .executor
            .execute(&mut self.history, prompt, self.config.stream, sink, &self.cancel)
            .await;
        let reason = match &result {
            Err(err) if err.is_abort() => ExitReason::Interrupted,
            _ => ExitReason::Completed,
        };
        self.transition(SessionState::Terminated(reason));
        result.map(|outcome| outcome.text)
    }

    fn await_input(
        &mut self,
        input: &mut dyn LineReader,
        sink: &mut dyn OutputSink,
    ) -> Result<SessionState> {
        if self.cancel.is_cancelled() {
            sink.print_interrupted();
            return Ok(SessionState::Terminated(ExitReason::Interrupted));
        }
        let prompt = format!("{}: ", self.config.user_name);
        let line = match input.read_line(&prompt)? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Eof => return Ok(SessionState::Terminated(ExitReason::EndOfInput)),
            ReadOutcome::Interrupted => {
                sink.print_interrupted();
                return Ok(SessionState::Terminated(ExitReason::Interrupted));
            }
        };

        let line = line.trim();
        if line.is_empty() {
            return Ok(SessionState::AwaitingInput);
        }
        Ok(match parse_command(line) {
            Some(ChatCommand::Quit) => SessionState::Terminated(ExitReason::Quit),
            Some(ChatCommand::Clear) => {
                self.clear();
                sink.print_info("History cleared.");
                SessionState::AwaitingInput
            }
            None => SessionState::ExecutingTurn(line.to_string()),
        })
    }

    async fn execute_turn(&mut self, text: &str, sink: &mut dyn OutputSink) -> SessionState {
        let mut line = ReplyLine {
            sink: &mut *sink,
            open: false,
        };
        line.print_prompt_label(&self.config.assistant_name);
        let result = self
            .executor
            .execute(&mut self.history, text, self.config.stream, &mut line, &self.cancel)
            .await;
        let line_open = line.open;

        match result {
            Ok(_) => SessionState::AwaitingInput,
            Err(err) if err.is_abort() => {
                sink.print_interrupted();
                SessionState::Terminated(ExitReason::Interrupted)
            }
            Err(err) => {
                tracing::error!(error = %err, "turn failed");
                if line_open {
                    sink.emit_line("");
                }
                sink.print_error(&err.to_string());
                SessionState::AwaitingInput
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }
}
