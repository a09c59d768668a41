//! Output rendering for chat sessions.
//!
//! The engine writes through the [`OutputSink`] capability and never depends on a particular
//! terminal.  [`TerminalSink`] writes to stdout/stderr with an optional ANSI theme and
//! [`BufferSink`] captures everything in memory.

use std::io::{self, Stdout, Write};

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for informational notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for green text (used for assistant output).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - In-memory capture for tests and embedding
pub trait OutputSink: Send {
    /// Emit a piece of assistant text without a trailing newline.
    ///
    /// This is called incrementally as fragments are streamed from the endpoint.
    fn emit(&mut self, text: &str);

    /// Emit assistant text followed by a newline.
    fn emit_line(&mut self, text: &str);

    /// Print the speaker label that precedes an assistant reply.
    fn print_prompt_label(&mut self, name: &str) {
        self.emit(&format!("{name}: "));
    }

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Called when the session is interrupted by the user.
    fn print_interrupted(&mut self) {
        self.print_info("\nInterrupted.");
    }
}

/// Plain text sink with optional ANSI styling.
pub struct TerminalSink {
    stdout: Stdout,
    use_color: bool,
    in_assistant_text: bool,
}

impl TerminalSink {
    /// Creates a new TerminalSink with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new TerminalSink with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_assistant_text: false,
        }
    }

    /// Returns whether ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn start_assistant_text(&mut self) {
        if self.use_color && !self.in_assistant_text {
            print!("{ANSI_GREEN}");
        }
        self.in_assistant_text = true;
    }

    fn reset_styles(&mut self) {
        if self.in_assistant_text {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            self.in_assistant_text = false;
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for TerminalSink {
    fn emit(&mut self, text: &str) {
        self.start_assistant_text();
        print!("{text}");
        self.flush();
    }

    fn emit_line(&mut self, text: &str) {
        self.start_assistant_text();
        print!("{text}");
        self.reset_styles();
        println!();
        self.flush();
    }

    fn print_prompt_label(&mut self, name: &str) {
        self.reset_styles();
        if self.use_color {
            print!("{ANSI_BOLD}{ANSI_GREEN}{name}:{ANSI_RESET} ");
        } else {
            print!("{name}: ");
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.reset_styles();
        if self.use_color {
            println!("{ANSI_BOLD}{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.reset_styles();
        self.flush();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

/// A sink that records everything in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    output: String,
    infos: Vec<String>,
    errors: Vec<String>,
}

impl BufferSink {
    /// Creates an empty BufferSink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted as assistant text, labels included.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Informational notices, in order.
    pub fn infos(&self) -> &[String] {
        &self.infos
    }

    /// Error notices, in order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl OutputSink for BufferSink {
    fn emit(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn emit_line(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn print_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
}
