//! Control command parsing for the chat application.
//!
//! A command is one of a few exact tokens typed on its own line.  Matching is case-sensitive and
//! anything else, including unknown slash-prefixed input, is conversation text.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Clear the conversation history, keeping the system prompt.
    Clear,

    /// Exit the chat application.
    Quit,
}

/// Parses user input for control commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be treated as
/// a regular message.  Surrounding whitespace is ignored.
///
/// # Examples
///
/// ```
/// # use chatrelay::chat::{parse_command, ChatCommand};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/Quit"), None);
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    match input.trim() {
        "/exit" | "/quit" => Some(ChatCommand::Quit),
        "/clear" => Some(ChatCommand::Clear),
        _ => None,
    }
}

/// Returns the one-line summary of the available commands shown in the banner.
pub fn help_text() -> &'static str {
    "Commands: /exit, /quit, /clear"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/clear\n"), Some(ChatCommand::Clear));
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert_eq!(parse_command("/CLEAR"), None);
        assert_eq!(parse_command("/Exit"), None);
        assert_eq!(parse_command("/QUIT"), None);
    }

    #[test]
    fn commands_are_exact() {
        assert_eq!(parse_command("/q"), None);
        assert_eq!(parse_command("/help"), None);
        assert_eq!(parse_command("/clear all"), None);
        assert_eq!(parse_command("please /quit"), None);
        assert_eq!(parse_command("exit"), None);
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_names_every_command() {
        let help = help_text();
        assert!(help.contains("/exit"));
        assert!(help.contains("/quit"));
        assert!(help.contains("/clear"));
    }
}
