//! Conversation history for a single session.

use crate::types::{ChatMessage, Role};

/// The ordered log of role-tagged messages that makes up a conversation.
///
/// A history holds at most one system message, always at index 0, followed by alternating
/// user and assistant messages.  It only ever grows, except through [`MessageHistory::reset`],
/// which replaces it wholesale.  Breaking the alternation is a caller bug and is caught by
/// debug assertions rather than reported as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHistory {
    seed: Option<ChatMessage>,
    messages: Vec<ChatMessage>,
}

impl MessageHistory {
    /// Create a history, seeded with a system message when `system_prompt` is given.
    pub fn new(system_prompt: Option<String>) -> Self {
        let seed = system_prompt.map(ChatMessage::system);
        let messages = seed.iter().cloned().collect();
        Self { seed, messages }
    }

    /// Append a message to the end of the conversation.
    pub fn append(&mut self, message: ChatMessage) {
        debug_assert!(
            message.role != Role::System,
            "system messages are only placed by seeding"
        );
        debug_assert!(
            self.messages.last().map(|last| last.role) != Some(message.role),
            "two consecutive {} messages",
            message.role
        );
        self.messages.push(message);
    }

    /// Clear the conversation.
    ///
    /// With `keep_system` the history goes back to the system message it was seeded with (if
    /// any); without it the history becomes empty.
    pub fn reset(&mut self, keep_system: bool) {
        self.messages.clear();
        if keep_system && let Some(seed) = &self.seed {
            self.messages.push(seed.clone());
        }
    }

    /// Drop everything appended after the history had `len` messages.
    ///
    /// This is the one removal besides [`reset`](Self::reset), and it is not part of the public
    /// interface: the history is otherwise append-only.  The turn executor calls it to take back
    /// the user message of a turn that failed or was interrupted, so the next turn does not
    /// follow a user message with another one.  Completed turns are never removed this way.
    pub(crate) fn rollback_to(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// The messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The system message this history was seeded with.
    pub fn system_prompt(&self) -> Option<&str> {
        self.seed.as_ref().map(|seed| seed.content.as_str())
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Returns the number of messages in the conversation, system message included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages at all.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns true if the history matches `[system]? (user assistant)*`.
    pub fn is_well_formed(&self) -> bool {
        let mut rest = self.messages.as_slice();
        if let Some((first, tail)) = rest.split_first()
            && first.role == Role::System
        {
            rest = tail;
        }
        rest.chunks(2).all(|pair| {
            matches!(
                pair,
                [user, assistant] if user.role == Role::User && assistant.role == Role::Assistant
            )
        })
    }
}
