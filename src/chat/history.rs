//! Conversation history for a single comparison
//!
//! The history is append-only with one exception: while a turn is
//! streaming, the most recent entry is the assistant placeholder and its
//! content is replaced wholesale on every received fragment. The slot is
//! addressed by position (the last index), never by matching content,
//! since the content changes on every update.

use crate::chat::message::ChatMessage;
use crate::comparison::ComparisonResult;

/// Builds the synthetic greeting that opens every conversation
///
/// The greeting is shown to the user but never forwarded to the provider.
pub fn greeting_for(result: &ComparisonResult) -> String {
    format!(
        "Hi there! I've just compared the {} and {}. Feel free to ask me any questions.",
        result.device_one.name, result.device_two.name
    )
}

/// Ordered conversation history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history seeded with the greeting for `result`
    pub fn seeded(result: &ComparisonResult) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting_for(result))],
        }
    }

    /// Empties the history and reseeds it with `greeting`
    pub fn reset(&mut self, greeting: impl Into<String>) {
        self.messages.clear();
        self.messages.push(ChatMessage::assistant(greeting));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Copy of every completed entry, taken before a turn is opened
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Appends the user turn and an empty assistant placeholder together
    pub fn open_turn(&mut self, text: impl Into<String>) {
        self.messages.reserve(2);
        self.messages.push(ChatMessage::user(text));
        self.messages.push(ChatMessage::assistant(String::new()));
    }

    /// Overwrites the content of the last entry
    ///
    /// Returns `false` when the history is empty.
    pub fn replace_last_content(&mut self, content: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.content.clear();
                last.content.push_str(content);
                true
            }
            None => false,
        }
    }

    /// Removes exactly the last entry and appends `fallback` as an assistant message
    pub fn rollback_last(&mut self, fallback: impl Into<String>) {
        self.messages.pop();
        self.messages.push(ChatMessage::assistant(fallback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::comparison::tests::sample;

    #[test]
    fn test_greeting_uses_both_names() {
        let greeting = greeting_for(&sample());
        assert_eq!(
            greeting,
            "Hi there! I've just compared the Pixel 9 Pro and iPhone 16 Pro. Feel free to ask me any questions."
        );
    }

    #[test]
    fn test_seeded_history_has_single_greeting() {
        let history = ConversationHistory::seeded(&sample());
        assert_eq!(history.len(), 1);
        assert!(history.messages()[0].is_assistant());
    }

    #[test]
    fn test_open_turn_appends_user_and_placeholder() {
        let mut history = ConversationHistory::new();
        history.reset("Hi...");
        let before = history.snapshot();
        history.open_turn("How is the camera?");

        assert_eq!(before.len(), 1);
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[1], ChatMessage::user("How is the camera?"));
        assert_eq!(history.messages()[2], ChatMessage::assistant(""));
    }

    #[test]
    fn test_replace_last_is_positional() {
        let mut history = ConversationHistory::new();
        history.reset("same");
        history.open_turn("q");
        history.replace_last_content("same");
        history.replace_last_content("same and more");

        // The greeting with identical content is untouched.
        assert_eq!(history.messages()[0].content, "same");
        assert_eq!(history.messages()[2].content, "same and more");
    }

    #[test]
    fn test_replace_last_on_empty_history() {
        let mut history = ConversationHistory::new();
        assert!(!history.replace_last_content("x"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_rollback_keeps_user_turn() {
        let mut history = ConversationHistory::new();
        history.reset("Hi...");
        history.open_turn("q");
        history.replace_last_content("partial ans");
        history.rollback_last("Sorry");

        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[1].role, Role::User);
        assert_eq!(history.last(), Some(&ChatMessage::assistant("Sorry")));
    }

    #[test]
    fn test_reset_discards_previous_turns() {
        let mut history = ConversationHistory::new();
        history.reset("first");
        history.open_turn("q");
        history.reset("second");
        assert_eq!(history.messages(), &[ChatMessage::assistant("second")]);
    }
}
