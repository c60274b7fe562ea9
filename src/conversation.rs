use std::fmt;

use crate::protocol::Message;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogError {
    OutOfRange { index: usize, len: usize },
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::OutOfRange { index, len } => {
                write!(f, "message index {} out of range (log has {})", index, len)
            }
        }
    }
}

impl std::error::Error for LogError {}

/// Ordered conversation transcript. Messages are identified by position;
/// removal shifts later indices down, order is never rearranged.
#[derive(Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message and return its index.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Remove the message at `index`. On an invalid index the log is
    /// untouched.
    pub fn remove_at(&mut self, index: usize) -> Result<Message, LogError> {
        if index >= self.messages.len() {
            return Err(LogError::OutOfRange {
                index,
                len: self.messages.len(),
            });
        }
        Ok(self.messages.remove(index))
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Render the log as role-labelled lines for prompt assembly:
    /// one `user: ...` or `assistant: ...` line per message, in order.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.kind.role_label(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_index() {
        let mut log = ConversationLog::new();
        assert_eq!(log.append(Message::user("one")), 0);
        assert_eq!(log.append(Message::assistant("two")), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_remove_at_shifts_indices() {
        let mut log = ConversationLog::new();
        log.append(Message::user("a"));
        log.append(Message::assistant("b"));
        log.append(Message::user("c"));

        let removed = log.remove_at(1).unwrap();
        assert_eq!(removed.text, "b");
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(1).unwrap().text, "c");
    }

    #[test]
    fn test_remove_at_out_of_range_leaves_log_unchanged() {
        let mut log = ConversationLog::new();
        log.append(Message::user("a"));

        let err = log.remove_at(5).unwrap_err();
        assert_eq!(err, LogError::OutOfRange { index: 5, len: 1 });
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(0).unwrap().text, "a");
    }

    #[test]
    fn test_transcript_labels_roles() {
        let mut log = ConversationLog::new();
        log.append(Message::user("hi"));
        log.append(Message::assistant("hello"));
        log.append(Message::code("let x = 1;"));

        assert_eq!(
            log.transcript(),
            "user: hi\nassistant: hello\nassistant: let x = 1;"
        );
    }

    #[test]
    fn test_clear() {
        let mut log = ConversationLog::new();
        log.append(Message::user("a"));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.transcript(), "");
    }
}
