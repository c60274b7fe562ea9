use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MessageKind {
    User,
    /// Assistant prose.
    Assistant,
    /// Assistant-authored code segment (rendered monospaced, no prose styling).
    Code,
}

impl MessageKind {
    pub fn is_user(&self) -> bool {
        matches!(self, MessageKind::User)
    }

    pub fn is_code(&self) -> bool {
        matches!(self, MessageKind::Code)
    }

    /// Role label used when replaying the conversation into a prompt.
    pub fn role_label(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant | MessageKind::Code => "assistant",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    pub fn new(kind: MessageKind, text: String) -> Self {
        Self { kind, text }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageKind::User, text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, text.into())
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Code, text.into())
    }
}

/// Events emitted by a streaming session, in arrival order. All chunk events
/// carry the full accumulated text so a dropped update cannot corrupt later
/// renders; `delta` is the fragment that arrived since the previous event.
pub enum ChatEvent {
    Chunk { text: String, delta: String },
    Done { text: String },
    Error(StreamError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// Connect/read failure on the HTTP stream.
    Transport(String),
    /// Backend answered with a non-success HTTP status.
    Status(u16),
    /// Backend reported an error object mid-stream.
    Backend(String),
    /// No data arrived within the stall window (seconds).
    Stalled(u64),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(e) => write!(f, "{}", e),
            StreamError::Status(code) => write!(f, "HTTP {}", code),
            StreamError::Backend(e) => write!(f, "{}", e),
            StreamError::Stalled(secs) => {
                write!(f, "no data received for {} seconds", secs)
            }
        }
    }
}

impl std::error::Error for StreamError {}

#[derive(Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        assert_eq!(MessageKind::User.role_label(), "user");
        assert_eq!(MessageKind::Assistant.role_label(), "assistant");
        assert_eq!(MessageKind::Code.role_label(), "assistant");
    }

    #[test]
    fn test_chunk_decode_optional_fields() {
        let chunk: GenerateChunk = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(chunk.response.as_deref(), Some("hi"));
        assert_eq!(chunk.done, None);

        let done: GenerateChunk = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(done.response.is_none());
        assert_eq!(done.done, Some(true));

        let err: GenerateChunk = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_generate_request_shape() {
        let req = GenerateRequest {
            model: "mistral".to_string(),
            prompt: "hello".to_string(),
            stream: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "mistral");
        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["stream"], true);
    }
}
