use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::protocol::{Message, MessageKind};

/// On-disk form of a message. The history file is a JSON array of these, in
/// conversation order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,
    pub is_user: bool,
    pub is_code: bool,
}

impl From<&Message> for StoredMessage {
    fn from(msg: &Message) -> Self {
        Self {
            text: msg.text.clone(),
            is_user: msg.kind.is_user(),
            is_code: msg.kind.is_code(),
        }
    }
}

impl From<StoredMessage> for Message {
    fn from(msg: StoredMessage) -> Self {
        // is_user wins if a file ever carries both flags.
        let kind = if msg.is_user {
            MessageKind::User
        } else if msg.is_code {
            MessageKind::Code
        } else {
            MessageKind::Assistant
        };
        Message::new(kind, msg.text)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Corrupt(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "history file error: {}", e),
            StoreError::Corrupt(e) => write!(f, "history file is not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Persists the conversation as a JSON array at a fixed path. Every save
/// rewrites the whole file; there is no incremental append.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted conversation. A missing file is a normal first run
    /// and yields an empty history; an unreadable or unparseable file is an
    /// error the caller must handle.
    pub fn load(&self) -> Result<Vec<Message>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let stored: Vec<StoredMessage> =
            serde_json::from_slice(&bytes).map_err(StoreError::Corrupt)?;
        Ok(stored.into_iter().map(Message::from).collect())
    }

    /// Overwrite the history file with the given messages.
    pub fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        let stored: Vec<StoredMessage> = messages.iter().map(StoredMessage::from).collect();
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Default history location under the platform data dir.
pub fn default_history_path() -> PathBuf {
    let Some(data_dir) = dirs::data_dir() else {
        return Path::new("famulus-history.json").to_path_buf();
    };
    data_dir.join("famulus").join("history.json")
}
