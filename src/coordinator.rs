use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::{self, AssistantConfig};
use crate::conversation::{ConversationLog, LogError};
use crate::conversation_store::HistoryStore;
use crate::protocol::{ChatEvent, GenerateRequest, Message, StreamError};
use crate::segments::split_segments;
use crate::stream::StreamSession;

/// Text shown in the live placeholder until the first chunk lands.
pub const PLACEHOLDER_TEXT: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    AwaitingResponse,
}

/// One drained unit of progress for the presentation side. Queued results
/// are returned one per call, FIFO.
pub enum TurnUpdate {
    None,
    /// Snapshot of the live placeholder plus the delta since the last update.
    Live(Message, String),
    /// Messages appended in place of the placeholder after a clean finish.
    /// Empty when the response had no renderable content.
    Completed(Vec<Message>),
    /// The error message appended after a failed stream.
    Failed(Message),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// A stream is in flight; the previous turn must finish first.
    Busy,
    OutOfRange { index: usize, len: usize },
    /// The live placeholder cannot be removed while streaming.
    LiveMessage,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Busy => write!(f, "a response is already in progress"),
            ActionError::OutOfRange { index, len } => {
                write!(f, "message index {} out of range (log has {})", index, len)
            }
            ActionError::LiveMessage => {
                write!(f, "cannot delete the message being generated")
            }
        }
    }
}

impl std::error::Error for ActionError {}

impl From<LogError> for ActionError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::OutOfRange { index, len } => ActionError::OutOfRange { index, len },
        }
    }
}

/// Mediates between the presentation thread and streaming sessions. Owns the
/// log and its store; at most one session is live at a time. All methods run
/// on the presentation thread; the session's background task only ever
/// touches the event channel.
pub struct Coordinator {
    log: ConversationLog,
    store: HistoryStore,
    session: Option<StreamSession>,
    live_index: Option<usize>,
    pending: VecDeque<TurnUpdate>,
    last_save_error: Option<String>,
}

impl Coordinator {
    pub fn new(store: HistoryStore, initial: Vec<Message>) -> Self {
        Self {
            log: ConversationLog::from_messages(initial),
            store,
            session: None,
            live_index: None,
            pending: VecDeque::new(),
            last_save_error: None,
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn state(&self) -> CoordinatorState {
        if self.session.is_some() {
            CoordinatorState::AwaitingResponse
        } else {
            CoordinatorState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    /// Save failure from the most recent persisting operation, if any.
    /// In-memory state is always ahead of a failed save.
    pub fn take_save_error(&mut self) -> Option<String> {
        self.last_save_error.take()
    }

    /// Prompt sent to the backend: optional context snippet, the prior
    /// conversation as role-labelled lines, then the new user line.
    pub fn build_prompt(&self, config: &AssistantConfig, text: &str) -> String {
        let mut conversation = String::new();
        if let Some(context) = config::read_context_snippet(config.context_path.as_deref()) {
            conversation.push_str(&context);
            conversation.push_str("\n\n");
        }
        if !self.log.is_empty() {
            conversation.push_str("Previous conversation:\n");
            conversation.push_str(&self.log.transcript());
            conversation.push_str("\n\n");
        }
        conversation.push_str("user: ");
        conversation.push_str(text);
        conversation
    }

    /// Start a turn: append and persist the user message, append a live
    /// placeholder (never persisted), and launch the streaming session.
    pub fn submit(
        &mut self,
        text: &str,
        handle: &Handle,
        http: reqwest::Client,
        config: &AssistantConfig,
    ) -> Result<(), ActionError> {
        if self.session.is_some() {
            return Err(ActionError::Busy);
        }

        let prompt = self.build_prompt(config, text);
        self.push_user_turn(text);

        let request = GenerateRequest {
            model: config.model.clone(),
            prompt,
            stream: true,
        };
        self.session = Some(StreamSession::start(
            handle,
            http,
            &config.base_url,
            request,
            Duration::from_secs(config.stream_timeout_secs),
        ));
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn submit_injected(
        &mut self,
        text: &str,
        session: StreamSession,
    ) -> Result<(), ActionError> {
        if self.session.is_some() {
            return Err(ActionError::Busy);
        }
        self.push_user_turn(text);
        self.session = Some(session);
        Ok(())
    }

    fn push_user_turn(&mut self, text: &str) {
        self.log.append(Message::user(text));
        self.persist();
        self.live_index = Some(self.log.append(Message::assistant(PLACEHOLDER_TEXT)));
    }

    /// Remove a message and persist. The live placeholder is not deletable;
    /// deleting below it shifts its tracked index.
    pub fn delete(&mut self, index: usize) -> Result<Message, ActionError> {
        if self.live_index == Some(index) {
            return Err(ActionError::LiveMessage);
        }
        let removed = self.log.remove_at(index)?;
        if let Some(live) = self.live_index {
            if live > index {
                self.live_index = Some(live - 1);
            }
        }
        self.persist();
        Ok(removed)
    }

    /// Drop the whole conversation and persist the empty log. Rejected while
    /// a stream is in flight.
    pub fn clear(&mut self) -> Result<(), ActionError> {
        if self.session.is_some() {
            return Err(ActionError::Busy);
        }
        self.log.clear();
        self.persist();
        Ok(())
    }

    /// Apply everything the background task has produced so far and return
    /// the next update. Consecutive chunks are coalesced into one `Live`
    /// update; terminal events finish the turn and drop the session.
    pub fn drain(&mut self) -> TurnUpdate {
        if let Some(update) = self.pending.pop_front() {
            return update;
        }

        let mut events = Vec::new();
        if let Some(session) = self.session.as_mut() {
            while let Some(ev) = session.poll_event() {
                events.push(ev);
            }
        }
        if events.is_empty() {
            return TurnUpdate::None;
        }

        let mut batched_text: Option<String> = None;
        let mut batched_delta = String::new();

        macro_rules! flush_batch {
            () => {
                if let Some(text) = batched_text.take() {
                    let delta = std::mem::take(&mut batched_delta);
                    if let Some(msg) = self.live_index.and_then(|i| self.log.get_mut(i)) {
                        msg.text = text;
                        self.pending.push_back(TurnUpdate::Live(msg.clone(), delta));
                    }
                }
            };
        }

        for ev in events {
            match ev {
                ChatEvent::Chunk { text, delta } => {
                    batched_text = Some(text);
                    batched_delta.push_str(&delta);
                }
                ChatEvent::Done { text } => {
                    flush_batch!();
                    self.finish_turn_ok(&text);
                }
                ChatEvent::Error(err) => {
                    flush_batch!();
                    self.finish_turn_err(err);
                }
            }
        }
        flush_batch!();

        self.pending.pop_front().unwrap_or(TurnUpdate::None)
    }

    fn finish_turn_ok(&mut self, full_text: &str) {
        self.remove_placeholder();

        let mut appended = Vec::new();
        for segment in split_segments(full_text) {
            let msg = if segment.code {
                Message::code(segment.text)
            } else {
                Message::assistant(segment.text)
            };
            self.log.append(msg.clone());
            appended.push(msg);
        }

        self.session = None;
        self.persist();
        self.pending.push_back(TurnUpdate::Completed(appended));
    }

    fn finish_turn_err(&mut self, err: StreamError) {
        self.remove_placeholder();

        let msg = Message::assistant(format!("Error: {}", err));
        self.log.append(msg.clone());

        self.session = None;
        self.persist();
        self.pending.push_back(TurnUpdate::Failed(msg));
    }

    fn remove_placeholder(&mut self) {
        if let Some(index) = self.live_index.take() {
            let _ = self.log.remove_at(index);
        }
    }

    /// Write the log to disk, skipping the live placeholder so a mid-stream
    /// save never persists it. Failures are recorded, never fatal.
    fn persist(&mut self) {
        let messages: Vec<Message> = match self.live_index {
            Some(live) => self
                .log
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != live)
                .map(|(_, m)| m.clone())
                .collect(),
            None => self.log.all().to_vec(),
        };

        if let Err(e) = self.store.save(&messages) {
            eprintln!("[COORDINATOR] Failed to save history: {}", e);
            self.last_save_error = Some(e.to_string());
        }
    }
}
