use std::sync::mpsc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::protocol::{ChatEvent, GenerateChunk, GenerateRequest, StreamError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Streaming,
    Completed,
    Failed,
}

/// One streaming exchange with the backend. The HTTP request and NDJSON
/// decode run on a background task; events cross back over a FIFO channel
/// and are consumed with [`poll_event`](StreamSession::poll_event) from the
/// presentation side. Dropping the session aborts the task.
pub struct StreamSession {
    state: SessionState,
    prompt: String,
    rx: mpsc::Receiver<ChatEvent>,
    abort_handle: Option<AbortHandle>,
}

impl StreamSession {
    pub fn start(
        handle: &Handle,
        http: reqwest::Client,
        base_url: &str,
        request: GenerateRequest,
        stall: Duration,
    ) -> Self {
        let prompt = request.prompt.clone();
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let (tx, rx) = mpsc::channel();

        let task = handle.spawn(run_stream(http, url, request, stall, tx));

        Self {
            state: SessionState::Pending,
            prompt,
            rx,
            abort_handle: Some(task.abort_handle()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_receiver(prompt: String, rx: mpsc::Receiver<ChatEvent>) -> Self {
        Self {
            state: SessionState::Pending,
            prompt,
            rx,
            abort_handle: None,
        }
    }

    /// Next event, if one is ready. Tracks the observable state machine:
    /// Pending becomes Streaming on the first chunk, Done/Error are terminal.
    /// A channel that closes without a terminal event is reported as a
    /// transport failure.
    pub fn poll_event(&mut self) -> Option<ChatEvent> {
        if self.is_terminal() {
            return None;
        }

        match self.rx.try_recv() {
            Ok(ev) => {
                match &ev {
                    ChatEvent::Chunk { .. } => {
                        if self.state == SessionState::Pending {
                            self.state = SessionState::Streaming;
                        }
                    }
                    ChatEvent::Done { .. } => self.state = SessionState::Completed,
                    ChatEvent::Error(_) => self.state = SessionState::Failed,
                }
                Some(ev)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.state = SessionState::Failed;
                Some(ChatEvent::Error(StreamError::Transport(
                    "stream ended unexpectedly".to_string(),
                )))
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Completed | SessionState::Failed)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Some(handle) = self.abort_handle.take() {
            handle.abort();
        }
    }
}

enum LineOutcome {
    Continue,
    Done,
    Fatal,
}

/// A complete buffered line as text. Lines that are not valid UTF-8 are
/// skipped like any other malformed line.
fn decode_line(bytes: &[u8]) -> Option<&str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            eprintln!("[STREAM] Skipping malformed line: {}", e);
            None
        }
    }
}

fn handle_line(line: &str, accumulated: &mut String, tx: &mpsc::Sender<ChatEvent>) -> LineOutcome {
    if line.is_empty() {
        return LineOutcome::Continue;
    }

    let parsed: GenerateChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            eprintln!("[STREAM] Skipping malformed line: {}", e);
            return LineOutcome::Continue;
        }
    };

    if let Some(err) = parsed.error {
        let _ = tx.send(ChatEvent::Error(StreamError::Backend(err)));
        return LineOutcome::Fatal;
    }

    if let Some(fragment) = parsed.response {
        if !fragment.is_empty() {
            accumulated.push_str(&fragment);
            let _ = tx.send(ChatEvent::Chunk {
                text: accumulated.clone(),
                delta: fragment,
            });
        }
    }

    if parsed.done.unwrap_or(false) {
        LineOutcome::Done
    } else {
        LineOutcome::Continue
    }
}

async fn run_stream(
    http: reqwest::Client,
    url: String,
    request: GenerateRequest,
    stall: Duration,
    tx: mpsc::Sender<ChatEvent>,
) {
    let response = match http.post(&url).json(&request).send().await {
        Ok(res) => res,
        Err(e) => {
            let _ = tx.send(ChatEvent::Error(StreamError::Transport(e.to_string())));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let _ = tx.send(ChatEvent::Error(StreamError::Status(status.as_u16())));
        return;
    }

    let mut stream = response.bytes_stream();
    // Chunk boundaries can split a multi-byte character; decode only
    // complete lines.
    let mut buffer: Vec<u8> = Vec::new();
    let mut accumulated = String::new();
    let mut saw_done = false;

    'read: loop {
        let chunk = match tokio::time::timeout(stall, stream.next()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_) => {
                let _ = tx.send(ChatEvent::Error(StreamError::Stalled(stall.as_secs())));
                return;
            }
        };

        let bytes = match chunk {
            Ok(data) => data,
            Err(e) => {
                let _ = tx.send(ChatEvent::Error(StreamError::Transport(e.to_string())));
                return;
            }
        };

        buffer.extend_from_slice(&bytes);
        while let Some(idx) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = buffer.drain(..=idx).collect();
            let Some(line) = decode_line(&line_bytes) else {
                continue;
            };

            match handle_line(line.trim(), &mut accumulated, &tx) {
                LineOutcome::Continue => {}
                LineOutcome::Done => {
                    saw_done = true;
                    break 'read;
                }
                LineOutcome::Fatal => return,
            }
        }
    }

    // A final line without a trailing newline still counts.
    if !saw_done {
        if let Some(line) = decode_line(&buffer) {
            if let LineOutcome::Fatal = handle_line(line.trim(), &mut accumulated, &tx) {
                return;
            }
        }
    }

    let _ = tx.send(ChatEvent::Done { text: accumulated });
}
