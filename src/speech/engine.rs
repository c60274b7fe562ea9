//! Transcription engines. The daemon shells out to an external command so
//! any CLI recognizer can back it without rebuilding the server.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::speech::progress::ProgressCell;
use crate::speech::wav::write_wav_file;
use crate::speech::SAMPLE_RATE;

#[derive(Debug)]
pub enum EngineError {
    Io(io::Error),
    Encode(hound::Error),
    /// Non-zero exit from the transcription command.
    Command(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Io(e) => write!(f, "{}", e),
            EngineError::Encode(e) => write!(f, "failed to encode audio: {}", e),
            EngineError::Command(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<hound::Error> for EngineError {
    fn from(e: hound::Error) -> Self {
        EngineError::Encode(e)
    }
}

pub trait SpeechEngine: Send + Sync {
    fn transcribe(&self, samples: &[f32]) -> Result<String, EngineError>;
}

/// Runs an external command over a temp WAV file and returns its stdout.
/// `{file}` in the template is replaced with the path; a template without
/// the placeholder gets the path appended.
pub struct CommandEngine {
    command: String,
    counter: AtomicU64,
}

impl CommandEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Staged load: validate the template, then probe it with half a second
    /// of silence. A failure latches the cell at -1.
    pub fn load(&self, progress: &ProgressCell) -> bool {
        progress.set(10, "Checking transcription command...");
        if self.command.trim().is_empty() {
            progress.fail("transcription command is empty");
            return false;
        }

        progress.set(50, "Warming up with silence...");
        let silence = vec![0.0_f32; (SAMPLE_RATE / 2) as usize];
        match self.transcribe(&silence) {
            Ok(_) => {
                progress.set(100, "Ready");
                true
            }
            Err(e) => {
                progress.fail(e);
                false
            }
        }
    }

    fn temp_wav_path(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("asrd-{}-{}.wav", std::process::id(), n))
    }
}

impl SpeechEngine for CommandEngine {
    fn transcribe(&self, samples: &[f32]) -> Result<String, EngineError> {
        let path = self.temp_wav_path();
        write_wav_file(&path, samples)?;

        let path_str = path.display().to_string();
        let cmd_str = if self.command.contains("{file}") {
            self.command.replace("{file}", &path_str)
        } else {
            format!("{} {}", self.command, path_str)
        };

        #[cfg(target_os = "windows")]
        let output = Command::new("cmd").args(["/C", &cmd_str]).output();
        #[cfg(not(target_os = "windows"))]
        let output = Command::new("sh").arg("-c").arg(&cmd_str).output();

        let _ = std::fs::remove_file(&path);

        let output = output?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(EngineError::Command(format!(
                "transcription command exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_command_receives_wav_file() {
        let engine = CommandEngine::new("test -s {file} && echo heard you");
        let text = engine.transcribe(&[0.0_f32; 1600]).unwrap();
        assert_eq!(text, "heard you");
    }

    #[cfg(unix)]
    #[test]
    fn test_path_appended_without_placeholder() {
        let engine = CommandEngine::new("basename");
        let text = engine.transcribe(&[0.0_f32; 16]).unwrap();
        assert!(text.starts_with("asrd-"), "unexpected output: {}", text);
        assert!(text.ends_with(".wav"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_reports_stderr() {
        let engine = CommandEngine::new("echo boom >&2; exit 3");
        match engine.transcribe(&[0.0_f32; 16]) {
            Err(EngineError::Command(msg)) => assert!(msg.contains("boom"), "got: {}", msg),
            other => panic!("expected command error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_load_reaches_ready() {
        let engine = CommandEngine::new("echo ok");
        let progress = ProgressCell::new();
        assert!(engine.load(&progress));
        assert!(progress.get().is_ready());
    }

    #[cfg(unix)]
    #[test]
    fn test_load_failure_latches_cell() {
        let engine = CommandEngine::new("exit 1");
        let progress = ProgressCell::new();
        assert!(!engine.load(&progress));

        let state = progress.get();
        assert!(state.is_failed());
        assert!(state.message.starts_with("Error:"));
    }

    #[test]
    fn test_empty_command_fails_fast() {
        let engine = CommandEngine::new("   ");
        let progress = ProgressCell::new();
        assert!(!engine.load(&progress));
        assert!(progress.get().is_failed());
    }
}
