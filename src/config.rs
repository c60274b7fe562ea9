use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_asr_url")]
    pub asr_url: String,
    /// Overrides the platform-default history file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
    /// Optional snippet file prepended to every prompt (written by other
    /// tools, e.g. a selection grabber). Absent file means no context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_path: Option<PathBuf>,
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            asr_url: default_asr_url(),
            history_path: None,
            context_path: None,
            stream_timeout_secs: default_stream_timeout(),
        }
    }
}

fn default_base_url() -> String {
    // Environment variable first, then the stock Ollama port.
    std::env::var("FAMULUS_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn default_model() -> String {
    std::env::var("FAMULUS_MODEL").unwrap_or_else(|_| "mistral".to_string())
}

fn default_asr_url() -> String {
    std::env::var("FAMULUS_ASR_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

fn default_stream_timeout() -> u64 {
    120
}

pub fn default_config_path() -> PathBuf {
    let Some(dirs) = ProjectDirs::from("com", "famulus", "famulus") else {
        return Path::new("famulus.json").to_path_buf();
    };
    dirs.config_dir().join("assistant.json")
}

pub fn load_config(path: &Path) -> AssistantConfig {
    let Ok(bytes) = fs::read(path) else {
        return AssistantConfig::default();
    };
    serde_json::from_slice::<AssistantConfig>(&bytes).unwrap_or_default()
}

pub fn save_config(path: &Path, cfg: &AssistantConfig) -> Result<(), String> {
    let json = serde_json::to_vec_pretty(cfg).map_err(|e| e.to_string())?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(path, json).map_err(|e| e.to_string())
}

/// Read the context snippet, if configured and non-empty. Unreadable or
/// blank files yield no context rather than an error.
pub fn read_context_snippet(path: Option<&Path>) -> Option<String> {
    let path = path?;
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("missing.json"));
        assert!(!cfg.base_url.is_empty());
        assert!(!cfg.model.is_empty());
        assert_eq!(cfg.stream_timeout_secs, 120);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant.json");

        let mut cfg = AssistantConfig::default();
        cfg.model = "llama3".to_string();
        cfg.history_path = Some(PathBuf::from("/tmp/h.json"));
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path);
        assert_eq!(loaded.model, "llama3");
        assert_eq!(loaded.history_path.as_deref(), Some(Path::new("/tmp/h.json")));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant.json");
        fs::write(&path, r#"{"model":"phi3"}"#).unwrap();

        let cfg = load_config(&path);
        assert_eq!(cfg.model, "phi3");
        assert!(!cfg.base_url.is_empty());
    }

    #[test]
    fn test_context_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.txt");

        assert_eq!(read_context_snippet(None), None);
        assert_eq!(read_context_snippet(Some(&path)), None);

        fs::write(&path, "  selected text \n").unwrap();
        assert_eq!(
            read_context_snippet(Some(&path)).as_deref(),
            Some("selected text")
        );

        fs::write(&path, "   \n\t").unwrap();
        assert_eq!(read_context_snippet(Some(&path)), None);
    }
}
