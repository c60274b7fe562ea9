//! Shared load-progress state for the transcription daemon.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Loader state reported by `GET /status`. `percentage` runs 0..=100 during
/// a normal load; -1 means the engine failed and will never become ready.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub percentage: i32,
    pub message: String,
}

impl LoadProgress {
    pub fn is_ready(&self) -> bool {
        self.percentage == 100
    }

    pub fn is_failed(&self) -> bool {
        self.percentage < 0
    }
}

/// Status cell written by the loader thread and read by request handlers.
/// A failure latches: once at -1 the cell ignores further updates.
pub struct ProgressCell {
    inner: RwLock<LoadProgress>,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LoadProgress {
                percentage: 0,
                message: "Starting engine initialization...".to_string(),
            }),
        }
    }

    pub fn set(&self, percentage: i32, message: impl Into<String>) {
        if let Ok(mut guard) = self.inner.write() {
            if guard.percentage < 0 {
                return;
            }
            guard.percentage = percentage;
            guard.message = message.into();
        }
    }

    pub fn fail(&self, message: impl std::fmt::Display) {
        self.set(-1, format!("Error: {}", message));
    }

    pub fn get(&self) -> LoadProgress {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_advance() {
        let cell = ProgressCell::new();
        assert_eq!(cell.get().percentage, 0);

        cell.set(50, "Warming up with silence...");
        assert_eq!(cell.get().percentage, 50);
        assert!(!cell.get().is_ready());

        cell.set(100, "Ready");
        assert!(cell.get().is_ready());
        assert_eq!(cell.get().message, "Ready");
    }

    #[test]
    fn test_failure_latches() {
        let cell = ProgressCell::new();
        cell.fail("model exploded");

        let progress = cell.get();
        assert!(progress.is_failed());
        assert_eq!(progress.message, "Error: model exploded");

        // Later updates cannot un-fail the cell.
        cell.set(100, "Ready");
        assert!(cell.get().is_failed());
    }

    #[test]
    fn test_status_wire_shape() {
        let progress = LoadProgress {
            percentage: 70,
            message: "Loading model weights...".to_string(),
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["percentage"], 70);
        assert_eq!(json["message"], "Loading model weights...");
    }
}
