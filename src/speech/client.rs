//! Client for the transcription daemon.

use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::speech::progress::LoadProgress;

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcription: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct SpeechClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpeechClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current loader state from `GET /status`.
    pub async fn status(&self) -> Result<LoadProgress, String> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        response
            .json::<LoadProgress>()
            .await
            .map_err(|e| e.to_string())
    }

    /// Send raw samples and return the transcript. The daemon's own error
    /// body is surfaced verbatim when it has one.
    pub async fn transcribe(&self, samples: &[f32]) -> Result<String, String> {
        let url = format!("{}/transcribe", self.base_url);
        let mut body = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            body.extend_from_slice(&sample.to_le_bytes());
        }

        let response = self
            .http
            .post(&url)
            .body(body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let payload: TranscribeResponse = response.json().await.map_err(|e| e.to_string())?;

        if let Some(error) = payload.error {
            return Err(error);
        }
        match payload.transcription {
            Some(text) => Ok(text),
            None => Err(format!(
                "malformed response from daemon (HTTP {})",
                status.as_u16()
            )),
        }
    }

    /// Poll `/status` until the engine is ready, has failed, or the
    /// deadline passes.
    pub async fn wait_ready(&self, deadline: Duration) -> Result<(), String> {
        let started = Instant::now();
        loop {
            match self.status().await {
                Ok(p) if p.is_ready() => return Ok(()),
                Ok(p) if p.is_failed() => return Err(p.message),
                Ok(p) => eprintln!("[ASR] Loading {}%: {}", p.percentage, p.message),
                Err(e) => eprintln!("[ASR] Status check failed: {}", e),
            }
            if started.elapsed() >= deadline {
                return Err("timed out waiting for the transcription daemon".to_string());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}
