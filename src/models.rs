//! Model listing against the backend's `/api/tags` endpoint, with a
//! short-lived in-process cache so interactive commands do not hammer a
//! local server that rarely changes.

use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

struct ModelCache {
    names: Vec<String>,
    last_fetch: Instant,
}

lazy_static::lazy_static! {
    static ref MODEL_CACHE: Arc<Mutex<Option<ModelCache>>> = Arc::new(Mutex::new(None));
    static ref FETCH_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
}

async fn fetch_models_from_server(
    base_url: &str,
) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = client.get(&url).send().await?;
    let response_text = response.text().await?;

    let tags: TagsResponse = match serde_json::from_str(&response_text) {
        Ok(res) => res,
        Err(e) => {
            eprintln!("[MODELS] Tag listing did not parse: {}", e);
            eprintln!("[MODELS] Body began with: {:.1000}", response_text);
            return Err(Box::new(e));
        }
    };

    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

/// Installed model names, cached for a few minutes. Transient fetch failures
/// are retried with backoff; when every attempt fails the stale cache is
/// served.
pub async fn list_models(base_url: &str) -> Vec<String> {
    if let Ok(cache) = MODEL_CACHE.lock() {
        if let Some(ref cached) = *cache {
            if cached.last_fetch.elapsed() < CACHE_TTL {
                return cached.names.clone();
            }
        }
    }

    let _lock = FETCH_LOCK.lock().await;

    if let Ok(cache) = MODEL_CACHE.lock() {
        if let Some(ref cached) = *cache {
            if cached.last_fetch.elapsed() < CACHE_TTL {
                return cached.names.clone();
            }
        }
    }

    let mut failures = 0;
    let max_failures = 2;

    loop {
        match fetch_models_from_server(base_url).await {
            Ok(names) => {
                if let Ok(mut cache) = MODEL_CACHE.lock() {
                    *cache = Some(ModelCache {
                        names: names.clone(),
                        last_fetch: Instant::now(),
                    });
                    eprintln!(
                        "[MODELS] Cache refreshed: {} models at {}",
                        names.len(),
                        base_url
                    );
                }
                return names;
            }
            Err(e) => {
                failures += 1;
                if failures > max_failures {
                    eprintln!(
                        "[MODELS] Giving up on {} after {} attempts: {}",
                        base_url, failures, e
                    );
                    break;
                }

                let delay = Duration::from_millis(500 * (1 << (failures - 1)));
                eprintln!(
                    "[MODELS] Attempt {} failed ({}); retrying in {:?}",
                    failures, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    if let Ok(cache) = MODEL_CACHE.lock() {
        if let Some(ref cached) = *cache {
            eprintln!("[MODELS] Refresh failed; serving the stale cache");
            return cached.names.clone();
        }
    }

    Vec::new()
}

/// Quick connectivity probe against `/api/tags`.
pub async fn check_backend(base_url: &str) -> Result<(), String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| e.to_string())?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Cannot reach the backend: {}", e))?;

    if response.status().is_success() {
        Ok(())
    } else {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(format!("Backend answered {}: {}", status, text))
    }
}

pub fn clear_cache() {
    if let Ok(mut cache) = MODEL_CACHE.lock() {
        *cache = None;
    }
}
