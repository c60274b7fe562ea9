//! HTTP face of the transcription daemon. Serves from the moment the
//! process starts, so clients can watch `/status` while the engine loads
//! in a background thread.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::speech::engine::SpeechEngine;
use crate::speech::progress::ProgressCell;
use crate::speech::SAMPLE_RATE;

/// Largest accepted request body: ten minutes of f32 samples.
const MAX_BODY_BYTES: usize = 10 * 60 * SAMPLE_RATE as usize * 4;

pub struct ServerWorker {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl ServerWorker {
    /// Bind `addr` and serve requests on a background thread.
    pub fn spawn(
        addr: &str,
        engine: Arc<dyn SpeechEngine>,
        progress: Arc<ProgressCell>,
    ) -> Result<Self, String> {
        let server = Server::http(addr).map_err(|e| format!("failed to bind {}: {}", addr, e))?;
        let local_addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| "server has no IP address".to_string())?;
        eprintln!("[ASR] Listening on http://{}", local_addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || {
            run_server(server, engine, progress, shutdown_clone);
        });

        Ok(Self {
            local_addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            eprintln!("[ASR] Failed to join server thread");
        }
    }

    /// Block until the server thread exits on its own.
    pub fn wait(self) {
        if self.handle.join().is_err() {
            eprintln!("[ASR] Server thread panicked");
        }
    }
}

fn run_server(
    server: Server,
    engine: Arc<dyn SpeechEngine>,
    progress: Arc<ProgressCell>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(250)) {
            Ok(Some(request)) => handle_request(request, &engine, &progress),
            Ok(None) => continue,
            Err(err) => {
                eprintln!("[ASR] Receive error: {}", err);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn handle_request(request: Request, engine: &Arc<dyn SpeechEngine>, progress: &ProgressCell) {
    let method = request.method().clone();
    let url = request.url().to_string();

    match (method, url.as_str()) {
        (Method::Get, "/status") => {
            let body = serde_json::to_string(&progress.get()).unwrap_or_else(|_| {
                "{\"percentage\":-1,\"message\":\"status unavailable\"}".to_string()
            });
            respond(request, StatusCode(200), &body);
        }
        (Method::Post, "/transcribe") => handle_transcribe(request, engine, progress),
        _ => respond_error(request, StatusCode(404), "not found"),
    }
}

fn handle_transcribe(
    mut request: Request,
    engine: &Arc<dyn SpeechEngine>,
    progress: &ProgressCell,
) {
    let state = progress.get();
    if state.is_failed() {
        respond_error(request, StatusCode(500), &state.message);
        return;
    }
    if !state.is_ready() {
        respond_error(request, StatusCode(503), "engine is still loading");
        return;
    }

    let mut body = Vec::new();
    if let Err(err) = request
        .as_reader()
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut body)
    {
        respond_error(
            request,
            StatusCode(400),
            &format!("failed to read body: {}", err),
        );
        return;
    }

    if body.is_empty() {
        respond_error(request, StatusCode(400), "empty audio payload");
        return;
    }
    if body.len() > MAX_BODY_BYTES {
        respond_error(request, StatusCode(400), "audio payload too large");
        return;
    }
    if body.len() % 4 != 0 {
        respond_error(
            request,
            StatusCode(400),
            "audio payload length must be a multiple of 4",
        );
        return;
    }

    let samples = decode_samples(&body);
    match engine.transcribe(&samples) {
        Ok(text) => {
            let body = json!({ "transcription": text }).to_string();
            respond(request, StatusCode(200), &body);
        }
        Err(err) => respond_error(request, StatusCode(500), &err.to_string()),
    }
}

fn decode_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn respond(request: Request, status: StatusCode, body: &str) {
    let mut response = Response::from_string(body.to_string()).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    if let Err(err) = request.respond(response) {
        eprintln!("[ASR] Failed to send response: {}", err);
    }
}

fn respond_error(request: Request, status: StatusCode, message: &str) {
    let body = json!({ "error": message }).to_string();
    respond(request, status, &body);
}
