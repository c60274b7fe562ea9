use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use famulus::config::{self, AssistantConfig};
use famulus::conversation_store::{default_history_path, HistoryStore};
use famulus::coordinator::{Coordinator, CoordinatorState, TurnUpdate};
use famulus::models;
use famulus::protocol::{Message, MessageKind};
use famulus::speech::client::SpeechClient;
use famulus::speech::wav::read_wav_file;

#[derive(Parser)]
#[command(name = "famulus", about = "Terminal assistant backed by a local model server")]
struct Args {
    /// Config file path. Defaults to the per-user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

struct App {
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
    coordinator: Coordinator,
    config: AssistantConfig,
    config_path: PathBuf,
}

fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[MAIN] Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path);

    let history_path = config
        .history_path
        .clone()
        .unwrap_or_else(default_history_path);
    let store = HistoryStore::new(history_path);
    let initial = match store.load() {
        Ok(messages) => messages,
        Err(e) => {
            eprintln!("[MAIN] Could not read history ({}), starting fresh", e);
            Vec::new()
        }
    };

    let mut app = App {
        runtime,
        http: reqwest::Client::new(),
        coordinator: Coordinator::new(store, initial),
        config,
        config_path,
    };

    // Probe the backend without holding up the prompt.
    let base_url = app.config.base_url.clone();
    app.runtime.spawn(async move {
        if let Err(e) = models::check_backend(&base_url).await {
            eprintln!("[MAIN] Backend check failed: {}", e);
        }
    });

    app.run();
}

impl App {
    fn run(&mut self) {
        println!("Type /help for commands.");
        for message in self.coordinator.log().all() {
            print_message(message);
        }

        let stdin = io::stdin();
        let mut input = String::new();
        loop {
            print!("> ");
            let _ = io::stdout().flush();

            input.clear();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("[MAIN] Input error: {}", e);
                    break;
                }
            }

            let line = input.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if !self.command(line) {
                    break;
                }
                continue;
            }
            self.submit_turn(line);
        }
    }

    fn submit_turn(&mut self, text: &str) {
        let handle = self.runtime.handle().clone();
        if let Err(e) = self
            .coordinator
            .submit(text, &handle, self.http.clone(), &self.config)
        {
            println!("{}", e);
            return;
        }
        self.pump();
    }

    /// Print streamed output until the turn reaches a terminal state.
    fn pump(&mut self) {
        let mut printed = false;
        loop {
            match self.coordinator.drain() {
                TurnUpdate::Live(_, delta) => {
                    print!("{}", delta);
                    let _ = io::stdout().flush();
                    printed = true;
                }
                TurnUpdate::Completed(messages) => {
                    if printed {
                        println!();
                    } else if messages.is_empty() {
                        println!("(no response)");
                    }
                    break;
                }
                TurnUpdate::Failed(message) => {
                    if printed {
                        println!();
                    }
                    println!("{}", message.text);
                    break;
                }
                TurnUpdate::None => {
                    if self.coordinator.state() == CoordinatorState::Idle {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
        self.report_save_error();
    }

    /// Returns false when the user asked to quit.
    fn command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match cmd {
            "/help" => print_help(),
            "/quit" | "/exit" => return false,
            "/list" => {
                for (i, message) in self.coordinator.log().iter().enumerate() {
                    let label = match message.kind {
                        MessageKind::User => "user",
                        MessageKind::Assistant => "assistant",
                        MessageKind::Code => "code",
                    };
                    let first_line = message.text.lines().next().unwrap_or("");
                    println!("[{}] {}: {}", i, label, first_line);
                }
            }
            "/delete" => match rest.parse::<usize>() {
                Ok(index) => match self.coordinator.delete(index) {
                    Ok(removed) => {
                        let first_line = removed.text.lines().next().unwrap_or("");
                        println!("Removed [{}] {}", index, first_line);
                        self.report_save_error();
                    }
                    Err(e) => println!("{}", e),
                },
                Err(_) => println!("usage: /delete <index>"),
            },
            "/clear" => match self.coordinator.clear() {
                Ok(()) => {
                    println!("Conversation cleared.");
                    self.report_save_error();
                }
                Err(e) => println!("{}", e),
            },
            "/models" => {
                if rest == "refresh" {
                    models::clear_cache();
                }
                let names = self
                    .runtime
                    .block_on(models::list_models(&self.config.base_url));
                if names.is_empty() {
                    println!("No models found (is the backend running?)");
                } else {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
            "/model" => {
                if rest.is_empty() {
                    println!("Current model: {}", self.config.model);
                } else {
                    self.config.model = rest.to_string();
                    match config::save_config(&self.config_path, &self.config) {
                        Ok(()) => println!("Model set to {}", self.config.model),
                        Err(e) => println!(
                            "Model set to {} (config not saved: {})",
                            self.config.model, e
                        ),
                    }
                }
            }
            "/transcribe" => {
                if rest.is_empty() {
                    println!("usage: /transcribe <wav-file>");
                } else {
                    match read_wav_file(Path::new(rest)) {
                        Ok(samples) => {
                            let client = SpeechClient::new(&self.config.asr_url);
                            match self.runtime.block_on(client.transcribe(&samples)) {
                                Ok(text) => println!("{}", text),
                                Err(e) => println!("Transcription failed: {}", e),
                            }
                        }
                        Err(e) => println!("Could not read {}: {}", rest, e),
                    }
                }
            }
            "/status" => {
                let client = SpeechClient::new(&self.config.asr_url);
                match self.runtime.block_on(client.status()) {
                    Ok(p) => println!("{}% {}", p.percentage, p.message),
                    Err(e) => println!("Speech daemon unreachable: {}", e),
                }
            }
            _ => println!("Unknown command: {} (try /help)", cmd),
        }
        true
    }

    fn report_save_error(&mut self) {
        if let Some(err) = self.coordinator.take_save_error() {
            eprintln!("[MAIN] History not saved: {}", err);
        }
    }
}

fn print_message(message: &Message) {
    match message.kind {
        MessageKind::User => println!("> {}", message.text),
        MessageKind::Assistant => println!("{}", message.text),
        MessageKind::Code => {
            println!("```");
            println!("{}", message.text);
            println!("```");
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /help                 show this help");
    println!("  /list                 show messages with their indices");
    println!("  /delete <index>       remove one message");
    println!("  /clear                remove the whole conversation");
    println!("  /models [refresh]     list models installed on the backend");
    println!("  /model <name>         show or switch the model (saved to config)");
    println!("  /transcribe <wav>     send a WAV file to the speech daemon");
    println!("  /status               show the speech daemon's load state");
    println!("  /quit                 exit");
}
