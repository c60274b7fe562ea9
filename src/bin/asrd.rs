use std::sync::Arc;

use clap::Parser;

use famulus::speech::engine::CommandEngine;
use famulus::speech::progress::ProgressCell;
use famulus::speech::server::ServerWorker;

#[derive(Parser)]
#[command(name = "asrd", about = "Speech-to-text daemon")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: String,

    /// Shell command that transcribes a WAV file and prints the text;
    /// `{file}` is replaced with the path.
    #[arg(long)]
    command: String,
}

fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let progress = Arc::new(ProgressCell::new());
    let engine = Arc::new(CommandEngine::new(args.command.clone()));

    let worker = match ServerWorker::spawn(&args.addr, engine.clone(), progress.clone()) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("[ASR] {}", e);
            std::process::exit(1);
        }
    };

    // Load in the background so /status answers from the first moment.
    let loader_progress = progress.clone();
    std::thread::spawn(move || {
        if engine.load(&loader_progress) {
            eprintln!("[ASR] Engine ready");
        } else {
            eprintln!(
                "[ASR] Engine failed to load: {}",
                loader_progress.get().message
            );
        }
    });

    worker.wait();
}
