use clap::Parser;
use sola_lsp::SolaLanguageServer;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

/// Language server for Sola. Speaks LSP over stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "sola-lsp", version, about)]
struct Cli {
    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

fn init_logging(log: Option<&PathBuf>) -> std::io::Result<()> {
    // stdout carries the protocol, logs never go there
    let filter = || EnvFilter::try_from_env("SOLA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log.as_ref()) {
        eprintln!("sola-lsp: cannot open log file: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting sola-lsp");

    let (service, socket) = LspService::new(SolaLanguageServer::new);
    Server::new(stdin(), stdout(), socket).serve(service).await;

    tracing::info!("sola-lsp stopped");
    ExitCode::SUCCESS
}
