mod cmd;
mod config;
mod error;

use std::fmt;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        write!(w, "[{:>4}.{:03}s]", d.as_secs(), d.subsec_millis())
    }
}

#[derive(Parser)]
#[command(name = "sbx", version, about = "Provision sandboxes on a remote control plane")]
struct Cli {
    #[command(flatten)]
    connection: config::ConnectionArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve apps
    #[command(subcommand)]
    App(cmd::AppCommand),
    /// Create sandboxes
    #[command(subcommand)]
    Sandbox(cmd::SandboxCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::App(command) => cmd::run_app(&cli.connection, command).await,
        Command::Sandbox(command) => cmd::run_sandbox(&cli.connection, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
