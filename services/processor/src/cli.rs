use crate::replay::{run_replay, ReplayArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use scoring_processor::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Submission Scoring Processor",
    about = "Aggregate review scores into pass/fail review summations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the processor and its HTTP surface (default command)
    Serve(ServeArgs),
    /// Process a single event message from a file and print the outcome
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Replay(args) => run_replay(args).await,
    }
}
