mod cli;
mod infra;
mod replay;
mod routes;
mod server;

use scoring_processor::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
