use clap::Args;
use scoring_processor::config::AppConfig;
use scoring_processor::error::AppError;
use scoring_processor::{http_router, telemetry};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// Topic the message is treated as delivered on
    #[arg(long)]
    pub(crate) topic: String,
    /// Path to the raw JSON message
    #[arg(long)]
    pub(crate) file: PathBuf,
}

pub(crate) async fn run_replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let body = std::fs::read_to_string(&args.file)?;
    let router = http_router(&config)?;
    let dispatch = router.dispatch(&args.topic, &body).await?;

    let rendered = serde_json::to_string_pretty(&dispatch).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
