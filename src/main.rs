use anyhow::Result;
use clap::Parser;
use log::info;
use pipewright::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting pipewright");
    cli.execute().await?;

    Ok(())
}
