use anyhow::Result;
use barista_cli::{Cli, launcher};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    launcher::run(cli).await
}
