//! Medianet CLI - main entry point.

use clap::Parser;
use medianet_cli::{commands::run_cli, commands::Cli};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
