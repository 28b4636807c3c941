use std::process;
use clap::Parser;

use animenews::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        let e = anyhow::Error::new(e).context("animenews failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
