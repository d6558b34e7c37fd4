use std::process;
use clap::Parser;

use newsproxy::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
