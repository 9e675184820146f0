//! Binary crate for the `watertemp` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Setting up the log file
//! - The interactive menu and human-friendly output

use clap::Parser;

mod cli;
mod clock;
mod logging;
mod menu;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
