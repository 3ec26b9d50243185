//! `wordforge` command-line entry point.

use anyhow::Result;
use clap::Parser;
use wordforge_engine::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
