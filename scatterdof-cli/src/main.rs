mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Plan {
            input,
            frames,
            unsupported,
        } => commands::plan::run(&input, frames, unsupported),
        cli::Command::Table => commands::table::run(),
        cli::Command::Params { input } => commands::params::run(&input),
    }
}
