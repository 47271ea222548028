mod cli;
mod commands;
mod manifest;
mod pdf;
mod resolve;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Combine {
            dir,
            outline,
            toc,
            manifest,
            yes,
        } => {
            let options = commands::combine::CombineOptions {
                outline,
                toc,
                use_manifest: manifest,
                assume_yes: yes,
            };
            commands::combine::run(&dir, &options)?;
        }
        Commands::Toc { path } => {
            commands::toc::run(&path)?;
        }
    }

    Ok(())
}
