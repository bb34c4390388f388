//! Stricture CLI: the `stricture` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    support::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            roots,
            manifest,
            format,
            threads,
            no_cache,
            aliases,
        } => commands::check::run(commands::check::Args {
            roots,
            manifest,
            format,
            threads,
            no_cache,
            aliases,
        }),

        Commands::Rules { json } => commands::rules::run(json),

        Commands::ValidateManifest { manifest, json } => {
            commands::validate_manifest::run(manifest, json)
        }
    }
}
