use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stricture",
    about = "Stricture: contract and architecture conformance checks over a language-neutral IR",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse source roots against a manifest
    Check {
        /// Source roots to walk
        #[arg(default_value = ".")]
        roots: Vec<PathBuf>,

        /// Manifest path (YAML, or JSON by extension)
        #[arg(long, short, default_value = "stricture.yml")]
        manifest: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: FormatArg,

        /// Worker threads (defaults to one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Parse every file even when its content is unchanged
        #[arg(long)]
        no_cache: bool,

        /// Import prefix rewrite, `PREFIX=REPLACEMENT` (repeatable)
        #[arg(long = "alias", value_name = "PREFIX=REPLACEMENT")]
        aliases: Vec<String>,
    },

    /// List the built-in rules
    Rules {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and validate a manifest without analysing anything
    ValidateManifest {
        /// Manifest path
        #[arg(default_value = "stricture.yml")]
        manifest: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}
