use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::report::Level;

#[derive(Debug, Clone, Parser)]
#[command(name = "plugin-analyzer")]
#[command(about = "Find API-compatibility hazards in compiled Gradle plugins")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with analyzer settings.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Universe cache database.
    #[arg(long, value_name = "FILE", global = true)]
    pub cache: Option<PathBuf>,

    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Maven-layout repository used to resolve coordinates.
    #[arg(long, value_name = "DIR", global = true)]
    pub m2: Option<PathBuf>,

    /// Log filter for stderr, overridden by RUST_LOG.
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Analyze artifacts and write their reports.
    Analyze {
        #[arg(
            long,
            value_name = "FILE",
            conflicts_with = "artifact",
            required_unless_present = "artifact"
        )]
        manifest: Option<PathBuf>,

        #[arg(long, value_name = "COORD")]
        artifact: Option<String>,

        /// Binary location for `--artifact`; skips resolution. Repeatable.
        #[arg(long = "path", value_name = "PATH", requires = "artifact")]
        paths: Vec<PathBuf>,

        #[arg(long, value_name = "URL", requires = "artifact")]
        source_url: Option<String>,

        #[arg(long, value_name = "LEVEL")]
        min_level: Option<Level>,

        #[arg(long, value_name = "N")]
        threads: Option<usize>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Aggregate previously written JSON reports into markdown.
    Render {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    ClearCache,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}
