//! Command-line interface for the typoguard lookalike scanner
//!
//! Global options select the blacklist store, an optional JSON config file
//! and the verification limits; they override values from the config file.
//!
//! # Usage Modes
//!
//! - `analyze` runs one pipeline and prints its report
//! - `batch` analyzes every domain listed in a file
//! - `generate` prints the candidates a run would verify, without DNS
//! - `list` and `stats` inspect the stored blacklist

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AnalysisConfig;
use crate::error::ConfigError;

/// Main command-line interface structure
///
/// ```no_run
/// use clap::Parser;
/// use typoguard::cli::{Cli, Commands};
///
/// let cli = Cli::parse_from(["typoguard", "analyze", "--domain", "example.com"]);
/// assert!(matches!(cli.command, Commands::Analyze { .. }));
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "typoguard",
    about = "Discover registered lookalike domains and record them as blacklist entries",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file (TLDs, keywords, confusables, resolvers)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Blacklist store (JSON lines, created if missing)
    #[arg(short, long, global = true, default_value = "blacklist.jsonl")]
    pub store: PathBuf,

    /// Maximum DNS lookups in flight
    #[arg(short = 'c', long, global = true)]
    pub concurrent_lookups: Option<usize>,

    /// Per-lookup timeout in milliseconds
    #[arg(short = 't', long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Confirmed entries between intermediate flushes
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Target TLDs, comma separated (overrides the config file)
    #[arg(long, global = true, value_delimiter = ',')]
    pub tlds: Option<Vec<String>>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate, verify and record lookalikes of one domain
    Analyze {
        /// Authentic domain (e.g., example.com)
        #[arg(short, long)]
        domain: String,
    },
    /// Analyze every domain in a file, one per line
    ///
    /// Empty lines and those starting with '#' are skipped. Runs are
    /// submitted in the background and reported as they finish.
    Batch {
        #[arg(short, long)]
        input_file: PathBuf,
    },
    /// Print candidates that would be verified, without DNS lookups
    Generate {
        #[arg(short, long)]
        domain: String,
    },
    /// Print stored entries as JSON lines
    List {
        /// Only entries for this original domain
        #[arg(short, long)]
        original: Option<String>,
    },
    /// Print the number of stored entries per original domain
    Stats,
}

impl Cli {
    /// Builds the effective configuration: defaults, then the config file,
    /// then command-line overrides.
    pub fn analysis_config(&self) -> Result<AnalysisConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(n) = self.concurrent_lookups {
            config.max_concurrent_lookups = n;
        }
        if let Some(ms) = self.timeout_ms {
            config.lookup_timeout_ms = ms;
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(tlds) = &self.tlds {
            config.tlds = tlds
                .iter()
                .map(|t| t.trim().trim_matches('.').to_ascii_lowercase())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }
}
