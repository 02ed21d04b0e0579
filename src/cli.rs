//! Command-line interface definitions for Herald Watch.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Global options can be provided via command-line flags or environment variables
//! and take precedence over the YAML config file.

use crate::models::{DigestKind, SourceKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Herald Watch application.
///
/// # Examples
///
/// ```sh
/// # Run the scheduler with the default schedule
/// herald_watch run
///
/// # Write notifications to disk instead of stdout
/// herald_watch --output-dir ./out run
///
/// # One-off checks
/// herald_watch check posts
/// herald_watch latest news
/// herald_watch reset posts
/// herald_watch digest reset-warning
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "HERALD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory for per-source dedup state
    #[arg(long, env = "HERALD_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory for JSON-lines output (stdout when unset)
    #[arg(short, long, env = "HERALD_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Target region; items for other regions are dropped (`all` disables)
    #[arg(long, env = "HERALD_REGION", global = true)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Diff a source against its cache now and deliver anything new
    Check {
        #[arg(value_enum)]
        source: SourceKind,
    },
    /// Preview a source's current relevant items without touching the cache
    Latest {
        #[arg(value_enum)]
        source: SourceKind,
    },
    /// Forget everything delivered for a source
    Reset {
        #[arg(value_enum)]
        source: SourceKind,
    },
    /// Build and deliver a digest now
    Digest {
        #[arg(value_enum)]
        kind: DigestKind,
    },
    /// Report extraction diagnostics for a source
    Test {
        #[arg(value_enum)]
        source: SourceKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["herald_watch", "--cache-dir", "/tmp/cache", "check", "posts"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(
            cli.command,
            Command::Check {
                source: SourceKind::Posts
            }
        );
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["herald_watch", "run", "-o", "/tmp/out", "--region", "eu"]);
        assert_eq!(cli.command, Command::Run);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.region.as_deref(), Some("eu"));
    }

    #[test]
    fn test_cli_digest_kinds() {
        let cli = Cli::parse_from(["herald_watch", "digest", "reset-checklist"]);
        assert_eq!(
            cli.command,
            Command::Digest {
                kind: DigestKind::ResetChecklist
            }
        );
        assert!(Cli::try_parse_from(["herald_watch", "digest", "someday"]).is_err());
        assert!(Cli::try_parse_from(["herald_watch", "latest", "forums"]).is_err());
    }
}
