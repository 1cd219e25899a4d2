//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rate-aware GitHub stargazer fetcher
#[derive(Parser, Debug)]
#[command(name = "stargazer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Bearer token (overrides settings and environment)
    #[arg(short, long, global = true)]
    pub token: Option<String>,

    /// Items per page (1-100)
    #[arg(long, global = true)]
    pub page_size: Option<u8>,

    /// Total calls allowed for one page
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Use the GraphQL API instead of REST
    #[arg(long, global = true)]
    pub graphql: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the users who starred a repository
    Stargazers {
        /// Repository as owner/name
        repo: String,
    },

    /// List the repositories a user starred
    Starred {
        /// User login
        user: String,
    },

    /// Find repositories co-starred by a repository's stargazers
    Neighbours {
        /// Repository as owner/name
        repo: String,

        /// Only inspect the first N stargazers
        #[arg(long)]
        max_stargazers: Option<usize>,

        /// Minimum shared stargazers for a repository to be reported
        #[arg(long, default_value = "2")]
        min_shared: usize,
    },

    /// Start HTTP server mode
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Print the effective settings (token redacted)
    Config,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one identity per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stargazers_with_globals() {
        let cli = Cli::try_parse_from([
            "stargazer",
            "stargazers",
            "rust-lang/rust",
            "--page-size",
            "50",
            "--graphql",
            "-f",
            "pretty",
        ])
        .unwrap();

        assert_eq!(cli.page_size, Some(50));
        assert!(cli.graphql);
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert!(matches!(cli.command, Commands::Stargazers { ref repo } if repo == "rust-lang/rust"));
    }

    #[test]
    fn test_parse_neighbours_defaults() {
        let cli = Cli::try_parse_from(["stargazer", "neighbours", "octo/a"]).unwrap();
        match cli.command {
            Commands::Neighbours {
                repo,
                max_stargazers,
                min_shared,
            } => {
                assert_eq!(repo, "octo/a");
                assert_eq!(max_stargazers, None);
                assert_eq!(min_shared, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_port() {
        let cli = Cli::try_parse_from(["stargazer", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: 9000 }));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_page_size_must_be_numeric() {
        assert!(Cli::try_parse_from(["stargazer", "starred", "u", "--page-size", "lots"]).is_err());
    }
}
