//! CLI command definitions and parsing
use crate::search::TimeWindow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "viralscan",
    version,
    author = "neur0map",
    about = "Find the most viral recent posts across subreddits",
    long_about = "Viralscan fetches top posts from several subreddits at once, ranks them by \
                  engagement per hour and caches the ranked results for repeated searches."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/viralscan/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search subreddits for the most viral posts
    Search {
        /// Subreddit to search (repeatable, "r/" prefix optional)
        #[arg(short, long = "source", value_name = "NAME", required = true)]
        sources: Vec<String>,

        /// Time window: 1h, 1d, 10d or 100d (defaults to config)
        #[arg(short, long)]
        window: Option<TimeWindow>,

        /// Number of results to return (defaults to config)
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the default configuration path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "viralscan", "search", "-s", "tifu", "--source", "r/AskReddit", "-w", "10d", "-n", "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                sources,
                window,
                count,
                json,
            } => {
                assert_eq!(sources, vec!["tifu", "r/AskReddit"]);
                assert_eq!(window, Some(TimeWindow::TenDays));
                assert_eq!(count, Some(5));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_source() {
        assert!(Cli::try_parse_from(["viralscan", "search"]).is_err());
        assert!(Cli::try_parse_from(["viralscan", "search", "-s", "aa", "-w", "2d"]).is_err());
    }
}
