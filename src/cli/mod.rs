pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "Keep a local feed database in sync with Miniflux", long_about = None)]
pub struct Cli {
    /// Database path (default: platform data dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file path (default: ~/.config/rill/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to the configured Miniflux instance and import its feeds
    Login {
        /// Override `service.endpoint`
        #[arg(long)]
        endpoint: Option<String>,

        /// Log in with this API token (switches `service.auth` to token)
        #[arg(long)]
        token: Option<String>,
    },
    /// Re-import feeds and categories for the current account
    Import,
    /// Fetch new items and reconcile read/starred state
    Sync {
        /// Keep running on the configured interval
        #[arg(short, long)]
        watch: bool,
    },
    /// List sources or items
    List {
        /// Show items instead of sources
        #[arg(long)]
        items: bool,

        /// Only items from this source (implies --items)
        #[arg(long)]
        source: Option<i64>,
    },
    /// Mark an item read
    Read { id: i64 },
    /// Mark an item unread
    Unread { id: i64 },
    /// Star an item
    Star { id: i64 },
    /// Unstar an item
    Unstar { id: i64 },
    /// Mark items read, optionally limited by source and date
    ReadAll {
        /// Source id, repeatable (default: all sources)
        #[arg(long = "source")]
        sources: Vec<i64>,

        /// Only items dated on or before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "after")]
        before: Option<String>,

        /// Only items dated on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        after: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_all_args() {
        let cli = Cli::try_parse_from([
            "rill", "read-all", "--source", "1", "--source", "3", "--before", "2024-05-01",
        ])
        .unwrap();

        match cli.command {
            Commands::ReadAll {
                sources,
                before,
                after,
            } => {
                assert_eq!(sources, vec![1, 3]);
                assert_eq!(before.as_deref(), Some("2024-05-01"));
                assert!(after.is_none());
            }
            _ => panic!("expected read-all"),
        }
    }

    #[test]
    fn test_before_and_after_conflict() {
        let result = Cli::try_parse_from([
            "rill", "read-all", "--before", "2024-05-01", "--after", "2024-04-01",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_items_of_source() {
        let cli = Cli::try_parse_from(["rill", "list", "--source", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                items: false,
                source: Some(4)
            }
        ));
    }

    #[test]
    fn test_global_db_flag() {
        let cli = Cli::try_parse_from(["rill", "sync", "--watch", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(cli.command, Commands::Sync { watch: true }));
    }
}
