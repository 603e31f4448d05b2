//! Command-line and environment settings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Local tool over the book catalog store.
#[derive(Debug, Parser)]
#[command(name = "catalog_cli", version)]
pub struct Cli {
    /// Store file path, or `:memory:`.
    #[arg(
        long = "store",
        env = "CATALOG_STORE",
        default_value = "catalog.sqlite3",
        global = true
    )]
    pub store_address: String,

    /// Log level name; defaults to debug in debug builds and info otherwise.
    #[arg(long, env = "CATALOG_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Absolute log directory. File logging is enabled only when set.
    #[arg(long, env = "CATALOG_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check the core library without opening a store.
    Ping,
    /// Create a book, or add copies to an existing one.
    Add {
        isbn: String,
        copies: u32,
        title: String,
        authors: Vec<String>,
    },
    Get {
        isbn: String,
    },
    SetTitle {
        isbn: String,
        title: String,
    },
    Remove {
        isbn: String,
    },
    /// Search titles and authors; a negative offset or limit is unbounded.
    Search {
        text: String,
        #[arg(default_value_t = -1, allow_negative_numbers = true)]
        offset: i64,
        #[arg(default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Add { .. } => "add",
            Self::Get { .. } => "get",
            Self::SetTitle { .. } => "set-title",
            Self::Remove { .. } => "remove",
            Self::Search { .. } => "search",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn argument_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_collects_trailing_authors_in_order() {
        let cli = Cli::try_parse_from([
            "catalog_cli",
            "add",
            "1",
            "2",
            "Good Omens",
            "Terry Pratchett",
            "Neil Gaiman",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Add {
                isbn: "1".to_string(),
                copies: 2,
                title: "Good Omens".to_string(),
                authors: vec!["Terry Pratchett".to_string(), "Neil Gaiman".to_string()],
            }
        );
    }

    #[test]
    fn search_page_bounds_default_to_unbounded_and_accept_negatives() {
        let cli = Cli::try_parse_from(["catalog_cli", "search", "hobbit"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Search {
                text: "hobbit".to_string(),
                offset: -1,
                limit: -1,
            }
        );

        let cli = Cli::try_parse_from(["catalog_cli", "search", "hobbit", "-1", "5"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Search {
                text: "hobbit".to_string(),
                offset: -1,
                limit: 5,
            }
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["catalog_cli", "add", "1", "many", "Title"]).is_err());
        assert!(Cli::try_parse_from(["catalog_cli", "get"]).is_err());
        assert!(Cli::try_parse_from(["catalog_cli"]).is_err());
    }

    #[test]
    fn store_flag_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["catalog_cli", "get", "1", "--store", ":memory:"]).unwrap();
        assert_eq!(cli.store_address, ":memory:");
        assert_eq!(cli.command, Command::Get { isbn: "1".to_string() });
        assert_eq!(cli.command.name(), "get");
    }
}
