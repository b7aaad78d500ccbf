//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Filter and list traq tickets (`SQLite`)
#[derive(Parser, Debug)]
#[command(name = "tq", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: .traq/traq.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a traq workspace in the current directory
    Init(InitArgs),

    /// Import projects, users and tickets from a YAML file
    Import(ImportArgs),

    /// List a project's tickets through filters
    #[command(alias = "list")]
    Tickets(TicketsArgs),

    /// Show open and closed ticket counts of a project
    Counts(CountsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct InitArgs {
    /// Recreate the database if it already exists
    #[arg(long)]
    pub force: bool,

    /// Skip the default statuses, types, priorities and severities
    #[arg(long)]
    pub no_defaults: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// YAML file to import
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TicketsArgs {
    /// Project slug
    pub project: String,

    /// Filter as name=value (repeatable), e.g. -f status=!Closed -f milestone=1.0,1.1
    #[arg(short, long = "filter", value_name = "NAME=VALUE")]
    pub filters: Vec<String>,

    /// Sort order: id, summary, created, updated, priority, severity or status,
    /// optionally suffixed with .asc or .desc
    #[arg(long)]
    pub order: Option<String>,

    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Tickets per page
    #[arg(long)]
    pub per_page: Option<usize>,

    /// Print the generated SQL and its parameters instead of running it
    #[arg(long)]
    pub explain: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CountsArgs {
    /// Project slug
    pub project: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "tq",
            "tickets",
            "traq",
            "-f",
            "status=!Closed",
            "--filter",
            "milestone=1.0,1.1",
            "--order",
            "priority.desc",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Tickets(args) = cli.command else {
            panic!("expected tickets");
        };
        assert_eq!(args.project, "traq");
        assert_eq!(args.filters, vec!["status=!Closed", "milestone=1.0,1.1"]);
        assert_eq!(args.order.as_deref(), Some("priority.desc"));
        assert_eq!(args.page, 1);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tq", "counts", "traq", "-vv", "--lock-timeout", "500"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.lock_timeout, Some(500));
    }
}
