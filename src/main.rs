use clap::Parser;
use std::io::{self, IsTerminal};
use traq_rust::cli::commands;
use traq_rust::cli::{Cli, Commands};
use traq_rust::config;
use traq_rust::logging::init_logging;
use traq_rust::{StructuredError, TraqError};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, None) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);

    let result = match &cli.command {
        Commands::Init(args) => {
            commands::init::execute(args, cli.json, overrides.db.as_deref(), None)
        }
        Commands::Import(args) => commands::import::execute(args, cli.json, &overrides),
        Commands::Tickets(args) => commands::tickets::execute(args, cli.json, &overrides),
        Commands::Counts(args) => commands::counts::execute(args, cli.json, &overrides),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &TraqError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        db: cli
            .db
            .as_ref()
            .map(|path| std::path::absolute(path).unwrap_or_else(|_| path.clone())),
        lock_timeout: cli.lock_timeout,
        per_page: None,
        order: None,
    }
}
