use crate::cli::CountsArgs;
use crate::config;
use crate::error::Result;
use crate::model::TicketCounts;
use serde::Serialize;

#[derive(Serialize)]
struct CountsOutput<'a> {
    project: &'a str,
    open: usize,
    closed: usize,
    total: usize,
}

/// Execute the counts command.
///
/// # Errors
///
/// Returns an error if the project does not exist or the query fails.
pub fn execute(args: &CountsArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let ctx = config::open_storage_with_cli(cli)?;
    let project = ctx.storage.require_project(&args.project)?;
    let TicketCounts { open, closed } = ctx.storage.ticket_counts(project.id)?;

    if json {
        let output = CountsOutput {
            project: &project.slug,
            open,
            closed,
            total: open + closed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}: {open} open, {closed} closed", project.name);
    }
    Ok(())
}
