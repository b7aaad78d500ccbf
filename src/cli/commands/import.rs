use crate::cli::ImportArgs;
use crate::config;
use crate::error::Result;
use crate::storage::ImportFile;

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, a reference is unknown,
/// or the database write fails.
pub fn execute(args: &ImportArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let file = ImportFile::from_path(&args.file)?;
    let mut ctx = config::open_storage_with_cli(cli)?;
    let summary = ctx.storage.import(&file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Imported {} project(s), {} ticket(s), {} user(s), {} milestone(s), {} component(s), {} lookup value(s)",
            summary.projects,
            summary.tickets,
            summary.users,
            summary.milestones,
            summary.components,
            summary.lookups
        );
    }
    Ok(())
}
