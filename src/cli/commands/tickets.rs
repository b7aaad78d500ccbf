//! Tickets command: filtered, ordered, paginated listing of one project.
//!
//! Without `-f` the `default-filter.*` config keys apply, which by default
//! hide closed tickets.

use crate::cli::TicketsArgs;
use crate::config;
use crate::error::Result;
use crate::filter::{FilterRequest, ResolvedFilter, TicketFilterQuery};
use crate::model::Ticket;
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

#[derive(Serialize)]
struct TicketsOutput<'a> {
    project: &'a str,
    filters: BTreeMap<&'a str, FilterOutput<'a>>,
    tickets: &'a [Ticket],
    total: usize,
    page: usize,
    per_page: usize,
}

#[derive(Serialize)]
struct FilterOutput<'a> {
    #[serde(flatten)]
    filter: &'a ResolvedFilter,
    display: Vec<String>,
}

#[derive(Serialize)]
struct ExplainOutput<'a> {
    sql: &'a str,
    params: Vec<serde_json::Value>,
}

/// Execute the tickets command.
///
/// # Errors
///
/// Returns an error if a filter argument is malformed, the project does not
/// exist, or the database query fails.
pub fn execute(args: &TicketsArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut overrides = cli.clone();
    if args.per_page.is_some() {
        overrides.per_page = args.per_page;
    }
    if args.order.is_some() {
        overrides.order.clone_from(&args.order);
    }

    let ctx = config::open_storage_with_cli(&overrides)?;
    let storage = &ctx.storage;
    let project = storage.require_project(&args.project)?;
    let sort = config::order_from_layer(&ctx.layer)?;
    let per_page = config::per_page_from_layer(&ctx.layer)?;

    let request = if args.filters.is_empty() {
        let defaults = config::default_filters_from_layer(&ctx.layer);
        debug!(filters = defaults.len(), "using default filters");
        defaults
    } else {
        FilterRequest::from_pairs(&args.filters)?
    };

    let mut filter_query = TicketFilterQuery::new(storage, project.id);
    filter_query.apply(&request)?;
    let (mut query, filters) = filter_query.into_parts();
    query.order_by(sort).paginate(args.page, per_page);

    if args.explain {
        let (sql, params) = query.select_sql();
        if json {
            let output = ExplainOutput {
                sql: sql.trim(),
                params: params.iter().map(value_to_json).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", collapse_whitespace(&sql));
            for (index, param) in params.iter().enumerate() {
                println!("  ?{} = {}", index + 1, value_to_json(param));
            }
        }
        return Ok(());
    }

    let total = storage.count_tickets(&query)?;
    let tickets = storage.list_tickets(&query)?;

    if json {
        let output = TicketsOutput {
            project: &project.slug,
            filters: filters
                .iter()
                .map(|(name, filter)| {
                    (
                        name.as_str(),
                        FilterOutput {
                            filter,
                            display: filter.display_values(),
                        },
                    )
                })
                .collect(),
            tickets: &tickets,
            total,
            page: args.page.max(1),
            per_page,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for filter in filters.values() {
        println!("{}", format_filter_line(filter));
    }
    if tickets.is_empty() {
        println!("No tickets found.");
    } else {
        for ticket in &tickets {
            println!("{}", format_ticket_line(ticket));
        }
        println!("\n{} of {total} ticket(s)", tickets.len());
    }
    Ok(())
}

/// `status = !3, 4` style summary of one applied filter.
fn format_filter_line(filter: &ResolvedFilter) -> String {
    let values = filter.display_values();
    let shown = if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    };
    format!("{} = {}{shown}", filter.name, filter.prefix)
}

fn format_ticket_line(ticket: &Ticket) -> String {
    let mut line = format!(
        "#{:<4} [{}] {}",
        ticket.ticket_id,
        ticket.status.as_deref().unwrap_or("-"),
        ticket.summary
    );

    let details: Vec<&str> = [
        ticket.ticket_type.as_deref(),
        ticket.priority.as_deref(),
        ticket.milestone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        let _ = write!(line, " ({})", details.join(", "));
    }
    if let Some(assignee) = &ticket.assigned_to {
        let _ = write!(line, " @{assignee}");
    }
    line
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(bytes) => serde_json::Value::from(bytes.len()),
    }
}

fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
