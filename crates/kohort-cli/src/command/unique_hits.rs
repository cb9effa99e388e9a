//! Unique hits command
//!
//! Reports the distinct number of actors matching each configured query,
//! read from a search response with one cardinality aggregation per query.

use std::{io::Write as _, path::PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use kohort_engine::{RetentionError, aggregation::SearchResponse, unique_hits::UniqueHits};
use serde::Serialize;
use tracing::info;

use crate::{
    schema::config::PanelConfig,
    util::{self, Output},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct UniqueHitsArg {
    /// Path to the search response JSON file
    pub response: PathBuf,

    /// Panel config JSON file (defaults apply when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Output file path (default: stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct HitsEntry<'a> {
    id: u32,
    name: &'a str,
    color: &'a str,
    hits: u64,
}

#[derive(Debug, Serialize)]
struct HitsReport<'a> {
    field: &'a str,
    queries: Vec<HitsEntry<'a>>,
    total: u64,
}

pub(crate) fn run(arg: &UniqueHitsArg) -> anyhow::Result<()> {
    let config = PanelConfig::load(arg.config.as_deref())?;
    let field = config.actor_field()?;
    info!(field, queries = config.queries.len(), "Counting unique hits");

    let body = util::read_text_file("search response", &arg.response)?;
    let hits = SearchResponse::from_json(&body)
        .and_then(|response| UniqueHits::from_response(response, &config.queries))
        .map_err(RetentionError::from)
        .with_context(|| format!("Failed to read unique hits from {}", arg.response.display()))?;

    let mut output = Output::from_output_path(arg.output.clone())?;
    match arg.format {
        OutputFormat::Table => output.write_with(|out| {
            for entry in &hits.queries {
                writeln!(out, "{:<32} {:>12}", entry.query.display_name(), entry.hits)?;
            }
            writeln!(out, "{:<32} {:>12}", "Total", hits.total)
        })?,
        OutputFormat::Json => {
            let report = HitsReport {
                field,
                queries: hits
                    .queries
                    .iter()
                    .map(|entry| HitsEntry {
                        id: entry.query.id.get(),
                        name: entry.query.display_name(),
                        color: &entry.query.color,
                        hits: entry.hits,
                    })
                    .collect(),
                total: hits.total,
            };
            output.write_json(&report)?;
        }
    }

    Ok(())
}
