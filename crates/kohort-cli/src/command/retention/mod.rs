//! Retention matrix command
//!
//! Reads a bucketed search response (or pre-built buckets), runs the
//! retention engine for the configured queries, and writes the matrix as a
//! table, CSV, or JSON report.

mod table;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use kohort_engine::{
    RetentionError,
    aggregation::{self, SearchResponse},
    bucket::TimeBucket,
    interval::Interval,
    request::RetentionRequest,
    summary::MatrixSummary,
};
use tracing::{debug, info, warn};

use crate::{
    schema::{
        config::{DisplayScale, PanelConfig},
        report::{ReportInput, RetentionReport},
    },
    util::{self, Output},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum InputFormat {
    /// Raw search response with a date histogram of per-query term buckets
    #[default]
    Response,
    /// JSON array of time buckets with actor sets keyed by query id
    Buckets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct RetentionArg {
    /// Path to the input JSON file
    pub input: PathBuf,

    /// Panel config JSON file (defaults apply when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the actor-identity field
    #[arg(long)]
    pub field: Option<String>,

    /// Override the bucketing interval (hour, day, week, month)
    #[arg(long)]
    pub interval: Option<Interval>,

    /// Shape of the input file
    #[arg(long, value_enum, default_value_t)]
    pub input_format: InputFormat,

    /// Override the date-histogram aggregation name
    #[arg(long)]
    pub histogram: Option<String>,

    /// Insert empty buckets for intervals the backend skipped
    #[arg(long)]
    pub fill_gaps: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Output file path (default: stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub(crate) fn run(arg: &RetentionArg) -> anyhow::Result<()> {
    let mut config = PanelConfig::load(arg.config.as_deref())?;
    if let Some(field) = &arg.field {
        config.field = Some(field.clone());
    }
    if let Some(interval) = arg.interval {
        config.interval = interval;
    }
    if let Some(histogram) = &arg.histogram {
        config.histogram.clone_from(histogram);
    }
    let (request, scale) = build_request(&config)?;
    info!(
        field = request.field(),
        interval = %request.interval(),
        queries = request.queries().count(),
        "Computing retention"
    );

    let buckets = load_buckets(arg, &request, &config.histogram)?;
    let buckets = if arg.fill_gaps {
        let received = buckets.len();
        let filled = request
            .interval()
            .fill_gaps(buckets)
            .context("Failed to fill bucket gaps")?;
        debug!(received, filled = filled.len(), "Filled bucket gaps");
        filled
    } else {
        buckets
    };

    let matrix = request.compute(&buckets)?;
    let summary = MatrixSummary::from_matrix(&matrix);
    info!(
        buckets = matrix.bucket_count(),
        cells = matrix.len(),
        max_intersection = matrix.max_intersection(),
        "Retention matrix computed"
    );
    if !summary.valid {
        warn!("No bucket has actors for the origin query; every retention value is undefined");
    }

    let mut output = Output::from_output_path(arg.output.clone())?;
    match arg.format {
        OutputFormat::Table => output.write_with(|out| {
            table::write_table(out, &matrix, &buckets, request.interval(), &summary)
        })?,
        OutputFormat::Csv => {
            output.write_with(|out| table::write_csv(out, &matrix, request.interval(), scale))?;
        }
        OutputFormat::Json => {
            let report = RetentionReport::new(&ReportInput {
                field: request.field(),
                interval: request.interval(),
                labels: buckets.iter().map(TimeBucket::display_label).collect(),
                matrix: &matrix,
                summary: &summary,
                scale,
            });
            output.write_json(&report)?;
        }
    }

    Ok(())
}

/// Validates the request before the display clamp, so query and field errors
/// are reported first.
fn build_request(config: &PanelConfig) -> anyhow::Result<(RetentionRequest, DisplayScale)> {
    let request = RetentionRequest::new(
        config.field.clone(),
        config.interval,
        config.queries.clone(),
    )?;
    let scale = config.display_scale()?;
    Ok((request, scale))
}

fn load_buckets(
    arg: &RetentionArg,
    request: &RetentionRequest,
    histogram: &str,
) -> anyhow::Result<Vec<TimeBucket>> {
    match arg.input_format {
        InputFormat::Response => {
            let body = util::read_text_file("search response", &arg.input)?;
            let queries = request.queries().collect::<Vec<_>>();
            let buckets = SearchResponse::from_json(&body)
                .and_then(|response| response.into_buckets(histogram, &queries))
                .map_err(RetentionError::from)
                .with_context(|| {
                    format!("Failed to read buckets from {}", arg.input.display())
                })?;
            Ok(buckets)
        }
        InputFormat::Buckets => {
            let body = util::read_text_file("buckets", &arg.input)?;
            parse_typed_buckets(&body)
                .with_context(|| format!("Failed to read buckets from {}", arg.input.display()))
        }
    }
}

/// Parses a JSON array of time buckets, requiring strictly increasing keys.
fn parse_typed_buckets(body: &str) -> anyhow::Result<Vec<TimeBucket>> {
    let buckets = serde_json::from_str::<Vec<TimeBucket>>(body)?;
    aggregation::check_ordered(&buckets).map_err(RetentionError::from)?;
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use kohort_engine::aggregation::UpstreamDataError;

    use super::*;

    #[test]
    fn test_query_errors_come_before_clamp_errors() {
        let config = PanelConfig {
            field: None,
            min_percent: 80.0,
            max_percent: 20.0,
            ..PanelConfig::default()
        };
        let err = build_request(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RetentionError>(),
            Some(RetentionError::EmptyField)
        ));

        let config = PanelConfig {
            min_percent: 80.0,
            max_percent: 20.0,
            ..PanelConfig::default()
        };
        let err = build_request(&config).unwrap_err();
        assert!(err.downcast_ref::<RetentionError>().is_none());
    }

    #[test]
    fn test_typed_buckets_in_order() {
        let body = r#"[
            { "key": 0, "actors": { "0": ["u1", "u2"] } },
            { "key": 86400000, "label": "day 1", "actors": { "0": ["u1"] } }
        ]"#;
        let buckets = parse_typed_buckets(body).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].label.as_deref(), Some("day 1"));
    }

    #[test]
    fn test_typed_buckets_out_of_order_are_rejected() {
        let body = r#"[
            { "key": 172800000, "actors": { "0": ["u1"] } },
            { "key": 0, "actors": { "0": ["u1"] } }
        ]"#;
        let err = parse_typed_buckets(body).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RetentionError>(),
            Some(RetentionError::UpstreamData(
                UpstreamDataError::UnorderedBuckets { .. }
            ))
        ));
    }
}
