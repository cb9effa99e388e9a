//! JSON report written by `kohort retention --format json`

use chrono::{DateTime, Utc};
use kohort_engine::{
    interval::Interval,
    matrix::{RetentionMatrix, RetentionPercent},
    summary::MatrixSummary,
};
use serde::Serialize;

use super::config::DisplayScale;

#[derive(Debug, Clone, Serialize)]
pub struct RetentionReport {
    pub generated_at: DateTime<Utc>,
    pub field: String,
    pub interval: Interval,
    /// Display name of the query defining origin cohorts.
    pub origin_query: String,
    /// Display name of the query measured in target buckets.
    pub target_query: String,
    pub valid: bool,
    pub max_intersection: usize,
    pub buckets: Vec<BucketEntry>,
    pub cells: Vec<CellEntry>,
    pub curve: Vec<CurvePoint>,
    /// Fractional offset at which pooled retention first drops to 50%.
    pub half_life: Option<f64>,
    pub offsets: Vec<OffsetEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketEntry {
    pub index: usize,
    pub key: i64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellEntry {
    pub origin: usize,
    pub target: usize,
    pub origin_count: usize,
    pub target_count: usize,
    pub intersection_count: usize,
    pub retention_percent: RetentionPercent,
    /// Retention mapped through the panel's percent clamp, `null` if undefined.
    pub intensity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurvePoint {
    pub offset: usize,
    pub cohorts: usize,
    pub baseline: usize,
    pub retained: usize,
    pub retention_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffsetEntry {
    pub offset: usize,
    pub cohorts: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
}

pub struct ReportInput<'a> {
    pub field: &'a str,
    pub interval: Interval,
    pub labels: Vec<String>,
    pub matrix: &'a RetentionMatrix,
    pub summary: &'a MatrixSummary,
    pub scale: DisplayScale,
}

impl RetentionReport {
    pub fn new(input: &ReportInput<'_>) -> Self {
        let ReportInput {
            field,
            interval,
            labels,
            matrix,
            summary,
            scale,
        } = input;

        let buckets = matrix
            .bucket_keys()
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (key, label))| BucketEntry {
                index,
                key: key.millis(),
                label: label.clone(),
            })
            .collect();

        let cells = matrix
            .cells()
            .iter()
            .map(|cell| CellEntry {
                origin: cell.origin_index,
                target: cell.target_index,
                origin_count: cell.origin_count,
                target_count: cell.target_count,
                intersection_count: cell.intersection_count,
                retention_percent: cell.retention_percent,
                intensity: scale.intensity(cell.retention_percent),
            })
            .collect();

        let curve = &summary.curve;
        let curve_points = (0..curve.offsets.len())
            .map(|i| CurvePoint {
                offset: curve.offsets[i],
                cohorts: curve.cohorts[i],
                baseline: curve.baseline[i],
                retained: curve.retained[i],
                retention_percent: curve.retention[i],
            })
            .collect();

        let offsets = summary
            .offsets
            .iter()
            .map(|entry| OffsetEntry {
                offset: entry.offset,
                cohorts: entry.stats.count,
                mean: entry.stats.mean,
                std_dev: entry.stats.std_dev,
                min: entry.stats.min,
                max: entry.stats.max,
                p25: entry.quartiles.get(25.0),
                median: entry.quartiles.get(50.0),
                p75: entry.quartiles.get(75.0),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            field: (*field).to_owned(),
            interval: *interval,
            origin_query: matrix.query_a().display_name().to_owned(),
            target_query: matrix.target_query().display_name().to_owned(),
            valid: summary.valid,
            max_intersection: summary.max_intersection,
            buckets,
            cells,
            curve: curve_points,
            half_life: curve.half_life(),
            offsets,
        }
    }
}
