//! Aggregate statistics over a retention matrix

use std::collections::BTreeMap;

use kohort_stats::{
    curve::{CohortObservation, RetentionCurve},
    descriptive::DescriptiveStats,
    percentiles::Percentiles,
};

use crate::matrix::RetentionMatrix;

/// Percentile points reported for each offset.
pub const QUARTILES: [f64; 3] = [25.0, 50.0, 75.0];

/// Spread of cohort retention at one bucket offset.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetSummary {
    pub offset: usize,
    /// Statistics over the defined retention percents of all cohorts.
    pub stats: DescriptiveStats,
    /// Nearest-rank [`QUARTILES`] of the same values.
    pub quartiles: Percentiles,
}

/// Summary of a retention matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSummary {
    pub cell_count: usize,
    /// Cells whose origin bucket had no actors.
    pub undefined_cells: usize,
    pub max_intersection: usize,
    /// Whether the matrix holds at least one defined retention value.
    pub valid: bool,
    /// Retention pooled across cohorts, by offset.
    pub curve: RetentionCurve,
    /// Per-offset spread, ascending by offset.
    pub offsets: Vec<OffsetSummary>,
}

impl MatrixSummary {
    /// ```
    /// # use kohort_engine::{bucket::{BucketKey, TimeBucket}, matrix::compute_retention, query::{QueryId, QuerySpec}, summary::MatrixSummary};
    /// let query = QuerySpec::new(QueryId::new(0), "*");
    /// let buckets = vec![
    ///     TimeBucket::new(BucketKey::from_millis(0)).with_actors(query.id, ["a", "b"].into_iter().collect()),
    ///     TimeBucket::new(BucketKey::from_millis(1)).with_actors(query.id, ["a"].into_iter().collect()),
    /// ];
    /// let summary = MatrixSummary::from_matrix(&compute_retention(&buckets, &query, None)?);
    /// assert_eq!(summary.curve.retention_at(1), Some(50.0));
    /// # Ok::<(), kohort_engine::RetentionError>(())
    /// ```
    #[must_use]
    pub fn from_matrix(matrix: &RetentionMatrix) -> Self {
        let observations = matrix
            .cells()
            .iter()
            .map(|cell| CohortObservation {
                offset: cell.offset(),
                baseline: cell.origin_count,
                retained: cell.intersection_count,
            })
            .collect();

        let mut by_offset = BTreeMap::<usize, Vec<f64>>::new();
        for cell in matrix.cells() {
            if let Some(percent) = cell.retention_percent.value() {
                by_offset.entry(cell.offset()).or_default().push(percent);
            }
        }
        let offsets = by_offset
            .into_iter()
            .filter_map(|(offset, mut values)| {
                values.sort_by(f64::total_cmp);
                Some(OffsetSummary {
                    offset,
                    stats: DescriptiveStats::from_sorted(&values)?,
                    quartiles: Percentiles::from_sorted(&values, &QUARTILES)?,
                })
            })
            .collect();

        Self {
            cell_count: matrix.len(),
            undefined_cells: matrix
                .cells()
                .iter()
                .filter(|cell| cell.retention_percent.is_undefined())
                .count(),
            max_intersection: matrix.max_intersection(),
            valid: matrix.is_valid(),
            curve: RetentionCurve::from_observations(observations),
            offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bucket::{BucketKey, TimeBucket},
        matrix::compute_retention,
        query::{QueryId, QuerySpec},
    };

    fn summarize(sets: &[&[&str]]) -> MatrixSummary {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = sets
            .iter()
            .zip(0..)
            .map(|(actors, i)| {
                TimeBucket::new(BucketKey::from_millis(i))
                    .with_actors(query.id, actors.iter().copied().collect())
            })
            .collect::<Vec<_>>();
        MatrixSummary::from_matrix(&compute_retention(&buckets, &query, None).unwrap())
    }

    #[test]
    fn test_empty_matrix() {
        let summary = summarize(&[]);
        assert_eq!(summary.cell_count, 0);
        assert!(!summary.valid);
        assert!(summary.curve.is_empty());
        assert!(summary.offsets.is_empty());
    }

    #[test]
    fn test_three_day_scenario() {
        let summary = summarize(&[&["u1", "u2", "u3"], &["u2", "u3", "u4"], &["u3", "u4", "u5"]]);
        assert_eq!(summary.cell_count, 6);
        assert_eq!(summary.undefined_cells, 0);
        assert_eq!(summary.max_intersection, 3);
        assert!(summary.valid);

        assert_eq!(summary.curve.offsets, vec![0, 1, 2]);
        assert_eq!(summary.curve.cohorts, vec![3, 2, 1]);
        assert_eq!(summary.curve.retention_at(0), Some(100.0));
        assert_eq!(summary.curve.baseline[1], 6);
        assert_eq!(summary.curve.retained[1], 4);

        let offset_one = &summary.offsets[1];
        assert_eq!(offset_one.offset, 1);
        assert_eq!(offset_one.stats.count, 2);
        assert!((offset_one.stats.mean - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_empty_buckets_are_invalid() {
        let summary = summarize(&[&[], &[]]);
        assert_eq!(summary.cell_count, 3);
        assert_eq!(summary.undefined_cells, 3);
        assert!(!summary.valid);
        assert!(summary.curve.is_empty());
        assert!(summary.offsets.is_empty());
    }
}
