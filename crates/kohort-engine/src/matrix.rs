//! Retention matrix computation
//!
//! For `B` buckets the matrix holds `B × (B + 1) / 2` cells: every pair
//! `(origin, target)` with `target >= origin`, stored row-major by origin.
//! Retention only flows forward in time, so `(j, i)` with `j > i` is never
//! computed.
//!
//! ```text
//!            target →
//!          0     1     2
//! origin 0 [0,0] [0,1] [0,2]
//!        1       [1,1] [1,2]
//!        2             [2,2]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    RetentionError,
    bucket::{ActorSet, BucketKey, TimeBucket},
    query::QuerySpec,
};

/// Share of origin actors seen again in the target bucket, in percent.
///
/// Undefined when the origin bucket has no actors, which is distinct from a
/// retention of 0%. Serializes as `null` when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetentionPercent(Option<f64>);

impl RetentionPercent {
    pub const UNDEFINED: Self = Self(None);

    /// ```
    /// # use kohort_engine::matrix::RetentionPercent;
    /// assert_eq!(RetentionPercent::from_counts(1, 4).value(), Some(25.0));
    /// assert!(RetentionPercent::from_counts(0, 0).is_undefined());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_counts(intersection: usize, origin: usize) -> Self {
        if origin == 0 {
            return Self::UNDEFINED;
        }
        Self(Some(intersection as f64 / origin as f64 * 100.0))
    }

    #[must_use]
    pub fn value(self) -> Option<f64> {
        self.0
    }

    #[must_use]
    pub fn is_undefined(self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for RetentionPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => {
                fmt::Display::fmt(&value, f)?;
                f.write_str("%")
            }
            None => f.write_str("n/a"),
        }
    }
}

/// Comparison of one origin bucket against one target bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionCell {
    pub origin_index: usize,
    pub target_index: usize,
    pub origin_key: BucketKey,
    pub target_key: BucketKey,
    /// Number of actors in the origin bucket for query A.
    pub origin_count: usize,
    /// Number of actors in the target bucket for the target query.
    pub target_count: usize,
    pub intersection_count: usize,
    pub retention_percent: RetentionPercent,
}

impl RetentionCell {
    /// Number of buckets between origin and target.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.target_index - self.origin_index
    }
}

/// Upper-triangular retention matrix, immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionMatrix {
    query_a: QuerySpec,
    query_b: Option<QuerySpec>,
    bucket_keys: Vec<BucketKey>,
    cells: Vec<RetentionCell>,
    max_intersection: usize,
}

impl RetentionMatrix {
    /// The query defining origin cohorts.
    #[must_use]
    pub fn query_a(&self) -> &QuerySpec {
        &self.query_a
    }

    /// The query compared against, if distinct from query A.
    #[must_use]
    pub fn query_b(&self) -> Option<&QuerySpec> {
        self.query_b.as_ref()
    }

    /// The query whose actor sets fill the target side.
    #[must_use]
    pub fn target_query(&self) -> &QuerySpec {
        self.query_b.as_ref().unwrap_or(&self.query_a)
    }

    #[must_use]
    pub fn bucket_keys(&self) -> &[BucketKey] {
        &self.bucket_keys
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_keys.len()
    }

    /// All cells, row-major by origin then target index.
    #[must_use]
    pub fn cells(&self) -> &[RetentionCell] {
        &self.cells
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Largest intersection count in the matrix, for scale normalization.
    #[must_use]
    pub fn max_intersection(&self) -> usize {
        self.max_intersection
    }

    /// Returns `true` if the matrix has at least one defined retention value.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cells
            .iter()
            .any(|cell| !cell.retention_percent.is_undefined())
    }

    /// Returns the cells whose origin is bucket `origin`, ordered by target.
    #[must_use]
    pub fn row(&self, origin: usize) -> Option<&[RetentionCell]> {
        let n = self.bucket_count();
        if origin >= n {
            return None;
        }
        let start = origin * n - origin * origin.saturating_sub(1) / 2;
        Some(&self.cells[start..start + (n - origin)])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[RetentionCell]> + '_ {
        (0..self.bucket_count()).filter_map(|origin| self.row(origin))
    }

    /// Returns cell `(origin, target)`, or `None` when `target < origin` or
    /// either index is out of range.
    #[must_use]
    pub fn cell(&self, origin: usize, target: usize) -> Option<&RetentionCell> {
        let offset = target.checked_sub(origin)?;
        self.row(origin)?.get(offset)
    }
}

/// Computes the retention matrix of `buckets`.
///
/// Origin cohorts are query A's actor sets; targets are query B's sets, or
/// query A's own when `query_b` is `None`. Every bucket must carry a set for
/// each query used, otherwise [`RetentionError::QueryMismatch`] is returned
/// before any cell is computed. A `query_b` sharing query A's id is rejected
/// with [`RetentionError::DuplicateQuery`]. Zero buckets yield an empty matrix.
pub fn compute_retention(
    buckets: &[TimeBucket],
    query_a: &QuerySpec,
    query_b: Option<&QuerySpec>,
) -> Result<RetentionMatrix, RetentionError> {
    if let Some(query_b) = query_b
        && query_b.id == query_a.id
    {
        return Err(RetentionError::DuplicateQuery { query: query_a.id });
    }
    let target_query = query_b.unwrap_or(query_a);
    let origin_sets = resolve_sets(buckets, query_a)?;
    let target_sets = resolve_sets(buckets, target_query)?;

    let n = buckets.len();
    let mut cells = Vec::with_capacity(n * (n + 1) / 2);
    for (i, origin) in origin_sets.iter().enumerate() {
        for (j, target) in target_sets.iter().enumerate().skip(i) {
            let intersection_count = origin.intersection_count(target);
            cells.push(RetentionCell {
                origin_index: i,
                target_index: j,
                origin_key: buckets[i].key,
                target_key: buckets[j].key,
                origin_count: origin.len(),
                target_count: target.len(),
                intersection_count,
                retention_percent: RetentionPercent::from_counts(intersection_count, origin.len()),
            });
        }
    }

    let max_intersection = cells
        .iter()
        .map(|cell| cell.intersection_count)
        .max()
        .unwrap_or(0);

    Ok(RetentionMatrix {
        query_a: query_a.clone(),
        query_b: query_b.cloned(),
        bucket_keys: buckets.iter().map(|bucket| bucket.key).collect(),
        cells,
        max_intersection,
    })
}

fn resolve_sets<'a>(
    buckets: &'a [TimeBucket],
    query: &QuerySpec,
) -> Result<Vec<&'a ActorSet>, RetentionError> {
    buckets
        .iter()
        .map(|bucket| {
            bucket
                .actors(query.id)
                .ok_or(RetentionError::QueryMismatch {
                    key: bucket.key,
                    query: query.id,
                })
        })
        .collect()
}
