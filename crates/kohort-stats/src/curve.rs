/// One cohort's retention at a given bucket offset.
///
/// `baseline` is the size of the cohort in its origin bucket and `retained`
/// how many of those actors were seen again `offset` buckets later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortObservation {
    pub offset: usize,
    pub baseline: usize,
    pub retained: usize,
}

/// Retention curve pooled across cohorts.
///
/// For each bucket offset the curve stores the pooled retention
/// `Σretained / Σbaseline × 100` over every cohort observed at that offset.
/// Pooling weights each cohort by its size, so a cohort of two actors cannot
/// swing the curve as much as a cohort of two thousand.
///
/// The curve stores parallel vectors sorted by offset. Offsets where no
/// cohort had a non-empty baseline are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionCurve {
    /// Bucket offsets (target index minus origin index), ascending.
    pub offsets: Vec<usize>,
    /// Pooled retention percentage at each offset, in `0.0..=100.0`.
    pub retention: Vec<f64>,
    /// Number of cohorts contributing at each offset.
    pub cohorts: Vec<usize>,
    /// Sum of cohort baselines at each offset.
    pub baseline: Vec<usize>,
    /// Sum of retained actors at each offset.
    pub retained: Vec<usize>,
}

impl RetentionCurve {
    /// Computes the pooled retention curve from cohort observations.
    ///
    /// Observations with an empty baseline carry no information and are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kohort_stats::curve::{CohortObservation, RetentionCurve};
    /// let data = vec![
    ///     CohortObservation { offset: 1, baseline: 4, retained: 1 },
    ///     CohortObservation { offset: 1, baseline: 6, retained: 4 },
    ///     CohortObservation { offset: 2, baseline: 0, retained: 0 },
    /// ];
    /// let curve = RetentionCurve::from_observations(data);
    /// assert_eq!(curve.offsets, vec![1]);
    /// assert_eq!(curve.retention, vec![50.0]);
    /// assert_eq!(curve.cohorts, vec![2]);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_observations(mut data: Vec<CohortObservation>) -> Self {
        data.retain(|obs| obs.baseline > 0);
        data.sort_by_key(|obs| obs.offset);

        let mut curve = Self::default();

        for group in data.chunk_by(|a, b| a.offset == b.offset) {
            let baseline = group.iter().map(|obs| obs.baseline).sum::<usize>();
            let retained = group.iter().map(|obs| obs.retained).sum::<usize>();

            curve.offsets.push(group[0].offset);
            curve
                .retention
                .push(retained as f64 / baseline as f64 * 100.0);
            curve.cohorts.push(group.len());
            curve.baseline.push(baseline);
            curve.retained.push(retained);
        }

        curve
    }

    /// Returns `true` if no offset carries a defined retention value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Returns the pooled retention at exactly `offset`, if it was observed.
    #[must_use]
    pub fn retention_at(&self, offset: usize) -> Option<f64> {
        self.offsets
            .binary_search(&offset)
            .ok()
            .map(|i| self.retention[i])
    }

    /// Returns the retention half-life in buckets.
    ///
    /// The half-life is the offset at which pooled retention first drops to
    /// or below 50%. Linear interpolation is used between the surrounding
    /// offsets. Returns `None` if retention never drops that far.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kohort_stats::curve::{CohortObservation, RetentionCurve};
    /// let data = vec![
    ///     CohortObservation { offset: 0, baseline: 10, retained: 10 },
    ///     CohortObservation { offset: 2, baseline: 10, retained: 0 },
    /// ];
    /// let curve = RetentionCurve::from_observations(data);
    /// assert_eq!(curve.half_life(), Some(1.0));
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn half_life(&self) -> Option<f64> {
        let i = self.retention.iter().position(|&r| r <= 50.0)?;
        if i == 0 {
            return Some(self.offsets[0] as f64);
        }

        let t0 = self.offsets[i - 1] as f64;
        let t1 = self.offsets[i] as f64;
        let r0 = self.retention[i - 1];
        let r1 = self.retention[i];
        Some(t0 + (50.0 - r0) / (r1 - r0) * (t1 - t0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(offset: usize, baseline: usize, retained: usize) -> CohortObservation {
        CohortObservation {
            offset,
            baseline,
            retained,
        }
    }

    #[test]
    fn test_empty_observations() {
        let curve = RetentionCurve::from_observations(vec![]);
        assert!(curve.is_empty());
        assert_eq!(curve.half_life(), None);
        assert_eq!(curve.retention_at(0), None);
    }

    #[test]
    fn test_pooling_weights_by_baseline() {
        let curve = RetentionCurve::from_observations(vec![obs(1, 1, 1), obs(1, 99, 0)]);
        assert_eq!(curve.retention, vec![1.0]);
        assert_eq!(curve.baseline, vec![100]);
        assert_eq!(curve.retained, vec![1]);
    }

    #[test]
    fn test_offsets_sorted() {
        let curve = RetentionCurve::from_observations(vec![obs(2, 2, 1), obs(0, 2, 2), obs(1, 4, 3)]);
        assert_eq!(curve.offsets, vec![0, 1, 2]);
        assert_eq!(curve.retention, vec![100.0, 75.0, 50.0]);
    }

    #[test]
    fn test_half_life_never_reached() {
        let curve = RetentionCurve::from_observations(vec![obs(0, 2, 2), obs(1, 4, 3)]);
        assert_eq!(curve.half_life(), None);
    }

    #[test]
    fn test_half_life_at_first_offset() {
        let curve = RetentionCurve::from_observations(vec![obs(3, 10, 5)]);
        assert_eq!(curve.half_life(), Some(3.0));
    }
}
