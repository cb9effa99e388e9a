/// Precomputed percentile values for a dataset.
///
/// # Examples
///
/// ```
/// use kohort_stats::percentiles::Percentiles;
///
/// let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]).unwrap();
///
/// assert_eq!(percentiles.get(50.0), Some(30.0));
/// assert_eq!(percentiles.get(25.0), Some(20.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Percentiles {
    /// Percentile-value pairs in the order they were requested.
    /// Each tuple contains (percentile, value) where percentile is 0.0-100.0.
    values: Vec<(f64, f64)>,
}

impl Percentiles {
    /// Computes percentiles from sorted values.
    ///
    /// Returns `None` when `sorted_values` is empty.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], percentile_points: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let values = percentile_points
            .iter()
            .map(|&p| compute_percentile(sorted_values, p).map(|v| (p, v)))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { values })
    }

    /// Computes percentiles from unsorted values.
    #[must_use]
    pub fn new(values: &[f64], percentile_points: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, percentile_points)
    }

    /// Gets the value at a specific percentile.
    ///
    /// Returns `None` if the percentile was not precomputed.
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| (*p - percentile).abs() < f64::EPSILON)
            .map(|(_, value)| *value)
    }

    /// Returns an iterator over all (percentile, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().copied()
    }
}

/// Computes a single percentile value from sorted data with the nearest-rank method.
///
/// The k-th percentile of n values is the value at position `floor(n * k / 100)`,
/// clamped to the last element. Returns `None` if the input is empty.
///
/// ```
/// use kohort_stats::percentiles::compute_percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_percentile(&values, 50.0), Some(3.0));
/// assert_eq!(compute_percentile(&values, 100.0), Some(5.0));
/// assert_eq!(compute_percentile(&[], 50.0), None);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> Option<f64> {
    let last = sorted_values.len().checked_sub(1)?;
    let idx = ((sorted_values.len() as f64 * percentile) / 100.0) as usize;
    Some(sorted_values[idx.min(last)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(Percentiles::new(&[], &[50.0]).is_none());
    }

    #[test]
    fn test_missing_point() {
        let percentiles = Percentiles::new(&[1.0, 2.0, 3.0], &[50.0]).unwrap();
        assert_eq!(percentiles.get(50.0), Some(2.0));
        assert_eq!(percentiles.get(25.0), None);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let percentiles = Percentiles::new(&[9.0, 1.0, 5.0], &[0.0, 100.0]).unwrap();
        assert_eq!(
            percentiles.iter().collect::<Vec<_>>(),
            vec![(0.0, 1.0), (100.0, 9.0)]
        );
    }
}
