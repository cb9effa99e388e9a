//! Request construction and stale-result tracking
//!
//! A [`RetentionRequest`] is validated before anything is fetched from the
//! backend: the query selection must contain one or two queries with distinct
//! ids and the actor-identity field must be set.
//!
//! Each fetch is tagged with a [`RequestId`] issued by a [`RequestTracker`].
//! When the fetch completes, its result is accepted only if no newer request
//! has been issued in the meantime, so a slow earlier refresh can never
//! overwrite the output of a newer one.
//!
//! ```
//! use kohort_engine::{RetentionError, request::RequestTracker};
//!
//! let tracker = RequestTracker::new();
//! let slow = tracker.issue();
//! let fast = tracker.issue();
//!
//! assert_eq!(tracker.accept(fast, "new").unwrap(), "new");
//! assert!(matches!(
//!     tracker.accept(slow, "old"),
//!     Err(RetentionError::StaleRequestDiscarded { .. })
//! ));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::{
    RetentionError,
    bucket::TimeBucket,
    interval::Interval,
    matrix::{self, RetentionMatrix},
    query::QuerySpec,
};

/// Maximum number of queries a retention request can compare.
pub const MAX_QUERIES: usize = 2;

/// Validated parameters of one retention computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionRequest {
    field: String,
    interval: Interval,
    query_a: QuerySpec,
    query_b: Option<QuerySpec>,
}

impl RetentionRequest {
    /// Validates the query selection and the actor field.
    ///
    /// The first query defines origin cohorts; the second, if any, is the
    /// target query.
    pub fn new(
        field: Option<String>,
        interval: Interval,
        queries: Vec<QuerySpec>,
    ) -> Result<Self, RetentionError> {
        if queries.len() > MAX_QUERIES {
            return Err(RetentionError::TooManyQueries {
                count: queries.len(),
            });
        }
        let field = field
            .filter(|field| !field.trim().is_empty())
            .ok_or(RetentionError::EmptyField)?;

        let mut queries = queries.into_iter();
        let query_a = queries.next().ok_or(RetentionError::NoQueries)?;
        let query_b = queries.next();
        if let Some(query_b) = &query_b
            && query_b.id == query_a.id
        {
            return Err(RetentionError::DuplicateQuery { query: query_a.id });
        }

        Ok(Self {
            field,
            interval,
            query_a,
            query_b,
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub fn query_a(&self) -> &QuerySpec {
        &self.query_a
    }

    #[must_use]
    pub fn query_b(&self) -> Option<&QuerySpec> {
        self.query_b.as_ref()
    }

    pub fn queries(&self) -> impl Iterator<Item = &QuerySpec> + '_ {
        std::iter::once(&self.query_a).chain(self.query_b.as_ref())
    }

    /// Runs the retention engine over `buckets` for this request's queries.
    pub fn compute(&self, buckets: &[TimeBucket]) -> Result<RetentionMatrix, RetentionError> {
        matrix::compute_retention(buckets, &self.query_a, self.query_b.as_ref())
    }
}

/// Identifier of one issued request. Later requests have larger ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, derive_more::Display,
)]
#[display("#{_0}")]
pub struct RequestId(u64);

/// Issues request ids and tells whether a completed request is still the latest.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

impl RequestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new id, superseding every id issued before.
    pub fn issue(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    #[must_use]
    pub fn latest(&self) -> RequestId {
        RequestId(self.latest.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_current(&self, request: RequestId) -> bool {
        self.latest() == request
    }

    /// Returns `value` if `request` is still the latest, otherwise
    /// [`RetentionError::StaleRequestDiscarded`].
    pub fn accept<T>(&self, request: RequestId, value: T) -> Result<T, RetentionError> {
        let latest = self.latest();
        if latest == request {
            Ok(value)
        } else {
            Err(RetentionError::StaleRequestDiscarded { request, latest })
        }
    }
}
