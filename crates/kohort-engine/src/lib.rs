//! Cohort retention analysis over time-bucketed actor sets
//!
//! This crate computes retention matrices: for every pair of time buckets
//! `(origin, target)` with `target >= origin`, how many of the actors seen in
//! the origin bucket for query A show up again in the target bucket for
//! query B (or query A itself when only one query is selected).
//!
//! # Overview
//!
//! ```text
//! search response ──▶ aggregation ──▶ Vec<TimeBucket> ──▶ matrix ──▶ summary
//!                     (collaborator)   (typed sets)       (core)    (stats)
//! ```
//!
//! 1. **Request** ([`request::RetentionRequest`]): validate the selected queries
//!    and the actor-identity field before anything is fetched
//! 2. **Aggregation** ([`aggregation::SearchResponse`]): turn a backend's
//!    date-histogram/terms response into typed [`bucket::TimeBucket`]s
//! 3. **Interval** ([`interval::Interval`]): optionally fill buckets the
//!    backend omitted so that offsets match calendar distance
//! 4. **Matrix** ([`matrix::compute_retention`]): the pure retention engine
//! 5. **Summary** ([`summary::MatrixSummary`]): pooled retention curve and
//!    per-offset statistics
//!
//! Results of superseded requests are dropped with a
//! [`request::RequestTracker`].
//!
//! # Examples
//!
//! ```
//! use kohort_engine::{
//!     bucket::{ActorSet, BucketKey, TimeBucket},
//!     matrix::compute_retention,
//!     query::{QueryId, QuerySpec},
//! };
//!
//! let query = QuerySpec::new(QueryId::new(0), "*");
//! let buckets = [["u1", "u2", "u3"], ["u2", "u3", "u4"], ["u3", "u4", "u5"]]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(day, actors)| {
//!         TimeBucket::new(BucketKey::from_millis(day as i64 * 86_400_000))
//!             .with_actors(query.id, actors.into_iter().collect::<ActorSet>())
//!     })
//!     .collect::<Vec<_>>();
//!
//! let matrix = compute_retention(&buckets, &query, None)?;
//! assert_eq!(matrix.len(), 6);
//! assert_eq!(matrix.cell(0, 0).unwrap().retention_percent.value(), Some(100.0));
//! assert_eq!(matrix.cell(1, 2).unwrap().intersection_count, 2);
//! # Ok::<(), kohort_engine::RetentionError>(())
//! ```

use self::{aggregation::UpstreamDataError, bucket::BucketKey, query::QueryId, request::RequestId};

pub mod aggregation;
pub mod bucket;
pub mod interval;
pub mod matrix;
pub mod query;
pub mod request;
pub mod summary;
pub mod unique_hits;

/// Errors reported by request construction and the retention engine.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum RetentionError {
    #[display("no query selected")]
    NoQueries,
    #[display("must provide max 2 queries, got {count}")]
    TooManyQueries { count: usize },
    #[display("actor field must be specified")]
    EmptyField,
    #[display("bucket {key} has no actor set for query {query}")]
    QueryMismatch { key: BucketKey, query: QueryId },
    #[display("query {query} is selected as both origin and target")]
    DuplicateQuery { query: QueryId },
    #[display("upstream data error: {_0}")]
    #[from]
    UpstreamData(UpstreamDataError),
    #[display("request {request} superseded by request {latest}")]
    StaleRequestDiscarded { request: RequestId, latest: RequestId },
}
