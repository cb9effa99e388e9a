//! Distinct actor counts per query
//!
//! The backend answers with one filter aggregation per query, named after the
//! query id, wrapping a cardinality aggregation `uniq_hits`:
//!
//! ```json
//! { "aggregations": { "0": { "doc_count": 120, "uniq_hits": { "value": 37 } } } }
//! ```

use serde::Deserialize;

use crate::{
    aggregation::{SearchResponse, UpstreamDataError},
    query::QuerySpec,
};

#[derive(Debug, Deserialize)]
struct CardinalityFilter {
    uniq_hits: Cardinality,
}

#[derive(Debug, Deserialize)]
struct Cardinality {
    #[serde(default)]
    value: Option<u64>,
}

/// Unique hits of a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHits {
    pub query: QuerySpec,
    pub hits: u64,
}

/// Unique hits of every selected query, plus their sum.
///
/// The total is a plain sum: an actor matching two queries is counted twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueHits {
    pub queries: Vec<QueryHits>,
    pub total: u64,
}

impl UniqueHits {
    /// Reads the cardinality of each query from `response`.
    ///
    /// A cardinality of `null` (no documents matched) counts as zero.
    ///
    /// ```
    /// # use kohort_engine::{aggregation::SearchResponse, query::{QueryId, QuerySpec}, unique_hits::UniqueHits};
    /// let body = r#"{"aggregations": {"0": {"uniq_hits": {"value": 37}}, "1": {"uniq_hits": {"value": 5}}}}"#;
    /// let queries = [QuerySpec::new(QueryId::new(0), "*"), QuerySpec::new(QueryId::new(1), "vip:true")];
    /// let hits = UniqueHits::from_response(SearchResponse::from_json(body)?, &queries)?;
    /// assert_eq!(hits.total, 42);
    /// # Ok::<(), kohort_engine::aggregation::UpstreamDataError>(())
    /// ```
    pub fn from_response(
        mut response: SearchResponse,
        queries: &[QuerySpec],
    ) -> Result<Self, UpstreamDataError> {
        response.check_error()?;

        let queries = queries
            .iter()
            .map(|query| {
                let filter =
                    response.take_aggregation::<CardinalityFilter>(&query.id.to_string())?;
                Ok(QueryHits {
                    query: query.clone(),
                    hits: filter.uniq_hits.value.unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>, UpstreamDataError>>()?;
        let total = queries.iter().map(|q| q.hits).sum();

        Ok(Self { queries, total })
    }
}
