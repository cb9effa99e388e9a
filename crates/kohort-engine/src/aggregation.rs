//! Search backend aggregation responses
//!
//! The backend answers a retention request with a date histogram whose
//! buckets each hold one filter aggregation per query, named `query_<id>`,
//! wrapping an unbounded terms aggregation `uniqs` over the actor field:
//!
//! ```json
//! {
//!   "aggregations": {
//!     "by_day": {
//!       "buckets": [
//!         {
//!           "key": 1388534400000,
//!           "key_as_string": "2014-01-01T00:00:00.000Z",
//!           "doc_count": 42,
//!           "query_0": { "doc_count": 17, "uniqs": { "buckets": [ { "key": "u1", "doc_count": 3 } ] } }
//!         }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Any problem with the response is reported as an [`UpstreamDataError`];
//! callers must not run the retention engine in that case.

use std::collections::BTreeMap;

use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    bucket::{ActorId, ActorSet, BucketKey, TimeBucket},
    interval::Interval,
    query::{QueryId, QuerySpec},
};

/// Errors in data received from the search backend.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum UpstreamDataError {
    #[display("search backend error: {message}")]
    Backend { message: String },
    #[display("response has no aggregation named '{name}'")]
    MissingAggregation { name: String },
    #[display("bucket {key} has no aggregation for query {query}")]
    MissingQuery { key: BucketKey, query: QueryId },
    #[display("malformed {context}")]
    Malformed {
        context: String,
        source: serde_json::Error,
    },
    #[display("bucket {key} does not follow bucket {previous}")]
    UnorderedBuckets { previous: BucketKey, key: BucketKey },
    #[display("bucket {key} is not aligned to {interval} boundaries")]
    MisalignedBucket { key: BucketKey, interval: Interval },
}

/// Raw search response as returned by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Error reported by the backend instead of results.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    /// Top-level aggregations by name.
    #[serde(default)]
    pub aggregations: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DateHistogram {
    buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Deserialize)]
struct HistogramBucket {
    key: i64,
    #[serde(default)]
    key_as_string: Option<String>,
    #[serde(flatten)]
    sub_aggregations: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FilterAggregation {
    uniqs: TermsAggregation,
}

#[derive(Debug, Deserialize)]
struct TermsAggregation {
    buckets: Vec<TermBucket>,
}

#[derive(Debug, Deserialize)]
struct TermBucket {
    key: TermKey,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TermKey {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl From<TermKey> for ActorId {
    fn from(key: TermKey) -> Self {
        match key {
            TermKey::Text(text) => ActorId::from(text),
            TermKey::Signed(n) => ActorId::from(n.to_string()),
            TermKey::Unsigned(n) => ActorId::from(n.to_string()),
            TermKey::Float(n) => ActorId::from(n.to_string()),
        }
    }
}

/// Name of the per-query filter aggregation inside each histogram bucket.
#[must_use]
pub fn query_aggregation_name(query: QueryId) -> String {
    format!("query_{query}")
}

impl SearchResponse {
    /// Parses a response body.
    pub fn from_json(body: &str) -> Result<Self, UpstreamDataError> {
        serde_json::from_str(body).map_err(|source| UpstreamDataError::Malformed {
            context: "search response".to_owned(),
            source,
        })
    }

    /// Fails with [`UpstreamDataError::Backend`] if the backend reported an error.
    pub fn check_error(&self) -> Result<(), UpstreamDataError> {
        match &self.error {
            None | Some(serde_json::Value::Null) => Ok(()),
            Some(serde_json::Value::String(message)) => Err(UpstreamDataError::Backend {
                message: message.clone(),
            }),
            Some(other) => Err(UpstreamDataError::Backend {
                message: other.to_string(),
            }),
        }
    }

    /// Removes and parses the top-level aggregation `name`.
    pub(crate) fn take_aggregation<T>(&mut self, name: &str) -> Result<T, UpstreamDataError>
    where
        T: DeserializeOwned,
    {
        let value = self
            .aggregations
            .remove(name)
            .ok_or_else(|| UpstreamDataError::MissingAggregation {
                name: name.to_owned(),
            })?;
        parse_value(value, || format!("aggregation '{name}'"))
    }

    /// Converts the date histogram `histogram` into typed buckets holding one
    /// actor set per query.
    ///
    /// Bucket keys must be strictly increasing.
    ///
    /// ```
    /// # use kohort_engine::{aggregation::SearchResponse, query::{QueryId, QuerySpec}};
    /// let body = r#"{"aggregations": {"by_day": {"buckets": [
    ///     {"key": 0, "query_0": {"uniqs": {"buckets": [{"key": "u1"}, {"key": 42}]}}}
    /// ]}}}"#;
    /// let query = QuerySpec::new(QueryId::new(0), "*");
    /// let buckets = SearchResponse::from_json(body)?.into_buckets("by_day", &[&query])?;
    /// assert_eq!(buckets[0].actors(query.id).unwrap().len(), 2);
    /// # Ok::<(), kohort_engine::aggregation::UpstreamDataError>(())
    /// ```
    pub fn into_buckets(
        mut self,
        histogram: &str,
        queries: &[&QuerySpec],
    ) -> Result<Vec<TimeBucket>, UpstreamDataError> {
        self.check_error()?;
        let histogram = self.take_aggregation::<DateHistogram>(histogram)?;

        let mut buckets = Vec::with_capacity(histogram.buckets.len());
        for mut raw in histogram.buckets {
            let key = BucketKey::from_millis(raw.key);
            if let Some(previous) = buckets.last().map(|bucket: &TimeBucket| bucket.key)
                && previous >= key
            {
                return Err(UpstreamDataError::UnorderedBuckets { previous, key });
            }

            let mut bucket = TimeBucket::new(key);
            bucket.label = raw.key_as_string.take();
            for query in queries {
                let value = raw
                    .sub_aggregations
                    .remove(&query_aggregation_name(query.id))
                    .ok_or(UpstreamDataError::MissingQuery {
                        key,
                        query: query.id,
                    })?;
                let filter = parse_value::<FilterAggregation>(value, || {
                    format!("aggregation for query {} in bucket {key}", query.id)
                })?;
                let actors = filter
                    .uniqs
                    .buckets
                    .into_iter()
                    .map(|term| term.key)
                    .collect::<ActorSet>();
                bucket.actors.insert(query.id, actors);
            }
            buckets.push(bucket);
        }

        Ok(buckets)
    }
}

/// Fails with [`UpstreamDataError::UnorderedBuckets`] unless bucket keys are
/// strictly increasing.
///
/// ```
/// # use kohort_engine::{aggregation::check_ordered, bucket::{BucketKey, TimeBucket}};
/// let day = |ms| TimeBucket::new(BucketKey::from_millis(ms));
/// assert!(check_ordered(&[day(0), day(86_400_000)]).is_ok());
/// assert!(check_ordered(&[day(86_400_000), day(0)]).is_err());
/// ```
pub fn check_ordered(buckets: &[TimeBucket]) -> Result<(), UpstreamDataError> {
    match buckets
        .windows(2)
        .find(|pair| pair[0].key >= pair[1].key)
    {
        Some(pair) => Err(UpstreamDataError::UnorderedBuckets {
            previous: pair[0].key,
            key: pair[1].key,
        }),
        None => Ok(()),
    }
}

fn parse_value<T>(
    value: serde_json::Value,
    context: impl FnOnce() -> String,
) -> Result<T, UpstreamDataError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| UpstreamDataError::Malformed {
        context: context(),
        source,
    })
}
