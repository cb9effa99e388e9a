//! Time buckets and the actor sets observed in them
//!
//! A [`TimeBucket`] is one slot of a fixed-size interval partition of the
//! query time range. It carries one [`ActorSet`] per selected query: the
//! distinct actor identifiers ("uniques") matching that query in the bucket.
//!
//! # Serialization
//!
//! Buckets serialize to the same shape the `kohort` CLI accepts as typed
//! input:
//!
//! ```json
//! [
//!   {
//!     "key": 1388534400000,
//!     "label": "2014-01-01",
//!     "actors": { "0": ["u1", "u2"], "1": ["u2"] }
//!   }
//! ]
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::QueryId;

/// Start instant of a time bucket, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(i64);

impl BucketKey {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self(time.timestamp_millis())
    }

    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Returns `None` if the key lies outside the range chrono can represent.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(time) => fmt::Display::fmt(&time.to_rfc3339(), f),
            None => fmt::Display::fmt(&self.0, f),
        }
    }
}

/// Identifier of a single actor, such as a user id.
///
/// Numeric identifiers reported by the backend are normalized to their
/// decimal string form.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Distinct actors observed in one bucket for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorSet(HashSet<ActorId>);

impl ActorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, actor: &ActorId) -> bool {
        self.0.contains(actor)
    }

    /// Adds an actor, returning `false` if it was already present.
    pub fn insert(&mut self, actor: impl Into<ActorId>) -> bool {
        self.0.insert(actor.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorId> + '_ {
        self.0.iter()
    }

    /// Counts actors present in both sets.
    ///
    /// Probes the smaller set against the larger one, so the cost is
    /// `O(min(|self|, |other|))`.
    ///
    /// ```
    /// # use kohort_engine::bucket::ActorSet;
    /// let a = ["u1", "u2", "u3"].into_iter().collect::<ActorSet>();
    /// let b = ["u3", "u4"].into_iter().collect::<ActorSet>();
    /// assert_eq!(a.intersection_count(&b), 1);
    /// ```
    #[must_use]
    pub fn intersection_count(&self, other: &Self) -> usize {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().filter(|actor| large.contains(actor)).count()
    }
}

impl<A> FromIterator<A> for ActorSet
where
    A: Into<ActorId>,
{
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<A> Extend<A> for ActorSet
where
    A: Into<ActorId>,
{
    fn extend<I: IntoIterator<Item = A>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

/// One interval of the bucketed time range with its per-query actor sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub key: BucketKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub actors: BTreeMap<QueryId, ActorSet>,
}

impl TimeBucket {
    #[must_use]
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            label: None,
            actors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_actors(mut self, query: QueryId, actors: ActorSet) -> Self {
        self.actors.insert(query, actors);
        self
    }

    #[must_use]
    pub fn actors(&self, query: QueryId) -> Option<&ActorSet> {
        self.actors.get(&query)
    }

    /// Returns the label, or the RFC 3339 form of the key when unlabeled.
    #[must_use]
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_actors_collapse() {
        let set = ["u1", "u1", "u2"].into_iter().collect::<ActorSet>();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_intersection_is_symmetric() {
        let a = ["u1", "u2", "u3", "u4"].into_iter().collect::<ActorSet>();
        let b = ["u0", "u4", "u2"].into_iter().collect::<ActorSet>();
        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(b.intersection_count(&a), 2);
        assert_eq!(a.intersection_count(&ActorSet::new()), 0);
    }

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::from_millis(1_388_534_400_000);
        assert_eq!(key.to_string(), "2014-01-01T00:00:00+00:00");
        assert_eq!(BucketKey::from_millis(i64::MAX).to_string(), i64::MAX.to_string());
    }

    #[test]
    fn test_bucket_json_shape() {
        let json = r#"{"key": 0, "actors": {"0": ["u1", "u2"], "1": []}}"#;
        let bucket: TimeBucket = serde_json::from_str(json).unwrap();
        assert_eq!(bucket.label, None);
        assert_eq!(bucket.actors(QueryId::new(0)).map(ActorSet::len), Some(2));
        assert_eq!(bucket.actors(QueryId::new(1)).map(ActorSet::len), Some(0));
        assert!(bucket.actors(QueryId::new(2)).is_none());
        assert_eq!(bucket.display_label(), "1970-01-01T00:00:00+00:00");
    }
}
