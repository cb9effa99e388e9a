//! Query definitions selected for a retention or unique-hits computation

use serde::{Deserialize, Serialize};

/// Identifier of a dashboard query.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct QueryId(u32);

impl QueryId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A named, colored filter definition.
///
/// Only the identity and display fields matter to this crate; the query text
/// itself is evaluated by the search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: QueryId,
    /// Display alias. Empty means "show the query text instead".
    #[serde(default)]
    pub alias: String,
    pub query: String,
    #[serde(default)]
    pub color: String,
}

impl QuerySpec {
    #[must_use]
    pub fn new(id: QueryId, query: impl Into<String>) -> Self {
        Self {
            id,
            alias: String::new(),
            query: query.into(),
            color: String::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Returns the alias, or the raw query text when the alias is blank.
    ///
    /// ```
    /// # use kohort_engine::query::{QueryId, QuerySpec};
    /// let query = QuerySpec::new(QueryId::new(1), "country:NZ");
    /// assert_eq!(query.display_name(), "country:NZ");
    /// assert_eq!(query.with_alias("Kiwis").display_name(), "Kiwis");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.alias.trim().is_empty() {
            &self.query
        } else {
            &self.alias
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_alias_falls_back_to_query() {
        let query = QuerySpec::new(QueryId::new(0), "*").with_alias("   ");
        assert_eq!(query.display_name(), "*");
    }

    #[test]
    fn test_deserialize_defaults() {
        let query: QuerySpec = serde_json::from_str(r#"{"id": 3, "query": "status:200"}"#).unwrap();
        assert_eq!(query.id, QueryId::new(3));
        assert_eq!(query.alias, "");
        assert_eq!(query.color, "");
        assert_eq!(query.display_name(), "status:200");
    }
}
