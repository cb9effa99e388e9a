use std::path::Path;

use kohort_engine::{
    RetentionError,
    interval::Interval,
    matrix::RetentionPercent,
    query::{QueryId, QuerySpec},
};
use serde::{Deserialize, Serialize};

use crate::util;

/// Panel configuration shared by the `retention` and `unique-hits` commands.
///
/// Every field is optional in the JSON file:
///
/// ```json
/// {
///   "field": "user.uid",
///   "interval": "week",
///   "histogram": "by_day",
///   "queries": [{ "id": 0, "alias": "Signups", "query": "event:signup", "color": "#7EB26D" }],
///   "min_percent": 0.0,
///   "max_percent": 60.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Actor-identity field the backend aggregated on.
    pub field: Option<String>,
    /// Bucketing interval of the date histogram.
    pub interval: Interval,
    /// Name of the date-histogram aggregation in search responses.
    pub histogram: String,
    /// Selected queries; the first one defines origin cohorts.
    pub queries: Vec<QuerySpec>,
    /// Retention at or below this percent maps to display intensity 0.
    pub min_percent: f64,
    /// Retention at or above this percent maps to display intensity 1.
    pub max_percent: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            field: Some("user.uid".to_owned()),
            interval: Interval::Day,
            histogram: "by_day".to_owned(),
            queries: vec![QuerySpec::new(QueryId::new(0), "*")],
            min_percent: 0.0,
            max_percent: 100.0,
        }
    }
}

impl PanelConfig {
    /// Reads the config file, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => util::read_json_file("panel config", path),
            None => Ok(Self::default()),
        }
    }

    /// Returns the actor field, failing if it is unset or blank.
    pub fn actor_field(&self) -> Result<&str, RetentionError> {
        self.field
            .as_deref()
            .filter(|field| !field.trim().is_empty())
            .ok_or(RetentionError::EmptyField)
    }

    pub fn display_scale(&self) -> anyhow::Result<DisplayScale> {
        DisplayScale::new(self.min_percent, self.max_percent)
    }
}

/// Maps retention percents to a display intensity in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayScale {
    min_percent: f64,
    max_percent: f64,
}

impl DisplayScale {
    pub fn new(min_percent: f64, max_percent: f64) -> anyhow::Result<Self> {
        if !(min_percent.is_finite() && max_percent.is_finite()) || min_percent >= max_percent {
            anyhow::bail!(
                "Invalid percent clamp: min_percent ({min_percent}) must be below max_percent ({max_percent})"
            );
        }
        Ok(Self {
            min_percent,
            max_percent,
        })
    }

    /// Returns `None` for an undefined percent.
    pub fn intensity(self, percent: RetentionPercent) -> Option<f64> {
        let value = percent.value()?.clamp(self.min_percent, self.max_percent);
        Some((value - self.min_percent) / (self.max_percent - self.min_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PanelConfig = serde_json::from_str(r#"{"interval": "week"}"#).unwrap();
        assert_eq!(config.interval, Interval::Week);
        assert_eq!(config.field.as_deref(), Some("user.uid"));
        assert_eq!(config.histogram, "by_day");
        assert_eq!(config.queries.len(), 1);
    }

    #[test]
    fn test_null_field_is_rejected() {
        let config: PanelConfig = serde_json::from_str(r#"{"field": null}"#).unwrap();
        assert!(matches!(config.actor_field(), Err(RetentionError::EmptyField)));
    }

    #[test]
    fn test_intensity_clamps() {
        let scale = DisplayScale::new(20.0, 60.0).unwrap();
        assert_eq!(scale.intensity(RetentionPercent::from_counts(1, 10)), Some(0.0));
        assert_eq!(scale.intensity(RetentionPercent::from_counts(4, 10)), Some(0.5));
        assert_eq!(scale.intensity(RetentionPercent::from_counts(9, 10)), Some(1.0));
        assert_eq!(scale.intensity(RetentionPercent::UNDEFINED), None);
    }

    #[test]
    fn test_invalid_clamp() {
        assert!(DisplayScale::new(50.0, 50.0).is_err());
        assert!(DisplayScale::new(80.0, 20.0).is_err());
        assert!(DisplayScale::new(f64::NAN, 20.0).is_err());
    }
}
