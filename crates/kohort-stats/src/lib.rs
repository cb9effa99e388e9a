//! Statistical utilities for cohort retention analysis.
//!
//! This crate has no dependencies and knows nothing about buckets or actors.
//! It works on plain numbers handed over by `kohort-engine`:
//!
//! - **Descriptive statistics**: min, max, mean, median, variance, standard deviation
//! - **Percentiles**: nearest-rank percentile lookup for a dataset
//! - **Retention curves**: pooled retention by bucket offset, with a half-life estimate
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`curve`]: Retention curves pooled across cohorts
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use kohort_stats::descriptive::DescriptiveStats;
//!
//! let values = [100.0, 50.0, 25.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.max, 100.0);
//! assert_eq!(stats.median, 50.0);
//! ```
//!
//! ## Building a retention curve
//!
//! ```
//! use kohort_stats::curve::{CohortObservation, RetentionCurve};
//!
//! let observations = vec![
//!     CohortObservation { offset: 0, baseline: 10, retained: 10 },
//!     CohortObservation { offset: 1, baseline: 10, retained: 4 },
//! ];
//! let curve = RetentionCurve::from_observations(observations);
//! assert_eq!(curve.retention_at(1), Some(40.0));
//! ```

pub mod curve;
pub mod descriptive;
pub mod percentiles;
