//! Fixed-size bucketing intervals
//!
//! Bucket boundaries are computed in UTC. Weeks start on Monday and months on
//! their first day, matching the date-histogram conventions of the backend.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{Datelike as _, Days, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike as _};
use serde::{Deserialize, Serialize};

use crate::{
    aggregation::UpstreamDataError,
    bucket::{ActorSet, BucketKey, TimeBucket},
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[serde(alias = "1h")]
    Hour,
    #[default]
    #[serde(alias = "1d")]
    Day,
    #[serde(alias = "1w")]
    Week,
    Month,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("unknown interval '{input}', expected one of hour, day, week, month")]
pub struct ParseIntervalError {
    input: String,
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "1h" => Ok(Self::Hour),
            "day" | "1d" => Ok(Self::Day),
            "week" | "1w" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ParseIntervalError {
                input: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.to_str(), f)
    }
}

impl Interval {
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Interval::Hour => "hour",
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
        }
    }

    /// Returns the start of the interval containing `key`.
    ///
    /// ```
    /// # use kohort_engine::{bucket::BucketKey, interval::Interval};
    /// // 2014-01-01T13:45:00Z, a Wednesday
    /// let key = BucketKey::from_millis(1_388_583_900_000);
    /// assert_eq!(Interval::Day.floor(key).unwrap().to_string(), "2014-01-01T00:00:00+00:00");
    /// assert_eq!(Interval::Week.floor(key).unwrap().to_string(), "2013-12-30T00:00:00+00:00");
    /// ```
    #[must_use]
    pub fn floor(self, key: BucketKey) -> Option<BucketKey> {
        let time = key.to_datetime()?.naive_utc();
        let date = time.date();
        let start = match self {
            Interval::Hour => date.and_hms_opt(time.hour(), 0, 0)?,
            Interval::Day => midnight(date)?,
            Interval::Week => midnight(date.checked_sub_days(Days::new(u64::from(
                date.weekday().num_days_from_monday(),
            )))?)?,
            Interval::Month => midnight(date.with_day(1)?)?,
        };
        Some(BucketKey::from_datetime(start.and_utc()))
    }

    /// Returns the start of the interval following the one that starts at `key`.
    #[must_use]
    pub fn next(self, key: BucketKey) -> Option<BucketKey> {
        let time = key.to_datetime()?;
        let next = match self {
            Interval::Hour => time.checked_add_signed(TimeDelta::hours(1))?,
            Interval::Day => time.checked_add_days(Days::new(1))?,
            Interval::Week => time.checked_add_days(Days::new(7))?,
            Interval::Month => time.checked_add_months(Months::new(1))?,
        };
        Some(BucketKey::from_datetime(next))
    }

    /// Partitions `[start, end]` into bucket keys.
    ///
    /// The first key is the start of the interval containing `start`; the
    /// last is the start of the interval containing `end`.
    ///
    /// ```
    /// # use kohort_engine::{bucket::BucketKey, interval::Interval};
    /// let start = BucketKey::from_millis(1_388_583_900_000); // 2014-01-01T13:45Z
    /// let end = BucketKey::from_millis(1_388_750_400_000); // 2014-01-03T12:00Z
    /// let keys = Interval::Day.partition(start, end);
    /// assert_eq!(keys.len(), 3);
    /// assert_eq!(keys[0].millis(), 1_388_534_400_000);
    /// ```
    #[must_use]
    pub fn partition(self, start: BucketKey, end: BucketKey) -> Vec<BucketKey> {
        let mut keys = vec![];
        let mut current = self.floor(start);
        while let Some(key) = current {
            if key > end {
                break;
            }
            keys.push(key);
            current = self.next(key);
        }
        keys
    }

    /// Inserts empty buckets for intervals missing from `buckets`.
    ///
    /// Backends usually omit buckets without documents. Filling them keeps
    /// bucket offsets equal to calendar distance. Inserted buckets carry an
    /// empty actor set for every query seen in the input.
    ///
    /// Fails if a bucket key is not aligned to the interval boundaries that
    /// follow the first bucket, or if keys are not strictly increasing.
    pub fn fill_gaps(self, buckets: Vec<TimeBucket>) -> Result<Vec<TimeBucket>, UpstreamDataError> {
        let Some(first_key) = buckets.first().map(|bucket| bucket.key) else {
            return Ok(buckets);
        };

        let queries = buckets
            .iter()
            .flat_map(|bucket| bucket.actors.keys().copied())
            .collect::<BTreeSet<_>>();
        let empty_bucket = |key| {
            queries
                .iter()
                .fold(TimeBucket::new(key), |bucket, query| {
                    bucket.with_actors(*query, ActorSet::new())
                })
        };

        let mut expected = Some(first_key);
        let mut filled = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            loop {
                let key = expected.ok_or(UpstreamDataError::MisalignedBucket {
                    key: bucket.key,
                    interval: self,
                })?;
                if key >= bucket.key {
                    break;
                }
                filled.push(empty_bucket(key));
                expected = self.next(key);
            }
            if expected != Some(bucket.key) {
                return Err(UpstreamDataError::MisalignedBucket {
                    key: bucket.key,
                    interval: self,
                });
            }
            expected = self.next(bucket.key);
            filled.push(bucket);
        }

        Ok(filled)
    }
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;
    use crate::query::QueryId;

    fn key(y: i32, m: u32, d: u32, h: u32) -> BucketKey {
        BucketKey::from_datetime(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_parse() {
        assert_eq!("day".parse::<Interval>().unwrap(), Interval::Day);
        assert_eq!("Week".parse::<Interval>().unwrap(), Interval::Week);
        assert_eq!("1h".parse::<Interval>().unwrap(), Interval::Hour);
        assert!("fortnight".parse::<Interval>().is_err());
    }

    #[test]
    fn test_deserialize_accepts_short_forms() {
        for (json, expected) in [
            (r#""1h""#, Interval::Hour),
            (r#""1d""#, Interval::Day),
            (r#""1w""#, Interval::Week),
            (r#""month""#, Interval::Month),
        ] {
            assert_eq!(serde_json::from_str::<Interval>(json).unwrap(), expected);
        }
        assert!(serde_json::from_str::<Interval>(r#""1m""#).is_err());
    }

    #[test]
    fn test_floor() {
        let t = key(2014, 3, 15, 17);
        assert_eq!(Interval::Hour.floor(t), Some(t));
        assert_eq!(Interval::Day.floor(t), Some(key(2014, 3, 15, 0)));
        assert_eq!(Interval::Week.floor(t), Some(key(2014, 3, 10, 0)));
        assert_eq!(Interval::Month.floor(t), Some(key(2014, 3, 1, 0)));
    }

    #[test]
    fn test_next_month_handles_lengths() {
        assert_eq!(Interval::Month.next(key(2014, 1, 1, 0)), Some(key(2014, 2, 1, 0)));
        assert_eq!(Interval::Month.next(key(2014, 2, 1, 0)), Some(key(2014, 3, 1, 0)));
        assert_eq!(Interval::Month.next(key(2014, 12, 1, 0)), Some(key(2015, 1, 1, 0)));
    }

    #[test]
    fn test_partition_weeks() {
        let keys = Interval::Week.partition(key(2014, 1, 1, 0), key(2014, 1, 20, 0));
        assert_eq!(
            keys,
            vec![
                key(2013, 12, 30, 0),
                key(2014, 1, 6, 0),
                key(2014, 1, 13, 0),
                key(2014, 1, 20, 0),
            ]
        );
    }

    #[test]
    fn test_partition_reversed_range_is_empty() {
        assert!(Interval::Day.partition(key(2014, 1, 5, 0), key(2014, 1, 1, 0)).is_empty());
    }

    #[test]
    fn test_fill_gaps() {
        let q = QueryId::new(0);
        let buckets = vec![
            TimeBucket::new(key(2014, 1, 1, 0)).with_actors(q, ["u1"].into_iter().collect()),
            TimeBucket::new(key(2014, 1, 4, 0)).with_actors(q, ["u1"].into_iter().collect()),
        ];
        let filled = Interval::Day.fill_gaps(buckets).unwrap();
        assert_eq!(filled.len(), 4);
        assert_eq!(filled[1].key, key(2014, 1, 2, 0));
        assert_eq!(filled[2].actors(q), Some(&ActorSet::new()));
        assert_eq!(filled[3].actors(q).map(ActorSet::len), Some(1));
    }

    #[test]
    fn test_fill_gaps_rejects_misaligned() {
        let buckets = vec![
            TimeBucket::new(key(2014, 1, 1, 0)),
            TimeBucket::new(key(2014, 1, 2, 6)),
        ];
        assert!(matches!(
            Interval::Day.fill_gaps(buckets),
            Err(UpstreamDataError::MisalignedBucket { .. })
        ));
    }

    #[test]
    fn test_fill_gaps_rejects_unordered() {
        let buckets = vec![
            TimeBucket::new(key(2014, 1, 2, 0)),
            TimeBucket::new(key(2014, 1, 1, 0)),
        ];
        assert!(Interval::Day.fill_gaps(buckets).is_err());
    }
}
