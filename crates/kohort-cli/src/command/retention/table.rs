//! Text table and CSV rendering of a retention matrix

use std::io::{self, Write};

use kohort_engine::{
    bucket::{BucketKey, TimeBucket},
    interval::Interval,
    matrix::{RetentionMatrix, RetentionPercent},
    summary::MatrixSummary,
};

use crate::schema::config::DisplayScale;

const LABEL_WIDTH: usize = 16;
const CELL_WIDTH: usize = 8;

/// Formats a bucket key at the precision of `interval`.
pub(super) fn format_key(key: BucketKey, interval: Interval) -> String {
    let Some(time) = key.to_datetime() else {
        return key.millis().to_string();
    };
    let format = match interval {
        Interval::Hour => "%Y-%m-%d %H:00",
        Interval::Day | Interval::Week => "%Y-%m-%d",
        Interval::Month => "%Y-%m",
    };
    time.format(format).to_string()
}

fn format_percent(percent: RetentionPercent) -> String {
    percent
        .value()
        .map_or_else(|| "n/a".to_owned(), |value| format!("{value:.2}"))
}

/// Writes one row per origin cohort, columns by bucket offset.
///
/// Row labels prefer the backend's bucket label; the pooled curve and its
/// half-life follow the cohort rows.
pub(super) fn write_table<W>(
    mut out: W,
    matrix: &RetentionMatrix,
    buckets: &[TimeBucket],
    interval: Interval,
    summary: &MatrixSummary,
) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "Retention of '{}' into '{}' by {interval}",
        matrix.query_a().display_name(),
        matrix.target_query().display_name(),
    )?;
    if matrix.is_empty() {
        writeln!(out, "(no buckets)")?;
        return Ok(());
    }

    write!(out, "{:<LABEL_WIDTH$} {:>CELL_WIDTH$}", "Cohort", "Actors")?;
    for offset in 0..matrix.bucket_count() {
        write!(out, " {:>CELL_WIDTH$}", format!("+{offset}"))?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        "-".repeat(LABEL_WIDTH + (CELL_WIDTH + 1) * (matrix.bucket_count() + 1))
    )?;

    for (row, bucket) in matrix.rows().zip(buckets) {
        let label = bucket
            .label
            .clone()
            .unwrap_or_else(|| format_key(bucket.key, interval));
        let origin_count = row.first().map_or(0, |cell| cell.origin_count);
        write!(out, "{label:<LABEL_WIDTH$} {origin_count:>CELL_WIDTH$}")?;
        for cell in row {
            write!(out, " {:>CELL_WIDTH$}", format_percent(cell.retention_percent))?;
        }
        writeln!(out)?;
    }

    let curve = &summary.curve;
    if !curve.is_empty() {
        writeln!(out)?;
        write!(out, "{:<LABEL_WIDTH$} {:>CELL_WIDTH$}", "Pooled", "")?;
        for offset in 0..matrix.bucket_count() {
            let cell = curve
                .retention_at(offset)
                .map_or_else(|| "n/a".to_owned(), |value| format!("{value:.2}"));
            write!(out, " {cell:>CELL_WIDTH$}")?;
        }
        writeln!(out)?;
    }
    match curve.half_life() {
        Some(half_life) => writeln!(out, "Half-life: {half_life:.2} {interval}(s)")?,
        None => writeln!(out, "Half-life: not reached")?,
    }

    Ok(())
}

/// Writes one CSV record per matrix cell.
pub(super) fn write_csv<W>(
    mut out: W,
    matrix: &RetentionMatrix,
    interval: Interval,
    scale: DisplayScale,
) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "origin,target,offset,origin_count,target_count,intersection_count,retention_percent,intensity"
    )?;
    for cell in matrix.cells() {
        let percent = cell
            .retention_percent
            .value()
            .map(|value| format!("{value:.2}"))
            .unwrap_or_default();
        let intensity = scale
            .intensity(cell.retention_percent)
            .map(|value| format!("{value:.4}"))
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            format_key(cell.origin_key, interval),
            format_key(cell.target_key, interval),
            cell.offset(),
            cell.origin_count,
            cell.target_count,
            cell.intersection_count,
            percent,
            intensity,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kohort_engine::{
        bucket::ActorSet,
        matrix::compute_retention,
        query::{QueryId, QuerySpec},
    };

    use super::*;

    const DAY_MS: i64 = 86_400_000;
    // 2014-01-01T00:00:00Z
    const START_MS: i64 = 1_388_534_400_000;

    fn three_days() -> (Vec<TimeBucket>, RetentionMatrix) {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let sets: [&[&str]; 3] = [&["u1", "u2", "u3"], &["u2", "u3", "u4"], &["u3", "u4", "u5"]];
        let buckets = sets
            .iter()
            .zip(0..)
            .map(|(actors, day)| {
                TimeBucket::new(BucketKey::from_millis(START_MS + day * DAY_MS))
                    .with_actors(query.id, actors.iter().copied().collect())
            })
            .collect::<Vec<_>>();
        let matrix = compute_retention(&buckets, &query, None).unwrap();
        (buckets, matrix)
    }

    #[test]
    fn test_format_key() {
        let key = BucketKey::from_millis(START_MS + 13 * 3_600_000);
        assert_eq!(format_key(key, Interval::Hour), "2014-01-01 13:00");
        assert_eq!(format_key(key, Interval::Day), "2014-01-01");
        assert_eq!(format_key(key, Interval::Month), "2014-01");
    }

    #[test]
    fn test_table_rows() {
        let (buckets, matrix) = three_days();
        let summary = MatrixSummary::from_matrix(&matrix);
        let mut out = Vec::new();
        write_table(&mut out, &matrix, &buckets, Interval::Day, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();

        let rows = text
            .lines()
            .filter(|line| line.starts_with("2014-"))
            .collect::<Vec<_>>();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("2014-01-01"));
        assert!(rows[0].contains("100.00"));
        assert!(rows[0].contains("66.67"));
        assert!(rows[0].contains("33.33"));
        assert!(rows[2].trim_end().ends_with("100.00"));
        assert!(text.contains("Pooled"));
        assert!(text.contains("Half-life: 1.50 day(s)"));
    }

    #[test]
    fn test_empty_table() {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let matrix = compute_retention(&[], &query, None).unwrap();
        let summary = MatrixSummary::from_matrix(&matrix);
        let mut out = Vec::new();
        write_table(&mut out, &matrix, &[], Interval::Day, &summary).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("(no buckets)"));
    }

    #[test]
    fn test_csv_records() {
        let (_, matrix) = three_days();
        let scale = DisplayScale::new(0.0, 100.0).unwrap();
        let mut out = Vec::new();
        write_csv(&mut out, &matrix, Interval::Day, scale).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[1], "2014-01-01,2014-01-01,0,3,3,3,100.00,1.0000");
        assert_eq!(lines[2], "2014-01-01,2014-01-02,1,3,3,2,66.67,0.6667");
    }

    #[test]
    fn test_csv_undefined_percent_is_blank() {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = vec![
            TimeBucket::new(BucketKey::from_millis(START_MS)).with_actors(query.id, ActorSet::new()),
        ];
        let matrix = compute_retention(&buckets, &query, None).unwrap();
        let scale = DisplayScale::new(0.0, 100.0).unwrap();
        let mut out = Vec::new();
        write_csv(&mut out, &matrix, Interval::Day, scale).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("2014-01-01,2014-01-01,0,0,0,0,,"));
    }
}
