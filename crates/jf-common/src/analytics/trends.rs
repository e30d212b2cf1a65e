use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::{filter_by_selection, AnalyticsRow};
use crate::date::TimePeriod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodCount {
    /// Last day covered by the bucket.
    pub period_end: NaiveDate,
    pub job_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeniorityTrend {
    pub seniority_level: String,
    pub counts: Vec<PeriodCount>,
}

/// Postings per bucket, ascending, with empty buckets between the first and
/// last populated one filled with zero.
pub fn jobs_per_period(rows: &[AnalyticsRow], period: TimePeriod) -> Vec<PeriodCount> {
    let mut per_bucket: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for row in rows {
        *per_bucket
            .entry(period.bucket_end(row.posted_at.date()))
            .or_default() += 1;
    }

    let (Some(first), Some(last)) = (
        per_bucket.keys().next().copied(),
        per_bucket.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut counts = Vec::new();
    let mut cursor = Some(first);
    while let Some(end) = cursor.filter(|end| *end <= last) {
        counts.push(PeriodCount {
            period_end: end,
            job_count: per_bucket.get(&end).copied().unwrap_or(0),
        });
        cursor = period.next_bucket_end(end);
    }
    counts
}

/// One series per seniority level, in the order given, for the selected
/// region and job field.
pub fn jobs_per_period_by_seniority(
    rows: &[AnalyticsRow],
    region: &str,
    job_field: &str,
    levels: &[String],
    period: TimePeriod,
) -> Vec<SeniorityTrend> {
    levels
        .iter()
        .map(|level| {
            let selected = filter_by_selection(rows, Some(region), Some(job_field), Some(level));
            SeniorityTrend {
                seniority_level: level.clone(),
                counts: jobs_per_period(&selected, period),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::{at, row};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_buckets_are_zero_filled() {
        let rows = vec![
            row(at(2024, 1, 3), "A", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 1, 30), "B", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 3, 15), "C", "Uusimaa", "Entry level", &["Sales"]),
        ];

        let counts = jobs_per_period(&rows, TimePeriod::Month);
        assert_eq!(
            counts,
            vec![
                PeriodCount { period_end: date(2024, 1, 31), job_count: 2 },
                PeriodCount { period_end: date(2024, 2, 29), job_count: 0 },
                PeriodCount { period_end: date(2024, 3, 31), job_count: 1 },
            ]
        );
    }

    #[test]
    fn weekly_buckets_end_on_sunday() {
        let rows = vec![
            // Monday and Sunday of the same week
            row(at(2024, 3, 4), "A", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 3, 10), "B", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 3, 11), "C", "Uusimaa", "Entry level", &["Sales"]),
        ];

        let counts = jobs_per_period(&rows, TimePeriod::Week);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0], PeriodCount { period_end: date(2024, 3, 10), job_count: 2 });
        assert_eq!(counts[1], PeriodCount { period_end: date(2024, 3, 17), job_count: 1 });
    }

    #[test]
    fn any_time_groups_by_year() {
        let rows = vec![
            row(at(2022, 6, 1), "A", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 2, 1), "B", "Uusimaa", "Entry level", &["Sales"]),
        ];

        let counts: Vec<u64> = jobs_per_period(&rows, TimePeriod::AnyTime)
            .iter()
            .map(|c| c.job_count)
            .collect();
        assert_eq!(counts, vec![1, 0, 1]);
    }

    #[test]
    fn empty_input_has_no_buckets() {
        assert!(jobs_per_period(&[], TimePeriod::Day).is_empty());
    }

    #[test]
    fn splits_series_by_seniority() {
        let rows = vec![
            row(at(2024, 3, 1), "A", "Uusimaa", "Entry level", &["Sales"]),
            row(at(2024, 3, 1), "B", "Uusimaa", "Director", &["Sales"]),
            row(at(2024, 3, 2), "C", "Uusimaa", "Entry level", &["Sales", "Marketing"]),
            row(at(2024, 3, 2), "D", "Pirkanmaa", "Entry level", &["Sales"]),
        ];
        let levels = vec!["Entry level".to_string(), "Director".to_string(), "Executive".to_string()];

        let trends = jobs_per_period_by_seniority(&rows, "Uusimaa", "Sales", &levels, TimePeriod::Day);
        assert_eq!(trends.len(), 3);
        assert_eq!(trends[0].seniority_level, "Entry level");
        assert_eq!(
            trends[0].counts.iter().map(|c| c.job_count).collect::<Vec<_>>(),
            vec![1, 1]
        );
        assert_eq!(trends[1].counts.len(), 1);
        assert!(trends[2].counts.is_empty());
    }
}
