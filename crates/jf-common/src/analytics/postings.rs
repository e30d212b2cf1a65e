use chrono::NaiveDateTime;

use super::{filter_by_selection, filter_by_time_period, AnalyticsRow};
use crate::date::TimePeriod;

/// Postings matching the selectors inside one `period`, newest first.
/// Equal timestamps are ordered by job url so the listing is stable.
pub fn latest_postings(
    rows: &[AnalyticsRow],
    region: Option<&str>,
    job_field: Option<&str>,
    seniority_level: Option<&str>,
    period: TimePeriod,
    now: NaiveDateTime,
) -> Vec<AnalyticsRow> {
    let selected = filter_by_selection(rows, region, job_field, seniority_level);
    let mut postings = filter_by_time_period(&selected, period, 1, now);
    postings.sort_by(|a, b| {
        b.posted_at
            .cmp(&a.posted_at)
            .then_with(|| a.job_url.cmp(&b.job_url))
    });
    postings
}
