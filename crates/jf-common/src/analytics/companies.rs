use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::{filter_by_selection, filter_by_time_period, AnalyticsRow};
use crate::date::TimePeriod;

pub const TOP_COMPANIES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub job_count: u64,
}

/// The `n` companies with most postings; ties broken by name.
pub fn top_companies(rows: &[AnalyticsRow], n: usize) -> Vec<CompanyCount> {
    let mut per_company: HashMap<&str, u64> = HashMap::new();
    for row in rows {
        *per_company.entry(row.company.as_str()).or_default() += 1;
    }

    let mut counts: Vec<CompanyCount> = per_company
        .into_iter()
        .map(|(company, job_count)| CompanyCount {
            company: company.to_string(),
            job_count,
        })
        .collect();
    counts.sort_by(|a, b| {
        b.job_count
            .cmp(&a.job_count)
            .then_with(|| a.company.cmp(&b.company))
    });
    counts.truncate(n);
    counts
}

pub fn top_companies_by_job_field(
    rows: &[AnalyticsRow],
    job_field: &str,
    period: TimePeriod,
    now: NaiveDateTime,
) -> Vec<CompanyCount> {
    let in_field = filter_by_selection(rows, None, Some(job_field), None);
    top_companies(
        &filter_by_time_period(&in_field, period, 1, now),
        TOP_COMPANIES_LIMIT,
    )
}

pub fn top_companies_by_region(
    rows: &[AnalyticsRow],
    region: &str,
    period: TimePeriod,
    now: NaiveDateTime,
) -> Vec<CompanyCount> {
    let in_region = filter_by_selection(rows, Some(region), None, None);
    top_companies(
        &filter_by_time_period(&in_region, period, 1, now),
        TOP_COMPANIES_LIMIT,
    )
}
