//! Read-side aggregations over persisted postings.
//!
//! Every function is pure over a row slice. Rows are expected to have passed
//! [`passes_contract_filter`]; callers pass `now` explicitly.

pub mod breakdown;
pub mod companies;
pub mod postings;
pub mod trends;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::date::{parse_posted_at, TimePeriod};
use crate::job_fields::JobFields;
use crate::record::JobRecord;
use crate::{NOT_APPLICABLE_SENIORITY, UNSPECIFIED};

pub use breakdown::{
    field_breakdown_by_region_and_seniority, region_breakdown_by_field_and_seniority, Breakdown,
    GroupSeniorityCount,
};
pub use companies::{
    top_companies, top_companies_by_job_field, top_companies_by_region, CompanyCount,
    TOP_COMPANIES_LIMIT,
};
pub use postings::latest_postings;
pub use trends::{jobs_per_period, jobs_per_period_by_seniority, PeriodCount, SeniorityTrend};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Projection of a stored posting used by every aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsRow {
    pub posted_at: NaiveDateTime,
    pub title: String,
    pub company: String,
    pub region: String,
    pub country: String,
    pub seniority_level: String,
    pub job_fields: JobFields,
    pub job_url: String,
}

impl AnalyticsRow {
    /// `None` when the stored `date_posted` cannot be parsed.
    pub fn from_record(record: &JobRecord) -> Option<Self> {
        Some(Self {
            posted_at: parse_posted_at(&record.date_posted)?,
            title: record.title.clone(),
            company: record.company.clone(),
            region: record.region.clone(),
            country: record.country.clone(),
            seniority_level: record.seniority_level.clone(),
            job_fields: record.job_fields.clone(),
            job_url: record.job_url.clone(),
        })
    }

    pub fn has_job_field(&self, field: &str) -> bool {
        self.job_fields.contains(field)
    }
}

/// Rows every analysis excludes up front.
pub fn passes_contract_filter(seniority_level: &str, region: &str) -> bool {
    seniority_level != NOT_APPLICABLE_SENIORITY && region != UNSPECIFIED
}

/// Decodes the stored `job_fields` column. Anything but a JSON string array
/// counts as `["Other"]`.
pub fn decode_job_fields(raw: &str) -> JobFields {
    match JobFields::from_json(raw) {
        Ok(fields) if !fields.0.is_empty() => fields,
        Ok(_) => JobFields::other(),
        Err(err) => {
            warn!(error = %err, raw, "undecodable job_fields column");
            JobFields::other()
        }
    }
}

/// Applies the contract and country filters to in-memory records.
pub fn analytics_rows<'a, I>(records: I, country: &str) -> Vec<AnalyticsRow>
where
    I: IntoIterator<Item = &'a JobRecord>,
{
    records
        .into_iter()
        .filter(|r| passes_contract_filter(&r.seniority_level, &r.region))
        .filter(|r| r.country.eq_ignore_ascii_case(country))
        .filter_map(AnalyticsRow::from_record)
        .collect()
}

/// Rows posted at or after `now - quantity × period`.
pub fn filter_by_time_period(
    rows: &[AnalyticsRow],
    period: TimePeriod,
    quantity: u32,
    now: NaiveDateTime,
) -> Vec<AnalyticsRow> {
    let mut start = Some(now);
    for _ in 0..quantity {
        start = start.and_then(|s| period.window_start(s));
    }
    match (period, start) {
        (TimePeriod::AnyTime, _) => rows.to_vec(),
        (_, Some(start)) => rows
            .iter()
            .filter(|row| row.posted_at >= start)
            .cloned()
            .collect(),
        // window reaches before the calendar starts
        (_, None) => rows.to_vec(),
    }
}

/// Rows matching every given selector. `None` selects everything.
pub fn filter_by_selection(
    rows: &[AnalyticsRow],
    region: Option<&str>,
    job_field: Option<&str>,
    seniority_level: Option<&str>,
) -> Vec<AnalyticsRow> {
    rows.iter()
        .filter(|row| region.map_or(true, |r| row.region == r))
        .filter(|row| job_field.map_or(true, |f| row.has_job_field(f)))
        .filter(|row| seniority_level.map_or(true, |s| row.seniority_level == s))
        .cloned()
        .collect()
}
