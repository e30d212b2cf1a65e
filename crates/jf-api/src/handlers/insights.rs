//! Aggregates behind the dashboard charts.
//!
//! Every handler resolves the country through the reference catalog first, so
//! an unknown country is a 404 before any rows are fetched.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use jf_common::analytics::{
    field_breakdown_by_region_and_seniority, filter_by_selection, filter_by_time_period,
    jobs_per_period, jobs_per_period_by_seniority, latest_postings,
    region_breakdown_by_field_and_seniority,
    top_companies, top_companies_by_job_field, top_companies_by_region, AnalyticsRow, Breakdown,
    CompanyCount, PeriodCount, SeniorityTrend, TOP_COMPANIES_LIMIT,
};
use jf_common::date::{processing_time, TimePeriod};
use jf_common::db::fetch_analytics_rows;
use jf_common::ReferenceData;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct InsightQuery {
    pub region: Option<String>,
    pub job_field: Option<String>,
    pub seniority_level: Option<String>,
    pub time_period: Option<String>,
}

/// Default page size of the latest postings listing.
pub const LATEST_POSTINGS_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct LatestPostingsQuery {
    pub region: Option<String>,
    pub job_field: Option<String>,
    pub seniority_level: Option<String>,
    pub time_period: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopCompaniesQuery {
    pub by: Option<String>,
    pub value: Option<String>,
    pub time_period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub country: String,
    pub time_period: TimePeriod,
    pub total_jobs: usize,
    pub jobs_per_period: Vec<PeriodCount>,
    pub top_companies: Vec<CompanyCount>,
}

#[derive(Debug, Serialize)]
pub struct LatestPostingsResponse {
    pub country: String,
    pub time_period: TimePeriod,
    pub total_jobs: usize,
    pub postings: Vec<AnalyticsRow>,
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub country: String,
    pub time_period: TimePeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<PeriodCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_seniority: Option<Vec<SeniorityTrend>>,
}

#[derive(Debug, Serialize)]
pub struct TopCompaniesResponse {
    pub country: String,
    pub by: CompanyGrouping,
    pub value: String,
    pub time_period: TimePeriod,
    pub companies: Vec<CompanyCount>,
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub country: String,
    pub selection: String,
    pub time_period: TimePeriod,
    pub seniority_levels: Vec<String>,
    #[serde(flatten)]
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyGrouping {
    Region,
    JobField,
}

impl CompanyGrouping {
    fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "region" => Ok(CompanyGrouping::Region),
            "job_field" => Ok(CompanyGrouping::JobField),
            other => Err(ApiError::BadRequest(format!(
                "by must be region or job_field, got {other}"
            ))),
        }
    }
}

/// Blank query values count as absent.
fn selector(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn required<'a>(raw: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    selector(raw).ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

fn time_period(raw: &Option<String>) -> Result<TimePeriod, ApiError> {
    match selector(raw) {
        Some(value) => Ok(value.parse()?),
        None => Ok(TimePeriod::AnyTime),
    }
}

async fn load_country(
    state: &SharedState,
    country: &str,
) -> Result<(Arc<ReferenceData>, Arc<Vec<AnalyticsRow>>), ApiError> {
    let reference = state.catalog.reference(country)?;
    let pool = state.pool.clone();
    let key = reference.country.clone();
    let rows = state
        .rows
        .get_or_fetch(&reference.country, move || async move {
            fetch_analytics_rows(&pool, &key).await
        })
        .await?;
    Ok((reference, rows))
}

/// Postings in the selected window, with their trend and leading companies.
pub async fn summary(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<InsightQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period = time_period(&query.time_period)?;
    let (reference, rows) = load_country(&state, &country).await?;

    let selected = filter_by_selection(
        &rows,
        selector(&query.region),
        selector(&query.job_field),
        selector(&query.seniority_level),
    );
    let in_window = filter_by_time_period(&selected, period, 1, processing_time());

    Ok(Json(SummaryResponse {
        country: reference.country.clone(),
        time_period: period,
        total_jobs: in_window.len(),
        jobs_per_period: jobs_per_period(&in_window, period),
        top_companies: top_companies(&in_window, TOP_COMPANIES_LIMIT),
    }))
}

/// Newest postings for the current selection. `total_jobs` counts every
/// match; `postings` holds at most `limit` of them.
pub async fn latest(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<LatestPostingsQuery>,
) -> Result<Json<LatestPostingsResponse>, ApiError> {
    let period = time_period(&query.time_period)?;
    let limit = query.limit.unwrap_or(LATEST_POSTINGS_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }
    let (reference, rows) = load_country(&state, &country).await?;

    let mut postings = latest_postings(
        &rows,
        selector(&query.region),
        selector(&query.job_field),
        selector(&query.seniority_level),
        period,
        processing_time(),
    );
    let total_jobs = postings.len();
    postings.truncate(limit);

    Ok(Json(LatestPostingsResponse {
        country: reference.country.clone(),
        time_period: period,
        total_jobs,
        postings,
    }))
}

/// Postings per bucket. With both a region and a job field selected the
/// series is split by seniority level.
pub async fn trends(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<InsightQuery>,
) -> Result<Json<TrendsResponse>, ApiError> {
    let period = time_period(&query.time_period)?;
    let (reference, rows) = load_country(&state, &country).await?;

    let response = match (selector(&query.region), selector(&query.job_field)) {
        (Some(region), Some(job_field)) => TrendsResponse {
            country: reference.country.clone(),
            time_period: period,
            counts: None,
            by_seniority: Some(jobs_per_period_by_seniority(
                &rows,
                region,
                job_field,
                &reference.seniority_levels,
                period,
            )),
        },
        (region, job_field) => {
            let selected = filter_by_selection(&rows, region, job_field, None);
            TrendsResponse {
                country: reference.country.clone(),
                time_period: period,
                counts: Some(jobs_per_period(&selected, period)),
                by_seniority: None,
            }
        }
    };
    Ok(Json(response))
}

pub async fn leading_companies(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<TopCompaniesQuery>,
) -> Result<Json<TopCompaniesResponse>, ApiError> {
    let by = CompanyGrouping::parse(required(&query.by, "by")?)?;
    let value = required(&query.value, "value")?;
    let period = time_period(&query.time_period)?;
    let (reference, rows) = load_country(&state, &country).await?;

    let now = processing_time();
    let companies = match by {
        CompanyGrouping::Region => top_companies_by_region(&rows, value, period, now),
        CompanyGrouping::JobField => top_companies_by_job_field(&rows, value, period, now),
    };

    Ok(Json(TopCompaniesResponse {
        country: reference.country.clone(),
        by,
        value: value.to_string(),
        time_period: period,
        companies,
    }))
}

/// Job fields in one region, split by seniority.
pub async fn region_breakdown(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<InsightQuery>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    let region = required(&query.region, "region")?;
    let period = time_period(&query.time_period)?;
    let (reference, rows) = load_country(&state, &country).await?;

    let breakdown = region_breakdown_by_field_and_seniority(
        &rows,
        region,
        period,
        &reference.seniority_levels,
        processing_time(),
    );
    Ok(Json(BreakdownResponse {
        country: reference.country.clone(),
        selection: region.to_string(),
        time_period: period,
        seniority_levels: reference.seniority_levels.clone(),
        breakdown,
    }))
}

/// Regions for one job field, split by seniority.
pub async fn job_field_breakdown(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
    Query(query): Query<InsightQuery>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    let job_field = required(&query.job_field, "job_field")?;
    let period = time_period(&query.time_period)?;
    let (reference, rows) = load_country(&state, &country).await?;

    let breakdown = field_breakdown_by_region_and_seniority(
        &rows,
        job_field,
        period,
        &reference.seniority_levels,
        processing_time(),
    );
    Ok(Json(BreakdownResponse {
        country: reference.country.clone(),
        selection: job_field.to_string(),
        time_period: period,
        seniority_levels: reference.seniority_levels.clone(),
        breakdown,
    }))
}
