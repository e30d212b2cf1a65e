use tracing::{debug, instrument};

use crate::analytics::{decode_job_fields, AnalyticsError, AnalyticsRow};
use crate::date::parse_posted_at;
use crate::db::util::TimedClientExt;
use crate::db::PgPool;
use crate::{NOT_APPLICABLE_SENIORITY, UNSPECIFIED};

const ANALYTICS_ROWS_SQL: &str = r#"
SELECT date_posted, title, company, region, country, seniority_level, job_fields, job_url
FROM jobs
WHERE seniority_level != $1
  AND region != $2
  AND lower(country) = lower($3)
"#;

/// Contract-filtered rows for one country. Rows whose `date_posted` cannot
/// be parsed are dropped.
#[instrument(skip(pool))]
pub async fn fetch_analytics_rows(
    pool: &PgPool,
    country: &str,
) -> Result<Vec<AnalyticsRow>, AnalyticsError> {
    let client = pool.get().await?;
    let rows = client
        .timed_query_cached(
            ANALYTICS_ROWS_SQL,
            &[&NOT_APPLICABLE_SENIORITY, &UNSPECIFIED, &country],
            "fetch_analytics_rows",
        )
        .await?;

    let total = rows.len();
    let parsed: Vec<AnalyticsRow> = rows
        .iter()
        .filter_map(|row| {
            let date_posted: Option<String> = row.get("date_posted");
            let job_fields: Option<String> = row.get("job_fields");
            let text = |column: &str| -> String {
                row.get::<_, Option<String>>(column)
                    .unwrap_or_else(|| UNSPECIFIED.to_string())
            };

            Some(AnalyticsRow {
                posted_at: parse_posted_at(date_posted.as_deref()?)?,
                title: text("title"),
                company: text("company"),
                region: text("region"),
                country: text("country"),
                seniority_level: text("seniority_level"),
                job_fields: decode_job_fields(job_fields.as_deref().unwrap_or("[]")),
                job_url: text("job_url"),
            })
        })
        .collect();

    if parsed.len() < total {
        debug!(dropped = total - parsed.len(), "rows with unparseable date_posted dropped");
    }
    Ok(parsed)
}
