#![allow(async_fn_in_trait)]

use std::sync::{Mutex, PoisonError};

use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::instrument;

use crate::date::posted_day;
use crate::db::util::TimedClientExt;
use crate::db::{run_migrations, MigrationError, PgPool};
use crate::record::JobRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("schema setup failed: {0}")]
    Migration(#[from] MigrationError),
}

impl StoreError {
    /// Fatal errors mean the store itself is gone; anything else only
    /// affects the record that triggered it.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::Pool(_) | StoreError::Migration(_) => true,
            StoreError::Postgres(err) => err.is_closed() || err.as_db_error().is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    SkippedDuplicate,
}

impl PersistOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistOutcome::Inserted => "inserted",
            PersistOutcome::SkippedDuplicate => "skipped_duplicate",
        }
    }
}

/// Destination for normalized records.
///
/// `persist` inserts unless a row with the same `job_url` was already posted
/// on the same calendar day.
pub trait JobStore {
    async fn ensure_schema(&self) -> Result<(), StoreError>;
    async fn persist(&self, record: &JobRecord) -> Result<PersistOutcome, StoreError>;
}

const INSERT_JOB_SQL: &str = r#"
INSERT INTO jobs (
    date_posted, title, company, location, city, region, country,
    seniority_level, employment_type, job_function, job_fields,
    industries, description, job_url
)
SELECT $1::text, $2::text, $3::text, $4::text, $5::text, $6::text, $7::text,
       $8::text, $9::text, $10::text, $11::text, $12::text, $13::text, $14::text
WHERE NOT EXISTS (
    SELECT 1 FROM jobs WHERE job_url = $14::text AND date_posted LIKE $15::text
)
ON CONFLICT DO NOTHING
"#;

/// `LIKE` pattern matching every timestamp on the record's posting day.
fn same_day_pattern(date_posted: &str) -> String {
    let day = posted_day(date_posted)
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{day}%")
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for PgJobStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        run_migrations(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(job_url = %record.job_url))]
    async fn persist(&self, record: &JobRecord) -> Result<PersistOutcome, StoreError> {
        let client = self.pool.get().await?;
        let job_fields = record.job_fields.to_json();
        let day_pattern = same_day_pattern(&record.date_posted);

        let inserted = client
            .timed_execute_cached(
                INSERT_JOB_SQL,
                &[
                    &record.date_posted,
                    &record.title,
                    &record.company,
                    &record.location,
                    &record.city,
                    &record.region,
                    &record.country,
                    &record.seniority_level,
                    &record.employment_type,
                    &record.job_function,
                    &job_fields,
                    &record.industries,
                    &record.description,
                    &record.job_url,
                    &day_pattern,
                ],
                "insert_job",
            )
            .await?;

        Ok(if inserted == 1 {
            PersistOutcome::Inserted
        } else {
            PersistOutcome::SkippedDuplicate
        })
    }
}

/// In-process store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    rows: Mutex<Vec<JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<JobRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for MemoryJobStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn persist(&self, record: &JobRecord) -> Result<PersistOutcome, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let day = posted_day(&record.date_posted);
        let duplicate = rows
            .iter()
            .any(|row| row.job_url == record.job_url && posted_day(&row.date_posted) == day);

        if duplicate {
            return Ok(PersistOutcome::SkippedDuplicate);
        }
        rows.push(record.clone());
        Ok(PersistOutcome::Inserted)
    }
}
