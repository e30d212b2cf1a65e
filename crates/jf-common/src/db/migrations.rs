use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "jobs table",
        sql: r#"
CREATE TABLE IF NOT EXISTS jobs (
    date_posted TEXT,
    title TEXT,
    company TEXT,
    location TEXT,
    city TEXT,
    region TEXT,
    country TEXT,
    seniority_level TEXT,
    employment_type TEXT,
    job_function TEXT,
    job_fields TEXT,
    industries TEXT,
    description TEXT,
    job_url TEXT
);
"#,
    },
    Migration {
        id: 2,
        description: "one posting per url and day",
        sql: r#"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_indexes WHERE indexname = 'jobs_job_url_posted_day_key'
    ) THEN
        IF EXISTS (
            SELECT 1 FROM jobs
            GROUP BY job_url, substring(date_posted from 1 for 10)
            HAVING COUNT(*) > 1
        ) THEN
            RAISE NOTICE 'jobs already holds same-day duplicates; unique index skipped';
        ELSE
            CREATE UNIQUE INDEX jobs_job_url_posted_day_key
                ON jobs (job_url, (substring(date_posted from 1 for 10)));
        END IF;
    END IF;
END $$;
"#,
    },
    Migration {
        id: 3,
        description: "analytics filter index",
        sql: r#"
CREATE INDEX IF NOT EXISTS jobs_country_region_idx ON jobs (lower(country), region);
"#,
    },
];

/// True for errors raised when another process created the same object first.
fn already_exists(err: &PgError) -> bool {
    matches!(
        err.code(),
        Some(code) if *code == SqlState::DUPLICATE_TABLE
            || *code == SqlState::DUPLICATE_OBJECT
            || *code == SqlState::UNIQUE_VIOLATION
    )
}

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    let bootstrap = client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await;
    match bootstrap {
        Err(err) if !already_exists(&err) => return Err(err.into()),
        _ => {}
    }

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        let applied = async {
            tx.batch_execute(migration.sql).await?;
            tx.execute(
                "INSERT INTO schema_migrations (id, description) VALUES ($1, $2)",
                &[&migration.id, &migration.description],
            )
            .await?;
            Ok::<(), PgError>(())
        }
        .await;

        match applied {
            Ok(()) => {
                tx.commit().await?;
                info!(
                    id = migration.id,
                    description = migration.description,
                    "applied migration"
                );
            }
            Err(err) if already_exists(&err) => {
                tx.rollback().await?;
                info!(id = migration.id, "migration applied by another process");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_ids_are_unique_and_ascending() {
        let ids: Vec<i32> = MIGRATIONS.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn jobs_table_has_fourteen_text_columns() {
        let sql = MIGRATIONS[0].sql;
        assert_eq!(sql.matches(" TEXT").count(), 14);
        assert!(sql.contains("IF NOT EXISTS"));
    }
}
