use std::fmt;
use std::io::{self, BufRead};
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{JobStore, PersistOutcome, StoreError};
use crate::gazetteer::Gazetteer;
use crate::record::{normalize, RawJobItem};
use crate::run_id;

/// Counters for one pass over the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Items that parsed and were normalized.
    pub processed: u64,
    pub inserted: u64,
    pub skipped_duplicate: u64,
    /// Items whose insert failed without taking the store down.
    pub failed: u64,
    /// Feed lines that were not a JSON object.
    pub malformed: u64,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} inserted={} skipped_duplicate={} failed={} malformed={}",
            self.processed, self.inserted, self.skipped_duplicate, self.failed, self.malformed
        )
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store unavailable ({summary}): {source}")]
    Storage {
        summary: BatchSummary,
        #[source]
        source: StoreError,
    },
    #[error("failed to read feed at line {line} ({summary}): {source}")]
    Feed {
        line: u64,
        summary: BatchSummary,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Progress made before the batch stopped. Rows already written stay.
    pub fn summary(&self) -> &BatchSummary {
        match self {
            PipelineError::Storage { summary, .. } | PipelineError::Feed { summary, .. } => summary,
        }
    }
}

/// Normalizes one item and hands it to the store.
pub async fn process_item<S: JobStore>(
    item: &RawJobItem,
    gazetteer: &Gazetteer,
    store: &S,
    now: NaiveDateTime,
) -> Result<PersistOutcome, StoreError> {
    let record = normalize(item, gazetteer, now);
    store.persist(&record).await
}

/// Drives a newline-delimited JSON feed through normalization and
/// persistence, one item at a time.
///
/// Malformed lines and per-record write failures are counted and skipped. A
/// store that is gone aborts the batch with [`PipelineError::Storage`].
/// `clock` is read once per item.
#[instrument(skip_all, fields(run_id = run_id::get(), country = gazetteer.country()))]
pub async fn run_batch<R, S, C>(
    feed: R,
    gazetteer: &Gazetteer,
    store: &S,
    clock: C,
) -> Result<BatchSummary, PipelineError>
where
    R: BufRead,
    S: JobStore,
    C: Fn() -> NaiveDateTime,
{
    let started = Instant::now();
    let mut summary = BatchSummary::default();

    for (idx, line) in feed.lines().enumerate() {
        let line_no = idx as u64 + 1;
        let line = line.map_err(|source| PipelineError::Feed {
            line: line_no,
            summary,
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: RawJobItem = match serde_json::from_str(trimmed) {
            Ok(item) => item,
            Err(err) => {
                summary.malformed += 1;
                jf_metrics::record_item_outcome("malformed");
                warn!(line = line_no, error = %err, "skipping malformed feed line");
                continue;
            }
        };
        summary.processed += 1;

        if let Some(requested) = item.request_location.as_deref() {
            if !requested.trim().eq_ignore_ascii_case(gazetteer.country()) {
                debug!(line = line_no, requested, "item was crawled for another country");
            }
        }

        match process_item(&item, gazetteer, store, clock()).await {
            Ok(outcome) => {
                match outcome {
                    PersistOutcome::Inserted => summary.inserted += 1,
                    PersistOutcome::SkippedDuplicate => summary.skipped_duplicate += 1,
                }
                jf_metrics::record_item_outcome(outcome.as_str());
                debug!(line = line_no, outcome = outcome.as_str(), "item handled");
            }
            Err(err) if err.is_fatal() => {
                jf_metrics::record_item_outcome("failed");
                error!(line = line_no, error = %err, %summary, "store unavailable; aborting batch");
                return Err(PipelineError::Storage {
                    summary,
                    source: err,
                });
            }
            Err(err) => {
                summary.failed += 1;
                jf_metrics::record_item_outcome("failed");
                warn!(line = line_no, error = %err, "failed to persist item; continuing");
            }
        }
    }

    jf_metrics::record_batch_duration(started.elapsed());
    info!(
        processed = summary.processed,
        inserted = summary.inserted,
        skipped_duplicate = summary.skipped_duplicate,
        failed = summary.failed,
        malformed = summary.malformed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    Ok(summary)
}
