//! Identifier of the current process run.
//!
//! Every ingestion batch logs under this id, so all lines produced by one
//! invocation can be pulled together. ULIDs sort by creation time, which
//! keeps runs in chronological order when listed.

use once_cell::sync::Lazy;
use ulid::Ulid;

static RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Run id for the whole process, fixed at first access.
#[inline]
pub fn get() -> &'static str {
    &RUN_ID
}
