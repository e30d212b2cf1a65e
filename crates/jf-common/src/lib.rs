pub mod analytics;
pub mod date;
pub mod db;
pub mod gazetteer;
pub mod job_fields;
pub mod location;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod run_id;

/// Sentinel for any free-text field that is missing, blank or unresolvable.
pub const UNSPECIFIED: &str = "Unspecified";

/// Job field assigned when no alias matched.
pub const OTHER_JOB_FIELD: &str = "Other";

/// Seniority value the downstream analysis always excludes.
pub const NOT_APPLICABLE_SENIORITY: &str = "Not Applicable";

pub use gazetteer::{Gazetteer, GazetteerCatalog, GazetteerEntry, GazetteerError, ReferenceData};
pub use job_fields::{normalize_job_function, JobFieldIndex, JobFields};
pub use location::{normalize_location, LocationMatch, ResolvedLocation};
pub use record::{normalize, JobRecord, RawJobItem};
