pub mod period;
pub mod posted;

pub use period::{ParseTimePeriodError, TimePeriod};
pub use posted::{
    normalize_date, parse_posted_age, parse_posted_at, posted_day, processing_time,
    resolve_posted_at, AgeUnit, PostedAge, POSTED_AT_FORMAT,
};
