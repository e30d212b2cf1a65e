use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Storage format of `date_posted`.
pub const POSTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

lazy_static! {
    static ref LEADING_INT_RE: Regex = Regex::new(r"^\s*(\d+)").unwrap();
}

/// Unit of a relative "N <unit>s ago" phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Day,
    Week,
    /// Counted as 30 days.
    Month,
    /// Counted as 365 days.
    Year,
}

impl AgeUnit {
    /// Checked in this order; the first keyword found in the phrase wins.
    const PRIORITY: [AgeUnit; 4] = [AgeUnit::Day, AgeUnit::Week, AgeUnit::Month, AgeUnit::Year];

    pub fn keyword(&self) -> &'static str {
        match self {
            AgeUnit::Day => "day",
            AgeUnit::Week => "week",
            AgeUnit::Month => "month",
            AgeUnit::Year => "year",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            AgeUnit::Day => 1,
            AgeUnit::Week => 7,
            AgeUnit::Month => 30,
            AgeUnit::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedAge {
    pub amount: i64,
    pub unit: AgeUnit,
}

impl PostedAge {
    pub fn total_days(&self) -> i64 {
        self.amount.saturating_mul(self.unit.days())
    }
}

/// Parses phrases like "3 days ago". Needs both a unit keyword and a leading
/// integer, otherwise `None`.
pub fn parse_posted_age(phrase: &str) -> Option<PostedAge> {
    let lowered = phrase.to_lowercase();
    let unit = AgeUnit::PRIORITY
        .into_iter()
        .find(|unit| lowered.contains(unit.keyword()))?;
    let amount = LEADING_INT_RE
        .captures(&lowered)?
        .get(1)?
        .as_str()
        .parse::<i64>()
        .ok()?;
    Some(PostedAge { amount, unit })
}

/// Absolute posting time for a relative phrase. Unrecognised phrases and
/// offsets past the calendar range resolve to `now`.
pub fn resolve_posted_at(phrase: &str, now: NaiveDateTime) -> NaiveDateTime {
    let resolved = parse_posted_age(phrase)
        .and_then(|age| Duration::try_days(age.total_days()))
        .and_then(|offset| now.checked_sub_signed(offset));
    if resolved.is_none() {
        debug!(phrase, "posting date phrase not understood; using processing time");
    }
    resolved.unwrap_or(now)
}

pub fn normalize_date(phrase: &str, now: NaiveDateTime) -> String {
    resolve_posted_at(phrase, now)
        .format(POSTED_AT_FORMAT)
        .to_string()
}

/// Local wall-clock time truncated to whole seconds.
pub fn processing_time() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Calendar-day part of a stored `date_posted` value.
pub fn posted_day(date_posted: &str) -> &str {
    date_posted
        .split_whitespace()
        .next()
        .unwrap_or(date_posted)
}

/// Parses a stored `date_posted`. Bare dates are read as midnight.
pub fn parse_posted_at(date_posted: &str) -> Option<NaiveDateTime> {
    let trimmed = date_posted.trim();
    NaiveDateTime::parse_from_str(trimmed, POSTED_AT_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn subtracts_days() {
        assert_eq!(normalize_date("3 days ago", now()), "2024-03-07 12:00:00");
        assert_eq!(normalize_date("1 day ago", now()), "2024-03-09 12:00:00");
    }

    #[test]
    fn weeks_months_and_years_use_fixed_lengths() {
        assert_eq!(normalize_date("2 weeks ago", now()), "2024-02-25 12:00:00");
        assert_eq!(normalize_date("1 month ago", now()), "2024-02-09 12:00:00");
        assert_eq!(normalize_date("1 year ago", now()), "2023-03-11 12:00:00");
    }

    #[test]
    fn day_keyword_has_priority() {
        // "today" contains "day" with no leading integer
        assert_eq!(normalize_date("today", now()), "2024-03-10 12:00:00");
        let age = parse_posted_age("5 days (about a week) ago").unwrap();
        assert_eq!(age.unit, AgeUnit::Day);
        assert_eq!(age.amount, 5);
    }

    #[test]
    fn unrecognised_phrase_resolves_to_now() {
        assert_eq!(normalize_date("Unspecified", now()), "2024-03-10 12:00:00");
        assert_eq!(normalize_date("", now()), "2024-03-10 12:00:00");
        assert_eq!(normalize_date("a few hours ago", now()), "2024-03-10 12:00:00");
        assert_eq!(normalize_date("30 minutes ago", now()), "2024-03-10 12:00:00");
    }

    #[test]
    fn huge_offsets_do_not_panic() {
        let phrase = format!("{} years ago", i64::MAX);
        assert_eq!(normalize_date(&phrase, now()), "2024-03-10 12:00:00");
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(normalize_date("2 DAYS AGO", now()), "2024-03-08 12:00:00");
    }

    #[test]
    fn extracts_day_and_parses_stored_values() {
        assert_eq!(posted_day("2024-03-07 12:00:00"), "2024-03-07");
        assert_eq!(posted_day("2024-03-07"), "2024-03-07");
        assert_eq!(parse_posted_at("2024-03-07 12:00:00"), Some(now() - Duration::days(3)));
        assert_eq!(
            parse_posted_at("2024-03-07"),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(parse_posted_at("yesterday").is_none());
    }

    #[test]
    fn processing_time_has_no_fraction() {
        assert_eq!(processing_time().nanosecond(), 0);
    }
}
