use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Time window used for filtering and bucketing postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    #[serde(rename = "Any time")]
    AnyTime,
    #[serde(rename = "year")]
    Year,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "day")]
    Day,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time period: {0}")]
pub struct ParseTimePeriodError(pub String);

impl TimePeriod {
    pub const ALL: [TimePeriod; 5] = [
        TimePeriod::AnyTime,
        TimePeriod::Year,
        TimePeriod::Month,
        TimePeriod::Week,
        TimePeriod::Day,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::AnyTime => "Any time",
            TimePeriod::Year => "year",
            TimePeriod::Month => "month",
            TimePeriod::Week => "week",
            TimePeriod::Day => "day",
        }
    }

    /// Earliest posting time inside the window ending at `now`.
    /// `AnyTime` has no lower bound.
    pub fn window_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimePeriod::AnyTime => None,
            TimePeriod::Year => now.checked_sub_months(Months::new(12)),
            TimePeriod::Month => now.checked_sub_months(Months::new(1)),
            TimePeriod::Week => now.checked_sub_signed(Duration::weeks(1)),
            TimePeriod::Day => now.checked_sub_signed(Duration::days(1)),
        }
    }

    /// Label of the bucket holding `date`: the last day the bucket covers.
    /// Weeks end on Sunday. `AnyTime` buckets by year.
    pub fn bucket_end(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimePeriod::Day => date,
            TimePeriod::Week => {
                let days_to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
                date.checked_add_signed(Duration::days(days_to_sunday))
                    .unwrap_or(date)
            }
            TimePeriod::Month => month_end(date),
            TimePeriod::Year | TimePeriod::AnyTime => {
                NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date)
            }
        }
    }

    /// Label of the bucket following the one labelled `end`.
    pub fn next_bucket_end(&self, end: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimePeriod::Day => end.succ_opt(),
            TimePeriod::Week => end.checked_add_signed(Duration::weeks(1)),
            TimePeriod::Month => end.succ_opt().map(month_end),
            TimePeriod::Year | TimePeriod::AnyTime => {
                NaiveDate::from_ymd_opt(end.year() + 1, 12, 31)
            }
        }
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(date)
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimePeriod {
    type Err = ParseTimePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any time" | "anytime" | "any_time" | "any-time" => Ok(TimePeriod::AnyTime),
            "year" => Ok(TimePeriod::Year),
            "month" => Ok(TimePeriod::Month),
            "week" => Ok(TimePeriod::Week),
            "day" => Ok(TimePeriod::Day),
            _ => Err(ParseTimePeriodError(s.to_string())),
        }
    }
}
