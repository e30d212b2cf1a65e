use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::{filter_by_selection, filter_by_time_period, AnalyticsRow};
use crate::date::TimePeriod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSeniorityCount {
    pub group: String,
    pub seniority_level: String,
    pub count: u64,
}

/// Counts per (group, seniority) plus the groups ordered by total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub counts: Vec<GroupSeniorityCount>,
    pub ordered_groups: Vec<String>,
}

fn build_breakdown<'a, I>(pairs: I, levels: &[String]) -> Breakdown
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut cells: HashMap<(&str, &str), u64> = HashMap::new();
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for (group, level) in pairs {
        *cells.entry((group, level)).or_default() += 1;
        *totals.entry(group).or_default() += 1;
    }

    let mut ordered: Vec<(&str, u64)> = totals.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let group_rank: HashMap<&str, usize> = ordered
        .iter()
        .enumerate()
        .map(|(idx, (group, _))| (*group, idx))
        .collect();
    let level_rank = |level: &str| {
        levels
            .iter()
            .position(|l| l == level)
            .unwrap_or(levels.len())
    };

    let mut counts: Vec<GroupSeniorityCount> = cells
        .into_iter()
        .map(|((group, level), count)| GroupSeniorityCount {
            group: group.to_string(),
            seniority_level: level.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| {
        group_rank[a.group.as_str()]
            .cmp(&group_rank[b.group.as_str()])
            .then_with(|| level_rank(&a.seniority_level).cmp(&level_rank(&b.seniority_level)))
            .then_with(|| a.seniority_level.cmp(&b.seniority_level))
    });

    Breakdown {
        counts,
        ordered_groups: ordered.into_iter().map(|(g, _)| g.to_string()).collect(),
    }
}

/// Job fields in one region, split by seniority. A posting listed under
/// several fields counts once per field.
pub fn region_breakdown_by_field_and_seniority(
    rows: &[AnalyticsRow],
    region: &str,
    period: TimePeriod,
    levels: &[String],
    now: NaiveDateTime,
) -> Breakdown {
    let selected = filter_by_time_period(
        &filter_by_selection(rows, Some(region), None, None),
        period,
        1,
        now,
    );
    build_breakdown(
        selected.iter().flat_map(|row| {
            row.job_fields
                .iter()
                .map(move |field| (field, row.seniority_level.as_str()))
        }),
        levels,
    )
}

/// Regions for one job field, split by seniority.
pub fn field_breakdown_by_region_and_seniority(
    rows: &[AnalyticsRow],
    job_field: &str,
    period: TimePeriod,
    levels: &[String],
    now: NaiveDateTime,
) -> Breakdown {
    let selected = filter_by_time_period(
        &filter_by_selection(rows, None, Some(job_field), None),
        period,
        1,
        now,
    );
    build_breakdown(
        selected
            .iter()
            .map(|row| (row.region.as_str(), row.seniority_level.as_str())),
        levels,
    )
}
