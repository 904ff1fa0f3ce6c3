//! Read-only views over the report collection: filters, ordering and aggregate counts.
//!
//! Every function takes the collection by shared reference and never mutates it. Date
//! computations use the calendar of the timezone carried by `now`, so callers pass
//! `Local::now()` in production and a fixed offset in tests.

use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::report::{ActionEntry, Report, ReportStatus},
};

const MONTHS_SHOWN: i32 = 6;
const UNKNOWN_HAZARD: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateBucket {
    #[serde(rename = "All Time")]
    AllTime,
    Today,
    #[serde(rename = "This Week")]
    ThisWeek,
    #[serde(rename = "This Month")]
    ThisMonth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(ReportStatus),
}

#[derive(Clone, Debug)]
pub struct ReportFilter {
    pub status: StatusFilter,
    pub bucket: DateBucket,
    pub query: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HazardCount {
    pub hazard: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_reports: usize,
    pub resolved_count: usize,
    pub status_counts: BTreeMap<ReportStatus, usize>,
    pub monthly: Vec<MonthlyCount>,
    pub hazards: Vec<HazardCount>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub report_id: u32,
    pub hazard: String,
    #[serde(flatten)]
    pub entry: ActionEntry,
}

impl DateBucket {
    pub fn label(self) -> &'static str {
        match self {
            DateBucket::AllTime => "All Time",
            DateBucket::Today => "Today",
            DateBucket::ThisWeek => "This Week",
            DateBucket::ThisMonth => "This Month",
        }
    }
}

impl FromStr for DateBucket {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        [
            DateBucket::AllTime,
            DateBucket::Today,
            DateBucket::ThisWeek,
            DateBucket::ThisMonth,
        ]
        .into_iter()
        .find(|bucket| bucket.label().to_lowercase() == normalized)
        .ok_or(AppError::InvalidInput {
            field: "bucket",
            reason: "is not a date bucket",
        })
    }
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            status: StatusFilter::All,
            bucket: DateBucket::AllTime,
            query: String::new(),
        }
    }
}

fn local_date<Tz: TimeZone>(report: &Report, tz: &Tz) -> Option<NaiveDate> {
    report
        .created_at()
        .map(|date| date.with_timezone(tz).date_naive())
}

pub fn matches_status(report: &Report, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Only(status) => report.effective_status() == status,
    }
}

pub fn matches_bucket<Tz: TimeZone>(report: &Report, bucket: DateBucket, now: &DateTime<Tz>) -> bool {
    if bucket == DateBucket::AllTime {
        return true;
    }
    let Some(day) = local_date(report, &now.timezone()) else {
        return false;
    };
    let today = now.date_naive();

    match bucket {
        DateBucket::AllTime => true,
        DateBucket::Today => day == today,
        DateBucket::ThisWeek => {
            let start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
            let end = start + Duration::days(6);
            day >= start && day <= end
        }
        DateBucket::ThisMonth => day.year() == today.year() && day.month() == today.month(),
    }
}

/// Case-insensitive match on hazard label, report id and the `M/D/YYYY` date.
pub fn matches_query<Tz: TimeZone>(report: &Report, query: &str, tz: &Tz) -> bool {
    let query = query.to_lowercase();
    if query.is_empty() {
        return true;
    }

    let hazard = report
        .hazard
        .as_deref()
        .map(|hazard| hazard.to_lowercase().contains(&query))
        .unwrap_or(false);
    let id = report
        .report_id
        .map(|id| id.to_string().contains(&query))
        .unwrap_or(false);
    let date = local_date(report, tz)
        .map(|day| day.format("%-m/%-d/%Y").to_string().contains(&query))
        .unwrap_or(false);

    hazard || id || date
}

/// Most recent first. Reports with equal (or missing) dates keep their stored order.
pub fn newest_first(reports: &[Report]) -> Vec<&Report> {
    let mut sorted: Vec<&Report> = reports.iter().collect();
    sorted.sort_by_key(|report| {
        std::cmp::Reverse(
            report
                .created_at()
                .map(|date| date.timestamp_millis())
                .unwrap_or(0),
        )
    });
    sorted
}

pub fn filter_reports<'a, Tz: TimeZone>(
    reports: &'a [Report],
    filter: &ReportFilter,
    now: &DateTime<Tz>,
) -> Vec<&'a Report> {
    let tz = now.timezone();
    newest_first(reports)
        .into_iter()
        .filter(|report| {
            matches_status(report, filter.status)
                && matches_bucket(report, filter.bucket, now)
                && matches_query(report, &filter.query, &tz)
        })
        .collect()
}

/// Count per effective status. Every status is present, so the values sum to `reports.len()`.
pub fn status_counts(reports: &[Report]) -> BTreeMap<ReportStatus, usize> {
    let mut counts: BTreeMap<ReportStatus, usize> =
        ReportStatus::ALL.into_iter().map(|status| (status, 0)).collect();
    for report in reports.iter() {
        *counts.entry(report.effective_status()).or_default() += 1;
    }
    counts
}

/// Day a report counts toward in the monthly chart: `date`, then `dateSubmitted`, then today.
/// A present value that does not parse counts toward no month.
fn charted_date<Tz: TimeZone>(report: &Report, now: &DateTime<Tz>) -> Option<NaiveDate> {
    let raw = [report.date.as_deref(), report.date_submitted.as_deref()]
        .into_iter()
        .flatten()
        .find(|date| !date.trim().is_empty());
    match raw {
        Some(date) => DateTime::parse_from_rfc3339(date.trim())
            .ok()
            .map(|date| date.with_timezone(&now.timezone()).date_naive()),
        None => Some(now.date_naive()),
    }
}

/// Reports per month for the trailing six months, oldest first, zero-filled.
pub fn monthly_frequency<Tz: TimeZone>(reports: &[Report], now: &DateTime<Tz>) -> Vec<MonthlyCount> {
    let current = now.year() * 12 + now.month0() as i32;
    let mut months: Vec<MonthlyCount> = ((current - MONTHS_SHOWN + 1)..=current)
        .map(|index| MonthlyCount {
            month: format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1),
            count: 0,
        })
        .collect();

    for report in reports.iter() {
        if let Some(day) = charted_date(report, now) {
            let key = format!("{:04}-{:02}", day.year(), day.month());
            if let Some(bucket) = months.iter_mut().find(|bucket| bucket.month == key) {
                bucket.count += 1;
            }
        }
    }
    months
}

/// Reports per hazard label, most frequent first. Ties keep first-seen order.
pub fn hazard_frequency(reports: &[Report]) -> Vec<HazardCount> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for report in reports.iter() {
        let label = report
            .hazard
            .as_deref()
            .map(str::trim)
            .filter(|hazard| !hazard.is_empty())
            .unwrap_or(UNKNOWN_HAZARD);
        match counts.iter_mut().find(|(hazard, _)| hazard == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }

    let total = reports.len();
    let mut frequency: Vec<HazardCount> = counts
        .into_iter()
        .map(|(hazard, count)| HazardCount {
            hazard,
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    frequency.sort_by(|a, b| b.count.cmp(&a.count));
    frequency
}

pub fn summarize<Tz: TimeZone>(reports: &[Report], now: &DateTime<Tz>) -> AnalyticsSummary {
    let status_counts = status_counts(reports);
    AnalyticsSummary {
        total_reports: reports.len(),
        resolved_count: status_counts
            .get(&ReportStatus::Resolved)
            .copied()
            .unwrap_or_default(),
        status_counts,
        monthly: monthly_frequency(reports, now),
        hazards: hazard_frequency(reports),
    }
}

/// Every history entry across all reports, newest first.
pub fn activity_log(reports: &[Report]) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = reports
        .iter()
        .flat_map(|report| {
            report.action_history.iter().map(move |entry| ActivityEntry {
                report_id: report.id(),
                hazard: report
                    .hazard
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_HAZARD.to_string()),
                entry: entry.clone(),
            })
        })
        .collect();
    entries.sort_by_key(|activity| {
        std::cmp::Reverse(
            DateTime::parse_from_rfc3339(&activity.entry.date)
                .map(|date| date.timestamp_millis())
                .unwrap_or(0),
        )
    });
    entries
}
