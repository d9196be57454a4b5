//! # Sales Buckets
//!
//! Calendar bucketing for committed sale facts. The database layer turns
//! sale lines into `(sold_at, amount)` facts; this module groups them.
//!
//! ## Periods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Period    Buckets                          Fact belongs if ...         │
//! │  ───────   ──────────────────────────────   ──────────────────────────  │
//! │  Daily     Monday .. Sunday                 same week as `now`          │
//! │  Weekly    Week 1 .. Week 5                 same month as `now`         │
//! │            (day_of_month - 1) / 7 + 1                                   │
//! │  Monthly   January .. December              same year as `now`          │
//! │  Yearly    year-4 .. year                   within those five years     │
//! │                                                                         │
//! │  Every bucket is present; empty buckets report 0.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All calendar math is UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Number of yearly buckets.
pub const YEARLY_WINDOW: i32 = 5;

// =============================================================================
// Period
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Daily => write!(f, "daily"),
            Period::Weekly => write!(f, "weekly"),
            Period::Monthly => write!(f, "monthly"),
            Period::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Period::Daily),
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            "yearly" | "year" => Ok(Period::Yearly),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: vec![
                    "daily".to_string(),
                    "weekly".to_string(),
                    "monthly".to_string(),
                    "yearly".to_string(),
                ],
            }),
        }
    }
}

/// First day of the week for daily reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl FromStr for WeekStart {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monday" | "mon" => Ok(WeekStart::Monday),
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            _ => Err(ValidationError::NotAllowed {
                field: "week_start".to_string(),
                allowed: vec!["monday".to_string(), "sunday".to_string()],
            }),
        }
    }
}

impl WeekStart {
    fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }

    /// First date of the week containing `date`.
    pub fn week_of(&self, date: NaiveDate) -> NaiveDate {
        let day = date.weekday().num_days_from_monday();
        let start = self.weekday().num_days_from_monday();
        let back = (day + 7 - start) % 7;
        date - Duration::days(i64::from(back))
    }
}

// =============================================================================
// Facts and Reports
// =============================================================================

/// A committed sale reduced to when it happened and what it is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleFact {
    pub sold_at: DateTime<Utc>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesBucket {
    pub label: String,
    pub total_cents: i64,
}

/// Ordered, zero-filled buckets for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesReport {
    pub period: Period,
    /// `None` for the catalog-wide report.
    pub supplier_id: Option<i64>,
    pub buckets: Vec<SalesBucket>,
}

impl SalesReport {
    /// Total of one bucket, `None` if the label is not a bucket.
    pub fn get(&self, label: &str) -> Option<Money> {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map(|b| Money::from_cents(b.total_cents))
    }

    pub fn total(&self) -> Money {
        self.buckets
            .iter()
            .map(|b| Money::from_cents(b.total_cents))
            .sum()
    }
}

/// Per-supplier total over stored sale-line amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupplierTotal {
    pub supplier_id: i64,
    pub store_name: String,
    pub total_cents: i64,
}

// =============================================================================
// Bucketing
// =============================================================================

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// Earliest instant a fact can have and still land in a bucket.
///
/// Used by the database layer to bound its scan.
pub fn window_start(period: Period, now: DateTime<Utc>, week_start: WeekStart) -> DateTime<Utc> {
    let today = now.date_naive();
    let date = match period {
        Period::Daily => Some(week_start.week_of(today)),
        Period::Weekly => NaiveDate::from_ymd_opt(today.year(), today.month(), 1),
        Period::Monthly => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        Period::Yearly => NaiveDate::from_ymd_opt(today.year() - (YEARLY_WINDOW - 1), 1, 1),
    };
    midnight(date.unwrap_or(NaiveDate::MIN))
}

/// Bucket labels in display order.
pub fn labels(period: Period, now: DateTime<Utc>, week_start: WeekStart) -> Vec<String> {
    match period {
        Period::Daily => {
            let first = week_start.week_of(now.date_naive());
            (0..7)
                .map(|offset| weekday_name((first + Duration::days(offset)).weekday()).to_string())
                .collect()
        }
        Period::Weekly => (1..=5).map(|w| format!("Week {}", w)).collect(),
        Period::Monthly => MONTH_NAMES.iter().map(|m| m.to_string()).collect(),
        Period::Yearly => {
            let year = now.year();
            ((year - (YEARLY_WINDOW - 1))..=year)
                .map(|y| y.to_string())
                .collect()
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

/// Label of the bucket a fact falls into, if it is inside the period.
fn bucket_of(
    period: Period,
    now: DateTime<Utc>,
    week_start: WeekStart,
    at: DateTime<Utc>,
) -> Option<String> {
    let today = now.date_naive();
    let day = at.date_naive();

    match period {
        Period::Daily => {
            (week_start.week_of(day) == week_start.week_of(today))
                .then(|| weekday_name(day.weekday()).to_string())
        }
        Period::Weekly => (day.year() == today.year() && day.month() == today.month())
            .then(|| format!("Week {}", day.day0() / 7 + 1)),
        Period::Monthly => {
            (day.year() == today.year()).then(|| MONTH_NAMES[day.month0() as usize].to_string())
        }
        Period::Yearly => {
            let range = (today.year() - (YEARLY_WINDOW - 1))..=today.year();
            range.contains(&day.year()).then(|| day.year().to_string())
        }
    }
}

/// Groups facts into the zero-filled buckets of `period` relative to `now`.
///
/// Facts outside the current period are ignored.
pub fn bucket_sales(
    period: Period,
    now: DateTime<Utc>,
    week_start: WeekStart,
    supplier_id: Option<i64>,
    facts: &[SaleFact],
) -> SalesReport {
    let mut buckets: Vec<SalesBucket> = labels(period, now, week_start)
        .into_iter()
        .map(|label| SalesBucket {
            label,
            total_cents: 0,
        })
        .collect();

    for fact in facts {
        let Some(label) = bucket_of(period, now, week_start, fact.sold_at) else {
            continue;
        };
        if let Some(bucket) = buckets.iter_mut().find(|b| b.label == label) {
            bucket.total_cents += fact.amount_cents;
        }
    }

    SalesReport {
        period,
        supplier_id,
        buckets,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
