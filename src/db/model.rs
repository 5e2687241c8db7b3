//! Database input and view models used by repositories.
//!
//! Keep these structs focused on the data flowing in and out of queries.
//! Business rules live in `lifecycle` and `model`.

use crate::model::{Ad, AdSlot, PaymentType, SlotPosition, User};
use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Fields supplied by the advertiser when submitting a campaign.
#[derive(Debug, Clone)]
pub struct NewAd {
    pub advertiser_id: String,
    pub title: String,
    pub ad_type_id: Option<String>,
    pub payment_type: PaymentType,
    pub budget: f64,
    pub target_views: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Partial update of an ad's editable fields. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct AdPatch {
    pub title: Option<String>,
    pub budget: Option<f64>,
    pub target_views: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewAdSlot {
    pub name: String,
    pub location: String,
    pub position: SlotPosition,
    pub price_per_day: f64,
    pub price_per_view: f64,
    pub ad_type_id: Option<String>,
}

/// One blocking booking on a slot, for calendar rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedRange {
    pub ad_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Ad together with its advertiser and the slots it is booked into.
#[derive(Debug, Clone, Serialize)]
pub struct AdWithSlots {
    pub ad: Ad,
    pub advertiser: User,
    pub slots: Vec<AdSlot>,
}

/// Dashboard listing row: ad plus pre-aggregated view counts.
#[derive(Debug, Clone, Serialize)]
pub struct AdWithAnalytics {
    pub ad: Ad,
    pub advertiser: User,
    pub slots: Vec<AdSlot>,
    pub view_count: i64,
    pub views_today: i64,
}

/// Calendar-bounded rollups for a single ad. Plain filtered counts; they
/// reset at each local calendar boundary rather than sliding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdAnalytics {
    pub total_views: i64,
    pub views_today: i64,
    pub views_this_week: i64,
    pub views_this_month: i64,
}

/// Marketplace-wide counters for the admin overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub pending_count: i64,
    pub active_count: i64,
    pub advertiser_count: i64,
    pub monthly_revenue: f64,
}

/// UTC instants of the local calendar boundaries the analytics counts use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStarts {
    pub today: DateTime<Utc>,
    /// Most recent Sunday, local midnight.
    pub week: DateTime<Utc>,
    /// First of the month, local midnight.
    pub month: DateTime<Utc>,
}

pub fn period_starts(now: DateTime<Local>) -> PeriodStarts {
    let date = now.date_naive();
    let week_date = date - Duration::days(now.weekday().num_days_from_sunday() as i64);
    let month_date = date.with_day(1).unwrap_or(date);
    PeriodStarts {
        today: local_midnight(date),
        week: local_midnight(week_date),
        month: local_midnight(month_date),
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // DST edge: midnight repeated or skipped. Take the earlier instant,
        // or fall back to treating the naive time as UTC.
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}
