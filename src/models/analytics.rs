//! Analytics query and report types.
//!
//! Reports cover CONFIRMED and COMPLETED stays lying inside the range.
//! Amounts are in cents, rates in percent with one decimal.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::booking::BookingStatus;

/// Longest range a report may span.
pub const MAX_RANGE_DAYS: i64 = 731;

/// Query string shared by the analytics endpoints.
///
/// Without dates, the range runs from the first day of the month two
/// months ago to the last day of the current month.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub property_id: Option<Uuid>,
}

/// Inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl AnalyticsQuery {
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, String> {
        let this_month = today.with_day(1).unwrap_or(today);
        let start = match self.start_date {
            Some(start) => start,
            None => this_month
                .checked_sub_months(Months::new(2))
                .unwrap_or(this_month),
        };
        let end = match self.end_date {
            Some(end) => end,
            None => this_month
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(today),
        };

        if start > end {
            return Err("End date cannot be before start date".to_string());
        }
        let range = DateRange { start, end };
        if range.days() > MAX_RANGE_DAYS {
            return Err(format!("Range cannot exceed {MAX_RANGE_DAYS} days"));
        }
        Ok(range)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopPropertySort {
    #[default]
    Revenue,
    Bookings,
}

/// Query string of `GET /api/v1/analytics/top-properties`.
#[derive(Debug, Deserialize)]
pub struct TopPropertiesQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_top_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sort_by: TopPropertySort,
}

impl TopPropertiesQuery {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=50).contains(&self.limit) {
            return Err("Limit must be between 1 and 50".to_string());
        }
        Ok(())
    }

    pub fn range(&self, today: NaiveDate) -> Result<DateRange, String> {
        AnalyticsQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            property_id: None,
        }
        .range(today)
    }
}

fn default_top_limit() -> usize {
    10
}

/// A sold stay, as the reports read it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StayRecord {
    pub reference: String,
    pub property_id: Uuid,
    pub property_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i32,
    pub guests: i32,
    pub status: BookingStatus,
    pub source: Option<String>,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct PropertyPerformance {
    pub property_id: Uuid,
    pub name: String,
    pub revenue_cents: i64,
    pub bookings: i64,
    pub nights: i64,
    /// Sold nights over the days of the range
    pub occupancy_rate: f64,
    pub average_nightly_rate_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct SourceShare {
    pub source: String,
    pub count: i64,
    pub revenue_cents: i64,
    /// Share of the revenue
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyOccupancy {
    /// `YYYY-MM`
    pub month: String,
    pub occupied_nights: i64,
    pub total_nights: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct OccupancyReport {
    pub range: DateRange,
    pub properties: i64,
    pub occupied_nights: i64,
    pub total_nights: i64,
    pub occupancy_rate: f64,
    pub monthly: Vec<MonthlyOccupancy>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`, by check-in
    pub month: String,
    pub revenue_cents: i64,
    pub bookings: i64,
}

#[derive(Debug, Serialize)]
pub struct RevenueReport {
    pub range: DateRange,
    pub total_revenue_cents: i64,
    pub average_revenue_per_night_cents: i64,
    pub average_revenue_per_booking_cents: i64,
    pub monthly: Vec<MonthlyRevenue>,
}

/// Response of `GET /api/v1/analytics/overview`.
///
/// # JSON Example
///
/// ```json
/// {
///   "range": { "start": "2025-05-01", "end": "2025-07-31" },
///   "total_bookings": 18,
///   "total_revenue_cents": 3120000,
///   "average_stay": 5.6,
///   "occupancy_rate": 61.4,
///   "top_properties": [ ... ],
///   "booking_sources": [ ... ]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AnalyticsOverview {
    pub range: DateRange,
    pub total_bookings: i64,
    pub total_revenue_cents: i64,
    pub average_stay: f64,
    pub occupancy_rate: f64,
    pub top_properties: Vec<PropertyPerformance>,
    pub booking_sources: Vec<SourceShare>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_range_covers_three_calendar_months() {
        let range = AnalyticsQuery::default().range(day(2025, 7, 14)).unwrap();
        assert_eq!(range.start, day(2025, 5, 1));
        assert_eq!(range.end, day(2025, 7, 31));
        assert_eq!(range.days(), 92);

        let january = AnalyticsQuery::default().range(day(2026, 1, 3)).unwrap();
        assert_eq!(january.start, day(2025, 11, 1));
        assert_eq!(january.end, day(2026, 1, 31));
    }

    #[test]
    fn ranges_must_be_ordered_and_bounded() {
        let reversed = AnalyticsQuery {
            start_date: Some(day(2025, 8, 1)),
            end_date: Some(day(2025, 7, 1)),
            property_id: None,
        };
        assert!(reversed.range(day(2025, 7, 14)).is_err());

        let single = AnalyticsQuery {
            start_date: Some(day(2025, 7, 1)),
            end_date: Some(day(2025, 7, 1)),
            property_id: None,
        };
        assert_eq!(single.range(day(2025, 7, 14)).unwrap().days(), 1);

        let decade = AnalyticsQuery {
            start_date: Some(day(2020, 1, 1)),
            end_date: Some(day(2030, 1, 1)),
            property_id: None,
        };
        assert!(decade.range(day(2025, 7, 14)).is_err());
    }

    #[test]
    fn top_properties_query_defaults() {
        let query: TopPropertiesQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort_by, TopPropertySort::Revenue);
        assert!(query.validate().is_ok());

        let query: TopPropertiesQuery =
            serde_json::from_value(serde_json::json!({ "limit": 0, "sort_by": "bookings" }))
                .unwrap();
        assert_eq!(query.sort_by, TopPropertySort::Bookings);
        assert!(query.validate().is_err());
    }
}
