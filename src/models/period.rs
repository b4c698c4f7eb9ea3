//! Pricing periods and blocked periods.
//!
//! Both are inclusive date ranges (`start_date..=end_date`, calendar dates
//! without time zone):
//! - a `Period` overrides nightly price, weekend premium and minimum stay
//! - a `BlockedPeriod` makes nights unavailable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a pricing period from the database.
///
/// `property_id = None` makes the period apply to every property of the
/// tenant. Overlapping periods are allowed; see
/// [`crate::services::pricing::applicable_period`] for precedence.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Period {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub property_id: Option<Uuid>,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Higher priority wins among periods of the same scope
    pub priority: i32,
    pub base_price_cents: i64,
    pub weekend_premium_cents: i64,
    pub min_nights: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Request body for `POST /api/v1/periods`.
///
/// # JSON Example
///
/// ```json
/// {
///   "property_id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Haute saison",
///   "start_date": "2025-07-01",
///   "end_date": "2025-08-31",
///   "priority": 10,
///   "base_price_cents": 35000,
///   "weekend_premium_cents": 5000,
///   "min_nights": 7
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreatePeriodRequest {
    pub property_id: Option<Uuid>,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub priority: i32,
    pub base_price_cents: i64,
    #[serde(default)]
    pub weekend_premium_cents: i64,
    #[serde(default = "default_min_nights")]
    pub min_nights: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_min_nights() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

impl CreatePeriodRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.name.len() > 100 {
            return Err("Name must be between 1 and 100 characters".to_string());
        }
        validate_period_values(
            self.start_date,
            self.end_date,
            Some(self.priority),
            Some(self.base_price_cents),
            Some(self.weekend_premium_cents),
            Some(self.min_nights),
        )
    }
}

/// Request body for `PATCH /api/v1/periods/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdatePeriodRequest {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub priority: Option<i32>,
    pub base_price_cents: Option<i64>,
    pub weekend_premium_cents: Option<i64>,
    pub min_nights: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdatePeriodRequest {
    /// Validate against the stored row, since dates may change one at a time.
    pub fn validate_against(&self, current: &Period) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.len() > 100 {
                return Err("Name must be between 1 and 100 characters".to_string());
            }
        }
        validate_period_values(
            self.start_date.unwrap_or(current.start_date),
            self.end_date.unwrap_or(current.end_date),
            self.priority,
            self.base_price_cents,
            self.weekend_premium_cents,
            self.min_nights,
        )
    }
}

fn validate_period_values(
    start_date: NaiveDate,
    end_date: NaiveDate,
    priority: Option<i32>,
    base_price_cents: Option<i64>,
    weekend_premium_cents: Option<i64>,
    min_nights: Option<i32>,
) -> Result<(), String> {
    if start_date > end_date {
        return Err("End date must not be before start date".to_string());
    }
    if priority.is_some_and(|p| p < 0) {
        return Err("Priority cannot be negative".to_string());
    }
    if base_price_cents.is_some_and(|p| p <= 0) {
        return Err("Base price must be positive".to_string());
    }
    if weekend_premium_cents.is_some_and(|p| p < 0) {
        return Err("Weekend premium cannot be negative".to_string());
    }
    if min_nights.is_some_and(|n| n < 1) {
        return Err("Minimum nights must be at least 1".to_string());
    }
    Ok(())
}

/// Optional `?property_id=` filter on the period list.
#[derive(Debug, Deserialize)]
pub struct PeriodFilter {
    pub property_id: Option<Uuid>,
}

/// Nights a property cannot be booked, declared by the owner or imported from iCal.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BlockedPeriod {
    pub id: Uuid,
    pub property_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockedPeriodRequest {
    pub property_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlockedPeriodRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// `GET /api/v1/availability/blocked-periods` query.
#[derive(Debug, Deserialize)]
pub struct BlockedPeriodFilter {
    pub property_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// `GET /api/v1/availability/check` query.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Ignore this booking, when checking whether it can be moved
    pub exclude_booking_id: Option<Uuid>,
}

/// `GET /api/v1/availability/calendar` query. Both bounds are inclusive.
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub property_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Body of `POST /api/v1/availability/ical/import`. One of `url` or `content` is required.
#[derive(Debug, Deserialize)]
pub struct IcalImportRequest {
    pub property_id: Uuid,
    pub url: Option<String>,
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn create_period_rejects_reversed_dates() {
        let request: CreatePeriodRequest = serde_json::from_value(serde_json::json!({
            "name": "Noël",
            "start_date": "2025-12-31",
            "end_date": "2025-12-20",
            "base_price_cents": 30000
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn single_day_period_is_valid() {
        let request: CreatePeriodRequest = serde_json::from_value(serde_json::json!({
            "name": "Nouvel an",
            "start_date": "2025-12-31",
            "end_date": "2025-12-31",
            "base_price_cents": 50000
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.is_active);
        assert_eq!(request.min_nights, 1);
    }

    #[test]
    fn update_checks_dates_against_stored_row() {
        let now = Utc::now();
        let current = Period {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            property_id: None,
            name: "Été".into(),
            start_date: date(2025, 7, 1),
            end_date: date(2025, 8, 31),
            priority: 0,
            base_price_cents: 20000,
            weekend_premium_cents: 0,
            min_nights: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let moves_start_past_end = UpdatePeriodRequest {
            name: None,
            start_date: Some(date(2025, 9, 1)),
            end_date: None,
            priority: None,
            base_price_cents: None,
            weekend_premium_cents: None,
            min_nights: None,
            is_active: None,
        };
        assert!(moves_start_past_end.validate_against(&current).is_err());
        assert!(current.contains(date(2025, 8, 31)));
        assert!(!current.contains(date(2025, 9, 1)));
    }
}
