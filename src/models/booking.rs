//! Booking data models and API request/response types.
//!
//! This module defines:
//! - `Booking`: a guest stay on a property, with its frozen price breakdown
//! - `BookingStatus`: the booking lifecycle
//! - request bodies, list filters and statistics responses

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    booking_option::{SelectedOption, validate_selection},
    tenant::looks_like_email,
};

/// Booking lifecycle.
///
/// ```text
/// PENDING ──confirm──▶ CONFIRMED ──complete──▶ COMPLETED
///    │                    │  └─────no-show───▶ NO_SHOW
///    └──────cancel────────┴─────cancel───────▶ CANCELLED
/// ```
///
/// Only `Pending` and `Confirmed` bookings occupy the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }

    /// Statuses that hold the dates.
    pub fn occupies_calendar(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Guest details may still be edited.
    pub fn is_editable(self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

/// Represents a booking record from the database.
///
/// Prices are copied from the quote at creation time and never recomputed,
/// so later period edits do not change existing bookings.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Booking {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub property_id: Uuid,

    /// Human-friendly reference, `VS` + `yymm` + 4-digit monthly sequence
    pub reference: String,
    pub check_in: NaiveDate,

    /// Departure day (not a night of the stay)
    pub check_out: NaiveDate,
    pub nights: i32,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub pets: i32,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_country: Option<String>,
    pub guest_address: Option<String>,
    pub guest_notes: Option<String>,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
    pub source: Option<String>,
    pub external_id: Option<String>,
    pub status: BookingStatus,
    pub accommodation_cents: i64,
    pub cleaning_fee_cents: i64,
    pub tourist_tax_cents: i64,
    pub extra_fees_cents: i64,

    /// Long-stay discount plus promo code discount
    pub discount_cents: i64,
    pub promo_discount_cents: i64,

    /// Booking options, included in the subtotal
    pub options_cents: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub commission_cents: i64,
    pub payout_cents: i64,
    pub promo_code_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stay parameters shared by price quotes and booking creation.
///
/// # JSON Example
///
/// ```json
/// {
///   "property_id": "550e8400-e29b-41d4-a716-446655440000",
///   "check_in": "2025-07-12",
///   "check_out": "2025-07-19",
///   "adults": 2,
///   "children": 1
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StayRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub infants: i32,
    #[serde(default)]
    pub pets: i32,
    pub promo_code: Option<String>,

    /// Booking options picked by the guest; mandatory ones are added anyway
    #[serde(default)]
    pub options: Vec<SelectedOption>,
}

/// Longest stay that can be priced or booked.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Upper bound for each guest count (adults, children, infants, pets).
pub const MAX_PARTY_SIZE: i32 = 50;

/// Nights between two dates, refusing reversed, empty and overlong stays.
pub fn stay_nights(check_in: NaiveDate, check_out: NaiveDate) -> Result<i64, String> {
    let nights = (check_out - check_in).num_days();
    if nights < 1 {
        return Err("Check-out must be after check-in".to_string());
    }
    if nights > MAX_STAY_NIGHTS {
        return Err(format!("Stays are limited to {MAX_STAY_NIGHTS} nights"));
    }
    Ok(nights)
}

impl StayRequest {
    pub fn validate(&self) -> Result<(), String> {
        stay_nights(self.check_in, self.check_out)?;
        if self.adults < 1 {
            return Err("At least one adult is required".to_string());
        }
        let counts = [self.adults, self.children, self.infants, self.pets];
        if counts.iter().any(|c| *c < 0) {
            return Err("Guest counts cannot be negative".to_string());
        }
        if counts.iter().any(|c| *c > MAX_PARTY_SIZE) {
            return Err(format!("Guest counts are limited to {MAX_PARTY_SIZE}"));
        }
        validate_selection(&self.options)
    }

    /// Guests counted against capacity and tourist tax (infants excluded).
    pub fn guests(&self) -> i32 {
        self.adults.saturating_add(self.children)
    }
}

/// Request body for booking creation, admin and public.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(flatten)]
    pub stay: StayRequest,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_country: Option<String>,
    pub guest_address: Option<String>,
    pub guest_notes: Option<String>,
    pub special_requests: Option<String>,
    pub source: Option<String>,
    pub external_id: Option<String>,
}

impl CreateBookingRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.stay.validate()?;
        if self.guest_first_name.trim().is_empty() || self.guest_last_name.trim().is_empty() {
            return Err("Guest first and last name are required".to_string());
        }
        if !looks_like_email(&self.guest_email) {
            return Err("Invalid guest email".to_string());
        }
        if self.guest_phone.trim().is_empty() {
            return Err("Guest phone is required".to_string());
        }
        if let Some(country) = &self.guest_country {
            if country.len() != 2 {
                return Err("Guest country must be a 2-letter ISO code".to_string());
            }
        }
        Ok(())
    }
}

/// Request body for `PATCH /api/v1/bookings/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub guest_first_name: Option<String>,
    pub guest_last_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_country: Option<String>,
    pub guest_address: Option<String>,
    pub guest_notes: Option<String>,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
}

impl UpdateBookingRequest {
    pub fn validate(&self) -> Result<(), String> {
        for name in [&self.guest_first_name, &self.guest_last_name, &self.guest_phone]
            .into_iter()
            .flatten()
        {
            if name.trim().is_empty() {
                return Err("Guest name and phone cannot be blank".to_string());
            }
        }
        if self.guest_email.as_deref().is_some_and(|e| !looks_like_email(e)) {
            return Err("Invalid guest email".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSortField {
    #[default]
    CreatedAt,
    CheckIn,
    CheckOut,
    Total,
}

impl BookingSortField {
    pub fn column(self) -> &'static str {
        match self {
            BookingSortField::CreatedAt => "created_at",
            BookingSortField::CheckIn => "check_in",
            BookingSortField::CheckOut => "check_out",
            BookingSortField::Total => "total_cents",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// `GET /api/v1/bookings` query string.
#[derive(Debug, Deserialize)]
pub struct BookingFilters {
    pub property_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    /// Lower bound on check-in (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Upper bound on check-in (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive match on reference, guest names and email
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub sort_by: BookingSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

impl BookingFilters {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("Page must be at least 1".to_string());
        }
        if !(1..=100).contains(&self.limit) {
            return Err("Limit must be between 1 and 100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }

    pub fn offset(page: i64, limit: i64) -> i64 {
        (page - 1) * limit
    }
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<Booking>,
    pub pagination: Pagination,
}

/// `GET /api/v1/bookings/stats` query string.
#[derive(Debug, Deserialize)]
pub struct BookingStatsQuery {
    pub property_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Aggregates over the tenant's bookings.
#[derive(Debug, Serialize)]
pub struct BookingStats {
    pub total_bookings: i64,
    pub confirmed_bookings: i64,
    pub cancelled_bookings: i64,
    /// Percentage, one decimal
    pub cancellation_rate: f64,
    pub total_revenue_cents: i64,
    pub average_stay: f64,
    /// Percentage of available property-nights that were sold, one decimal.
    /// Zero unless both range bounds are given.
    pub occupancy_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    #[test]
    fn only_pending_bookings_can_be_confirmed() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Confirmed));
    }

    #[test]
    fn finished_bookings_cannot_be_cancelled() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!NoShow.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn completion_requires_confirmation() {
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(NoShow));
    }

    #[test]
    fn only_live_bookings_occupy_the_calendar() {
        assert!(Pending.occupies_calendar());
        assert!(Confirmed.occupies_calendar());
        assert!(!Cancelled.occupies_calendar());
        assert!(!Completed.occupies_calendar());
    }

    fn stay(check_in: NaiveDate, check_out: NaiveDate) -> StayRequest {
        StayRequest {
            property_id: Uuid::new_v4(),
            check_in,
            check_out,
            adults: 2,
            children: 0,
            infants: 0,
            pets: 0,
            promo_code: None,
            options: Vec::new(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn transition_table_is_exhaustive() {
        let all = [Pending, Confirmed, Cancelled, Completed, NoShow];
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
            (Confirmed, NoShow),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn only_pending_and_confirmed_bookings_are_editable() {
        assert!(Pending.is_editable());
        assert!(Confirmed.is_editable());
        assert!(!Cancelled.is_editable());
        assert!(!Completed.is_editable());
    }

    #[test]
    fn stays_are_limited_to_a_year() {
        assert!(stay(day(2030, 1, 1), day(2031, 1, 1)).validate().is_ok());
        assert!(stay(day(2030, 1, 1), day(2031, 1, 2)).validate().is_err());
        assert!(stay(day(2025, 1, 1), day(9999, 12, 31)).validate().is_err());
        assert!(stay(day(2030, 1, 1), day(2030, 1, 1)).validate().is_err());
    }

    #[test]
    fn huge_guest_counts_are_rejected_before_summing() {
        let mut request = stay(day(2030, 1, 1), day(2030, 1, 8));
        request.adults = i32::MAX;
        request.children = 1;
        assert!(request.validate().is_err());
        assert_eq!(request.guests(), i32::MAX);

        request.adults = 4;
        request.children = MAX_PARTY_SIZE + 1;
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_flattens_stay_fields() {
        let request: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "property_id": "550e8400-e29b-41d4-a716-446655440000",
            "check_in": "2025-07-12",
            "check_out": "2025-07-19",
            "adults": 2,
            "children": 1,
            "guest_first_name": "Camille",
            "guest_last_name": "Durand",
            "guest_email": "camille@example.fr",
            "guest_phone": "+33600000000",
            "guest_country": "FR"
        }))
        .unwrap();
        assert_eq!(request.stay.guests(), 3);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn options_are_read_from_the_stay() {
        let option_id = Uuid::new_v4();
        let request: StayRequest = serde_json::from_value(serde_json::json!({
            "property_id": Uuid::new_v4(),
            "check_in": "2025-07-12",
            "check_out": "2025-07-19",
            "adults": 2,
            "options": [{ "option_id": option_id, "quantity": 2 }]
        }))
        .unwrap();
        assert_eq!(request.options, vec![SelectedOption { option_id, quantity: 2 }]);
        assert!(request.validate().is_ok());

        let mut twice = request.clone();
        twice.options.push(request.options[0]);
        assert!(twice.validate().is_err());
    }

    #[test]
    fn stay_request_rejects_zero_nights() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 12).unwrap();
        let stay = StayRequest {
            property_id: Uuid::new_v4(),
            check_in: date,
            check_out: date,
            adults: 2,
            children: 0,
            infants: 0,
            pets: 0,
            promo_code: None,
            options: Vec::new(),
        };
        assert!(stay.validate().is_err());
    }

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(1, 20, 41).pages, 3);
        assert_eq!(Pagination::new(1, 20, 0).pages, 0);
        assert_eq!(Pagination::offset(3, 20), 40);
    }

    #[test]
    fn filters_reject_oversized_pages() {
        let filters: BookingFilters =
            serde_json::from_value(serde_json::json!({ "limit": 500 })).unwrap();
        assert!(filters.validate().is_err());
    }
}
