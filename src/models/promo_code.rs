//! Promo code models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::booking::BookingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `discount_value` is a whole percentage (1-100)
    Percentage,
    /// `discount_value` is an amount in cents
    FixedAmount,
}

/// Represents a promo code record from the database.
///
/// `code` is stored upper-case and is unique per tenant.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PromoCode {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub min_amount_cents: Option<i64>,
    pub min_nights: Option<i32>,

    /// Eligible properties; empty means every property of the tenant
    pub property_ids: Vec<Uuid>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromoCodeRequest {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub min_amount_cents: Option<i64>,
    pub min_nights: Option<i32>,
    #[serde(default)]
    pub property_ids: Vec<Uuid>,
    pub max_uses: Option<i32>,
}

impl CreatePromoCodeRequest {
    pub fn validate(&self) -> Result<(), String> {
        let code = self.code.trim();
        if code.len() < 3
            || code.len() > 30
            || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(
                "Code must be 3-30 characters of letters, digits, '-' or '_'".to_string(),
            );
        }
        match self.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&self.discount_value) => {
                return Err("Percentage discount must be between 1 and 100".to_string());
            }
            DiscountType::FixedAmount if self.discount_value <= 0 => {
                return Err("Fixed discount must be positive".to_string());
            }
            _ => {}
        }
        if self.valid_from >= self.valid_until {
            return Err("valid_until must be after valid_from".to_string());
        }
        if self.min_amount_cents.is_some_and(|a| a < 0)
            || self.min_nights.is_some_and(|n| n < 1)
            || self.max_uses.is_some_and(|n| n < 1)
        {
            return Err("Limits must be positive".to_string());
        }
        Ok(())
    }

    /// `property_ids` without repeats, first occurrence kept.
    pub fn distinct_property_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(self.property_ids.len());
        for id in &self.property_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromoCodeRequest {
    pub description: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    pub is_active: Option<bool>,
}

/// Body of `POST /api/public/promocodes/validate`.
#[derive(Debug, Deserialize)]
pub struct ValidatePromoCodeRequest {
    pub code: String,
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_guests")]
    pub guests: i32,
}

fn default_guests() -> i32 {
    1
}

/// Outcome of a promo code check, always returned with HTTP 200.
#[derive(Debug, Serialize)]
pub struct PromoCodeValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount_cents: Option<i64>,
}

/// A booking that used a code, as listed in its statistics.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct PromoBookingSummary {
    pub id: Uuid,
    pub reference: String,
    pub check_in: NaiveDate,
    pub status: BookingStatus,
    pub total_cents: i64,
    pub promo_discount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /api/v1/promocodes/{id}/stats`.
///
/// Discount and revenue leave cancelled bookings out.
#[derive(Debug, Serialize)]
pub struct PromoCodeStats {
    pub code: String,
    pub current_uses: i32,
    pub max_uses: Option<i32>,
    /// `current_uses / max_uses` in percent, when the code is capped
    pub usage_rate: Option<f64>,
    pub total_bookings: i64,
    pub total_discount_cents: i64,
    pub revenue_cents: i64,
    pub recent_bookings: Vec<PromoBookingSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(discount_type: DiscountType, value: i64) -> CreatePromoCodeRequest {
        let now = Utc::now();
        CreatePromoCodeRequest {
            code: "SUMMER25".into(),
            description: None,
            discount_type,
            discount_value: value,
            valid_from: now,
            valid_until: now + Duration::days(30),
            min_amount_cents: None,
            min_nights: None,
            property_ids: Vec::new(),
            max_uses: None,
        }
    }

    #[test]
    fn percentage_must_not_exceed_one_hundred() {
        assert!(request(DiscountType::Percentage, 25).validate().is_ok());
        assert!(request(DiscountType::Percentage, 120).validate().is_err());
    }

    #[test]
    fn fixed_amount_may_exceed_one_hundred() {
        assert!(request(DiscountType::FixedAmount, 5000).validate().is_ok());
    }

    #[test]
    fn repeated_property_ids_collapse_in_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut req = request(DiscountType::Percentage, 10);
        req.property_ids = vec![a, b, a, b, a];
        assert_eq!(req.distinct_property_ids(), vec![a, b]);
    }

    #[test]
    fn code_rejects_spaces() {
        let mut bad = request(DiscountType::FixedAmount, 1000);
        bad.code = "SUMMER 25".into();
        assert!(bad.validate().is_err());
    }
}
