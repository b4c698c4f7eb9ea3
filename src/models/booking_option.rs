//! Booking options: extras a guest adds to a stay (cleaning, breakfast,
//! airport transfer, ...).
//!
//! Options are defined once per tenant. Each property offers every active
//! option unless its [`PropertyOptionSettings`] disable it, and may
//! override the unit price and quantity bounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest quantity of one option on a single stay.
pub const MAX_OPTION_QUANTITY: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "option_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionCategory {
    Cleaning,
    Catering,
    Transport,
    Activities,
    Equipment,
    Wellness,
    Childcare,
    Pet,
    Comfort,
    Other,
}

/// What the unit price is multiplied by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "option_pricing_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionPricingType {
    /// Per guest (adults and children)
    PerPerson,
    PerGroup,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "option_pricing_period", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionPricingPeriod {
    /// Charged for every night
    PerDay,
    PerStay,
}

/// Represents a booking option record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BookingOption {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,

    /// Localised names keyed by locale (`{"fr": "Ménage", "en": "Cleaning"}`)
    pub name: serde_json::Value,
    pub description: serde_json::Value,
    pub category: OptionCategory,
    pub pricing_type: OptionPricingType,
    pub price_per_unit_cents: i64,
    pub pricing_period: OptionPricingPeriod,

    /// Added to every eligible stay, quantity `max(min_quantity, 1)`
    pub is_mandatory: bool,
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
    pub min_guests: Option<i32>,
    pub max_guests: Option<i32>,
    pub min_nights: Option<i32>,
    pub is_active: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-property overrides of an option.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PropertyOptionSettings {
    pub property_id: Uuid,
    pub option_id: Uuid,
    pub custom_price_cents: Option<i64>,
    pub custom_min_quantity: Option<i32>,
    pub custom_max_quantity: Option<i32>,
    pub is_enabled: bool,
}

/// An option as a property sees it.
#[derive(Debug, Serialize)]
pub struct PropertyBookingOption {
    #[serde(flatten)]
    pub option: BookingOption,
    pub settings: Option<PropertyOptionSettings>,
}

/// Request body for `POST /api/v1/booking-options`.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": { "fr": "Petit-déjeuner", "en": "Breakfast" },
///   "category": "CATERING",
///   "pricing_type": "PER_PERSON",
///   "price_per_unit_cents": 1500,
///   "pricing_period": "PER_DAY"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateBookingOptionRequest {
    pub name: serde_json::Value,
    #[serde(default = "empty_object")]
    pub description: serde_json::Value,
    pub category: OptionCategory,
    pub pricing_type: OptionPricingType,
    pub price_per_unit_cents: i64,
    pub pricing_period: OptionPricingPeriod,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
    pub min_guests: Option<i32>,
    pub max_guests: Option<i32>,
    pub min_nights: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub position: i32,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

/// A locale map with at least one non-empty string.
fn is_locale_map(value: &serde_json::Value) -> bool {
    value.as_object().is_some_and(|map| {
        map.values()
            .any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()))
            && map.values().all(serde_json::Value::is_string)
    })
}

fn validate_bounds(
    min_quantity: Option<i32>,
    max_quantity: Option<i32>,
    min_guests: Option<i32>,
    max_guests: Option<i32>,
    min_nights: Option<i32>,
) -> Result<(), String> {
    if min_quantity.is_some_and(|n| !(0..=MAX_OPTION_QUANTITY).contains(&n))
        || max_quantity.is_some_and(|n| !(1..=MAX_OPTION_QUANTITY).contains(&n))
    {
        return Err(format!("Quantities must be between 0 and {MAX_OPTION_QUANTITY}"));
    }
    if let (Some(min), Some(max)) = (min_quantity, max_quantity) {
        if min > max {
            return Err("Minimum quantity cannot exceed maximum quantity".to_string());
        }
    }
    if min_guests.is_some_and(|n| n < 1)
        || max_guests.is_some_and(|n| n < 1)
        || min_nights.is_some_and(|n| n < 1)
    {
        return Err("Guest and night limits must be positive".to_string());
    }
    if let (Some(min), Some(max)) = (min_guests, max_guests) {
        if min > max {
            return Err("Minimum guests cannot exceed maximum guests".to_string());
        }
    }
    Ok(())
}

impl CreateBookingOptionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !is_locale_map(&self.name) {
            return Err("Name must map locales to text, e.g. {\"en\": \"Breakfast\"}".to_string());
        }
        if !self.description.is_object() {
            return Err("Description must map locales to text".to_string());
        }
        if self.price_per_unit_cents <= 0 {
            return Err("Price must be positive".to_string());
        }
        validate_bounds(
            Some(self.min_quantity),
            self.max_quantity,
            self.min_guests,
            self.max_guests,
            self.min_nights,
        )
    }
}

/// Request body for `PATCH /api/v1/booking-options/{id}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateBookingOptionRequest {
    pub name: Option<serde_json::Value>,
    pub description: Option<serde_json::Value>,
    pub category: Option<OptionCategory>,
    pub pricing_type: Option<OptionPricingType>,
    pub price_per_unit_cents: Option<i64>,
    pub pricing_period: Option<OptionPricingPeriod>,
    pub is_mandatory: Option<bool>,
    pub min_quantity: Option<i32>,
    pub max_quantity: Option<i32>,
    pub min_guests: Option<i32>,
    pub max_guests: Option<i32>,
    pub min_nights: Option<i32>,
    pub is_active: Option<bool>,
    pub position: Option<i32>,
}

impl UpdateBookingOptionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_ref().is_some_and(|n| !is_locale_map(n)) {
            return Err("Name must map locales to text".to_string());
        }
        if self.description.as_ref().is_some_and(|d| !d.is_object()) {
            return Err("Description must map locales to text".to_string());
        }
        if self.price_per_unit_cents.is_some_and(|p| p <= 0) {
            return Err("Price must be positive".to_string());
        }
        validate_bounds(
            self.min_quantity,
            self.max_quantity,
            self.min_guests,
            self.max_guests,
            self.min_nights,
        )
    }
}

/// Body of `PUT /api/v1/properties/{id}/booking-options/{option_id}`.
#[derive(Debug, Deserialize)]
pub struct PropertyOptionRequest {
    pub custom_price_cents: Option<i64>,
    pub custom_min_quantity: Option<i32>,
    pub custom_max_quantity: Option<i32>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl PropertyOptionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.custom_price_cents.is_some_and(|p| p <= 0) {
            return Err("Price must be positive".to_string());
        }
        validate_bounds(
            self.custom_min_quantity,
            self.custom_max_quantity,
            None,
            None,
            None,
        )
    }
}

/// An option picked by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SelectedOption {
    pub option_id: Uuid,
    pub quantity: i32,
}

/// Check a guest's picks: each option once, quantities in range.
pub fn validate_selection(selected: &[SelectedOption]) -> Result<(), String> {
    for (i, pick) in selected.iter().enumerate() {
        if !(1..=MAX_OPTION_QUANTITY).contains(&pick.quantity) {
            return Err(format!(
                "Option quantity must be between 1 and {MAX_OPTION_QUANTITY}"
            ));
        }
        if selected[..i].iter().any(|p| p.option_id == pick.option_id) {
            return Err("Each option can only be selected once".to_string());
        }
    }
    Ok(())
}

/// A priced option line of a quote or booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionLine {
    pub option_id: Uuid,
    pub name: serde_json::Value,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateBookingOptionRequest {
        serde_json::from_value(serde_json::json!({
            "name": { "fr": "Petit-déjeuner", "en": "Breakfast" },
            "category": "CATERING",
            "pricing_type": "PER_PERSON",
            "price_per_unit_cents": 1500,
            "pricing_period": "PER_DAY"
        }))
        .unwrap()
    }

    #[test]
    fn defaults_make_an_active_optional_extra() {
        let req = request();
        assert!(req.validate().is_ok());
        assert!(req.is_active);
        assert!(!req.is_mandatory);
        assert_eq!(req.min_quantity, 0);
        assert_eq!(req.description, serde_json::json!({}));
    }

    #[test]
    fn name_must_be_a_locale_map() {
        let mut req = request();
        req.name = serde_json::json!("Breakfast");
        assert!(req.validate().is_err());
        req.name = serde_json::json!({ "en": "" });
        assert!(req.validate().is_err());
        req.name = serde_json::json!({ "en": 3 });
        assert!(req.validate().is_err());
    }

    #[test]
    fn quantity_and_guest_bounds_must_be_ordered() {
        let mut req = request();
        req.min_quantity = 3;
        req.max_quantity = Some(2);
        assert!(req.validate().is_err());

        let mut req = request();
        req.min_guests = Some(6);
        req.max_guests = Some(4);
        assert!(req.validate().is_err());
    }

    #[test]
    fn selections_are_unique_and_bounded() {
        let id = Uuid::new_v4();
        let one = SelectedOption { option_id: id, quantity: 1 };
        assert!(validate_selection(&[one]).is_ok());
        assert!(validate_selection(&[one, one]).is_err());
        assert!(validate_selection(&[SelectedOption { option_id: id, quantity: 0 }]).is_err());
        assert!(
            validate_selection(&[SelectedOption {
                option_id: id,
                quantity: MAX_OPTION_QUANTITY + 1
            }])
            .is_err()
        );
    }
}
