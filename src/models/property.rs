//! Property data models and API request/response types.
//!
//! This module defines:
//! - `Property`: a rentable unit owned by a tenant
//! - `PropertyImage`: image URLs attached to a property (storage is external)
//! - request bodies for the admin CRUD endpoints
//!
//! All money fields are stored in cents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    booking::{Pagination, SortOrder},
    period::Period,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Studio,
    Loft,
    Chalet,
    Bungalow,
    MobileHome,
    Boat,
    Other,
}

/// Only `Published` properties are visible on public sites and bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Draft,
    Published,
    Archived,
}

/// Represents a property record from the database.
///
/// # Pricing fields
///
/// - `base_price_cents`: nightly price when no period applies
/// - `weekend_premium_cents`: added on Friday and Saturday nights
/// - `tourist_tax_cents`: charged per guest per night
/// - `min_nights`: minimum stay when no period overrides it
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Property {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub name: String,

    /// URL-safe identifier, unique per tenant
    pub slug: String,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub max_guests: i32,

    /// Localised descriptions keyed by locale (`{"fr": "...", "en": "..."}`)
    pub description: serde_json::Value,
    pub base_price_cents: i64,
    pub weekend_premium_cents: i64,
    pub cleaning_fee_cents: i64,
    pub security_deposit_cents: i64,
    pub tourist_tax_cents: i64,
    pub min_nights: i32,
    pub check_in_time: String,
    pub check_out_time: String,

    /// Public bookings are confirmed immediately instead of staying pending
    pub instant_booking: bool,
    pub pets_allowed: bool,

    /// Single-property site routing (optional)
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PropertyImage {
    pub id: Uuid,
    pub property_id: Uuid,
    pub url: String,
    pub alt: Option<String>,
    pub position: i32,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new property.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Villa Les Pins",
///   "property_type": "VILLA",
///   "address": "12 chemin des Pins",
///   "city": "Antibes",
///   "postal_code": "06600",
///   "bedrooms": 4,
///   "bathrooms": 2,
///   "max_guests": 8,
///   "description": { "fr": "Vue mer", "en": "Sea view" },
///   "base_price_cents": 25000,
///   "weekend_premium_cents": 5000,
///   "cleaning_fee_cents": 12000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    pub property_type: PropertyType,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub max_guests: i32,
    #[serde(default = "empty_object")]
    pub description: serde_json::Value,
    pub base_price_cents: i64,
    #[serde(default)]
    pub weekend_premium_cents: i64,
    #[serde(default)]
    pub cleaning_fee_cents: i64,
    #[serde(default)]
    pub security_deposit_cents: i64,
    #[serde(default = "default_tourist_tax")]
    pub tourist_tax_cents: i64,
    #[serde(default = "default_min_nights")]
    pub min_nights: i32,
    #[serde(default = "default_check_in_time")]
    pub check_in_time: String,
    #[serde(default = "default_check_out_time")]
    pub check_out_time: String,
    #[serde(default)]
    pub instant_booking: bool,
    #[serde(default)]
    pub pets_allowed: bool,
}

fn default_country() -> String {
    "FR".to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

fn default_tourist_tax() -> i64 {
    100
}

fn default_min_nights() -> i32 {
    1
}

fn default_check_in_time() -> String {
    "16:00".to_string()
}

fn default_check_out_time() -> String {
    "11:00".to_string()
}

impl CreatePropertyRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.name.len() > 100 {
            return Err("Name must be between 1 and 100 characters".to_string());
        }
        if self.address.trim().is_empty()
            || self.city.trim().is_empty()
            || self.postal_code.trim().is_empty()
        {
            return Err("Address, city and postal code are required".to_string());
        }
        if self.country.len() != 2 {
            return Err("Country must be a 2-letter ISO code".to_string());
        }
        validate_counts(Some(self.bedrooms), Some(self.bathrooms), Some(self.max_guests))?;
        validate_prices(
            Some(self.base_price_cents),
            Some(self.weekend_premium_cents),
            Some(self.cleaning_fee_cents),
            Some(self.security_deposit_cents),
            Some(self.tourist_tax_cents),
        )?;
        if self.min_nights < 1 {
            return Err("Minimum nights must be at least 1".to_string());
        }
        if !is_clock_time(&self.check_in_time) || !is_clock_time(&self.check_out_time) {
            return Err("Check-in and check-out times must use HH:MM".to_string());
        }
        Ok(())
    }
}

/// Request body for `PATCH /api/v1/properties/{id}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdatePropertyRequest {
    pub name: Option<String>,
    pub property_type: Option<PropertyType>,
    pub status: Option<PropertyStatus>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_guests: Option<i32>,
    pub description: Option<serde_json::Value>,
    pub base_price_cents: Option<i64>,
    pub weekend_premium_cents: Option<i64>,
    pub cleaning_fee_cents: Option<i64>,
    pub security_deposit_cents: Option<i64>,
    pub tourist_tax_cents: Option<i64>,
    pub min_nights: Option<i32>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub instant_booking: Option<bool>,
    pub pets_allowed: Option<bool>,
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
}

impl UpdatePropertyRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.len() > 100 {
                return Err("Name must be between 1 and 100 characters".to_string());
            }
        }
        validate_counts(self.bedrooms, self.bathrooms, self.max_guests)?;
        validate_prices(
            self.base_price_cents,
            self.weekend_premium_cents,
            self.cleaning_fee_cents,
            self.security_deposit_cents,
            self.tourist_tax_cents,
        )?;
        if matches!(self.min_nights, Some(n) if n < 1) {
            return Err("Minimum nights must be at least 1".to_string());
        }
        for time in [&self.check_in_time, &self.check_out_time].into_iter().flatten() {
            if !is_clock_time(time) {
                return Err("Check-in and check-out times must use HH:MM".to_string());
            }
        }
        Ok(())
    }
}

fn validate_counts(
    bedrooms: Option<i32>,
    bathrooms: Option<i32>,
    max_guests: Option<i32>,
) -> Result<(), String> {
    if bedrooms.is_some_and(|n| n < 0) || bathrooms.is_some_and(|n| n < 0) {
        return Err("Bedrooms and bathrooms cannot be negative".to_string());
    }
    if max_guests.is_some_and(|n| n < 1) {
        return Err("A property must accept at least one guest".to_string());
    }
    Ok(())
}

fn validate_prices(
    base: Option<i64>,
    weekend_premium: Option<i64>,
    cleaning_fee: Option<i64>,
    deposit: Option<i64>,
    tourist_tax: Option<i64>,
) -> Result<(), String> {
    if base.is_some_and(|p| p <= 0) {
        return Err("Base price must be positive".to_string());
    }
    if [weekend_premium, cleaning_fee, deposit, tourist_tax]
        .into_iter()
        .flatten()
        .any(|amount| amount < 0)
    {
        return Err("Fees and premiums cannot be negative".to_string());
    }
    Ok(())
}

/// `HH:MM`, 24-hour clock.
fn is_clock_time(value: &str) -> bool {
    chrono::NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

/// Request body for `POST /api/v1/properties/{id}/images`.
#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    pub url: String,
    pub alt: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub is_primary: bool,
}

/// Property with its images and the pricing periods that still matter.
#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub periods: Vec<Period>,
}

/// Row returned by the public property search.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PublicPropertySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub property_type: PropertyType,
    pub city: String,
    pub country: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub max_guests: i32,
    pub description: serde_json::Value,
    pub base_price_cents: i64,
    pub min_nights: i32,
    pub instant_booking: bool,
    pub primary_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicSortField {
    BasePrice,
    #[default]
    CreatedAt,
    Name,
}

impl PublicSortField {
    pub fn column(self) -> &'static str {
        match self {
            PublicSortField::BasePrice => "p.base_price_cents",
            PublicSortField::CreatedAt => "p.created_at",
            PublicSortField::Name => "p.name",
        }
    }
}

/// `GET /api/public/properties` query string.
///
/// `property_type` is a comma-separated list (`VILLA,HOUSE`). When both
/// `check_in` and `check_out` are given, only properties free on those
/// nights are returned.
#[derive(Debug, Deserialize)]
pub struct PublicPropertyQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_public_limit")]
    pub limit: i64,
    pub search: Option<String>,
    pub city: Option<String>,
    pub guests: Option<i32>,
    pub property_type: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub bedrooms: Option<i32>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    #[serde(default)]
    pub sort_by: PublicSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_page() -> i64 {
    1
}

fn default_public_limit() -> i64 {
    12
}

impl PublicPropertyQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("Page must be at least 1".to_string());
        }
        if !(1..=50).contains(&self.limit) {
            return Err("Limit must be between 1 and 50".to_string());
        }
        if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
            if check_in >= check_out {
                return Err("Check-out must be after check-in".to_string());
            }
        }
        Ok(())
    }

    /// Parsed `property_type` list; unknown names are an error.
    pub fn property_types(&self) -> Result<Vec<PropertyType>, String> {
        let Some(raw) = self.property_type.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                serde_json::from_value(serde_json::Value::String(name.to_ascii_uppercase()))
                    .map_err(|_| format!("Unknown property type: {name}"))
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct PublicPropertyList {
    pub properties: Vec<PublicPropertySummary>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreatePropertyRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Villa Les Pins",
            "property_type": "VILLA",
            "address": "12 chemin des Pins",
            "city": "Antibes",
            "postal_code": "06600",
            "bedrooms": 4,
            "bathrooms": 2,
            "max_guests": 8,
            "base_price_cents": 25000
        }))
        .unwrap()
    }

    #[test]
    fn create_request_applies_defaults() {
        let request = create_request();
        assert_eq!(request.country, "FR");
        assert_eq!(request.min_nights, 1);
        assert_eq!(request.tourist_tax_cents, 100);
        assert_eq!(request.check_in_time, "16:00");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn create_request_rejects_zero_base_price() {
        let request = CreatePropertyRequest {
            base_price_cents: 0,
            ..create_request()
        };
        assert_eq!(
            request.validate().unwrap_err(),
            "Base price must be positive"
        );
    }

    #[test]
    fn update_request_rejects_bad_clock_time() {
        let request: UpdatePropertyRequest =
            serde_json::from_value(serde_json::json!({ "check_in_time": "4pm" })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn public_query_parses_type_list() {
        let query: PublicPropertyQuery = serde_json::from_value(serde_json::json!({
            "property_type": "villa, MOBILE_HOME"
        }))
        .unwrap();
        assert_eq!(query.limit, 12);
        assert_eq!(
            query.property_types().unwrap(),
            vec![PropertyType::Villa, PropertyType::MobileHome]
        );
    }

    #[test]
    fn public_query_rejects_unknown_type_and_big_pages() {
        let query: PublicPropertyQuery = serde_json::from_value(serde_json::json!({
            "property_type": "castle",
            "limit": 80
        }))
        .unwrap();
        assert!(query.property_types().is_err());
        assert!(query.validate().is_err());
    }

    #[test]
    fn property_type_uses_screaming_snake_case() {
        let value = serde_json::to_value(PropertyType::MobileHome).unwrap();
        assert_eq!(value, "MOBILE_HOME");
    }
}
