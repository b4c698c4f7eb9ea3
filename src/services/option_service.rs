//! Booking options: tenant catalog, per-property settings and pricing of
//! the options picked for a stay.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::booking_option::{
        BookingOption, CreateBookingOptionRequest, OptionLine, OptionPricingPeriod,
        OptionPricingType, PropertyBookingOption, PropertyOptionRequest, PropertyOptionSettings,
        SelectedOption, UpdateBookingOptionRequest,
    },
    services::property_service,
};

/// An option as offered on one property, overrides applied.
#[derive(Debug, Clone)]
pub struct OfferedOption {
    pub option: BookingOption,
    pub unit_price_cents: i64,
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
}

impl OfferedOption {
    /// `None` when the option is inactive or disabled on the property.
    pub fn new(option: BookingOption, settings: Option<&PropertyOptionSettings>) -> Option<Self> {
        if !option.is_active || settings.is_some_and(|s| !s.is_enabled) {
            return None;
        }
        Some(Self {
            unit_price_cents: settings
                .and_then(|s| s.custom_price_cents)
                .unwrap_or(option.price_per_unit_cents),
            min_quantity: settings
                .and_then(|s| s.custom_min_quantity)
                .unwrap_or(option.min_quantity),
            max_quantity: settings
                .and_then(|s| s.custom_max_quantity)
                .or(option.max_quantity),
            option,
        })
    }

    /// Whether the option can be added to a stay of this size.
    pub fn fits(&self, guests: i32, nights: i32) -> bool {
        let o = &self.option;
        o.min_guests.is_none_or(|min| guests >= min)
            && o.max_guests.is_none_or(|max| guests <= max)
            && o.min_nights.is_none_or(|min| nights >= min)
    }
}

/// English name when there is one, else any.
pub fn display_name(name: &serde_json::Value) -> String {
    let Some(map) = name.as_object() else {
        return String::new();
    };
    map.get("en")
        .or_else(|| map.values().next())
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// `unit × guests (per person) × quantity × nights (per day)`, `None` on overflow.
pub fn option_total(
    pricing_type: OptionPricingType,
    pricing_period: OptionPricingPeriod,
    unit_price_cents: i64,
    quantity: i32,
    guests: i32,
    nights: i32,
) -> Option<i64> {
    let mut total = unit_price_cents.checked_mul(i64::from(quantity))?;
    if pricing_type == OptionPricingType::PerPerson {
        total = total.checked_mul(i64::from(guests))?;
    }
    if pricing_period == OptionPricingPeriod::PerDay {
        total = total.checked_mul(i64::from(nights))?;
    }
    Some(total)
}

/// Price the options of a stay.
///
/// Picked options must be offered, fit the stay and respect the quantity
/// bounds. Mandatory options that fit are added when not picked.
/// Lines follow the order of `offers`.
pub fn price_selection(
    offers: &[OfferedOption],
    selected: &[SelectedOption],
    guests: i32,
    nights: i32,
) -> Result<Vec<OptionLine>, String> {
    if let Some(unknown) = selected
        .iter()
        .find(|pick| !offers.iter().any(|o| o.option.id == pick.option_id))
    {
        return Err(format!(
            "Option {} is not offered on this property",
            unknown.option_id
        ));
    }

    let mut lines = Vec::new();
    for offer in offers {
        let pick = selected.iter().find(|p| p.option_id == offer.option.id);
        let name = display_name(&offer.option.name);
        let quantity = match pick {
            Some(pick) => {
                if !offer.fits(guests, nights) {
                    return Err(format!("{name} is not available for this stay"));
                }
                if pick.quantity < offer.min_quantity
                    || offer.max_quantity.is_some_and(|max| pick.quantity > max)
                {
                    return Err(format!("Invalid quantity for {name}"));
                }
                pick.quantity
            }
            None if offer.option.is_mandatory && offer.fits(guests, nights) => {
                offer.min_quantity.max(1)
            }
            None => continue,
        };

        let total = option_total(
            offer.option.pricing_type,
            offer.option.pricing_period,
            offer.unit_price_cents,
            quantity,
            guests,
            nights,
        )
        .ok_or_else(|| format!("Price of {name} is out of range"))?;

        lines.push(OptionLine {
            option_id: offer.option.id,
            name: offer.option.name.clone(),
            quantity,
            unit_price_cents: offer.unit_price_cents,
            total_cents: total,
        });
    }
    Ok(lines)
}

pub async fn list(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<BookingOption>, AppError> {
    let options = sqlx::query_as::<_, BookingOption>(
        "SELECT * FROM booking_options WHERE tenant_id = $1 ORDER BY position, created_at",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(options)
}

pub async fn get(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    option_id: Uuid,
) -> Result<BookingOption, AppError> {
    sqlx::query_as::<_, BookingOption>(
        "SELECT * FROM booking_options WHERE id = $1 AND tenant_id = $2",
    )
    .bind(option_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::BookingOptionNotFound)
}

pub async fn create(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: CreateBookingOptionRequest,
) -> Result<BookingOption, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let option = sqlx::query_as::<_, BookingOption>(
        r#"
        INSERT INTO booking_options (
            tenant_id, name, description, category, pricing_type, price_per_unit_cents,
            pricing_period, is_mandatory, min_quantity, max_quantity, min_guests,
            max_guests, min_nights, is_active, position
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(&request.name)
    .bind(&request.description)
    .bind(request.category)
    .bind(request.pricing_type)
    .bind(request.price_per_unit_cents)
    .bind(request.pricing_period)
    .bind(request.is_mandatory)
    .bind(request.min_quantity)
    .bind(request.max_quantity)
    .bind(request.min_guests)
    .bind(request.max_guests)
    .bind(request.min_nights)
    .bind(request.is_active)
    .bind(request.position)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(%tenant_id, option_id = %option.id, "Booking option created");
    Ok(option)
}

pub async fn update(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    option_id: Uuid,
    request: UpdateBookingOptionRequest,
) -> Result<BookingOption, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let current = get(conn, tenant_id, option_id).await?;

    let min_quantity = request.min_quantity.unwrap_or(current.min_quantity);
    if request
        .max_quantity
        .or(current.max_quantity)
        .is_some_and(|max| min_quantity > max)
    {
        return Err(AppError::InvalidRequest(
            "Minimum quantity cannot exceed maximum quantity".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (
        request.min_guests.or(current.min_guests),
        request.max_guests.or(current.max_guests),
    ) {
        if min > max {
            return Err(AppError::InvalidRequest(
                "Minimum guests cannot exceed maximum guests".to_string(),
            ));
        }
    }

    let option = sqlx::query_as::<_, BookingOption>(
        r#"
        UPDATE booking_options SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            category = COALESCE($5, category),
            pricing_type = COALESCE($6, pricing_type),
            price_per_unit_cents = COALESCE($7, price_per_unit_cents),
            pricing_period = COALESCE($8, pricing_period),
            is_mandatory = COALESCE($9, is_mandatory),
            min_quantity = COALESCE($10, min_quantity),
            max_quantity = COALESCE($11, max_quantity),
            min_guests = COALESCE($12, min_guests),
            max_guests = COALESCE($13, max_guests),
            min_nights = COALESCE($14, min_nights),
            is_active = COALESCE($15, is_active),
            position = COALESCE($16, position),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(option_id)
    .bind(tenant_id)
    .bind(request.name)
    .bind(request.description)
    .bind(request.category)
    .bind(request.pricing_type)
    .bind(request.price_per_unit_cents)
    .bind(request.pricing_period)
    .bind(request.is_mandatory)
    .bind(request.min_quantity)
    .bind(request.max_quantity)
    .bind(request.min_guests)
    .bind(request.max_guests)
    .bind(request.min_nights)
    .bind(request.is_active)
    .bind(request.position)
    .fetch_one(&mut *conn)
    .await?;

    Ok(option)
}

/// Delete an option no booking has used. Used ones can be deactivated instead.
pub async fn delete(conn: &mut PgConnection, tenant_id: Uuid, option_id: Uuid) -> Result<(), AppError> {
    get(conn, tenant_id, option_id).await?;

    let used: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM booking_selected_options WHERE option_id = $1)",
    )
    .bind(option_id)
    .fetch_one(&mut *conn)
    .await?;
    if used {
        return Err(AppError::Conflict(
            "Cannot delete an option used in bookings, deactivate it instead".to_string(),
        ));
    }

    sqlx::query("DELETE FROM booking_options WHERE id = $1 AND tenant_id = $2")
        .bind(option_id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn property_settings(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> Result<Vec<PropertyOptionSettings>, AppError> {
    let settings = sqlx::query_as::<_, PropertyOptionSettings>(
        "SELECT * FROM property_booking_options WHERE property_id = $1",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(settings)
}

async fn active_options(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<Vec<BookingOption>, AppError> {
    let options = sqlx::query_as::<_, BookingOption>(
        r#"
        SELECT * FROM booking_options
        WHERE tenant_id = $1 AND is_active = true
        ORDER BY position, created_at
        "#,
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(options)
}

/// Active options of the tenant with the property's settings, if any.
pub async fn property_options(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<Vec<PropertyBookingOption>, AppError> {
    property_service::get_property(conn, tenant_id, property_id).await?;
    let options = active_options(conn, tenant_id).await?;
    let mut settings = property_settings(conn, property_id).await?;

    Ok(options
        .into_iter()
        .map(|option| {
            let own = settings
                .iter()
                .position(|s| s.option_id == option.id)
                .map(|i| settings.swap_remove(i));
            PropertyBookingOption {
                option,
                settings: own,
            }
        })
        .collect())
}

/// Options a property offers, in catalog order.
pub async fn offers_for_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<Vec<OfferedOption>, AppError> {
    let options = active_options(conn, tenant_id).await?;
    if options.is_empty() {
        return Ok(Vec::new());
    }
    let settings = property_settings(conn, property_id).await?;

    Ok(options
        .into_iter()
        .filter_map(|option| {
            let own = settings.iter().find(|s| s.option_id == option.id);
            OfferedOption::new(option, own)
        })
        .collect())
}

/// Create or replace a property's settings for an option.
pub async fn set_property_option(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
    option_id: Uuid,
    request: PropertyOptionRequest,
) -> Result<PropertyOptionSettings, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    property_service::get_property(conn, tenant_id, property_id).await?;
    get(conn, tenant_id, option_id).await?;

    let settings = sqlx::query_as::<_, PropertyOptionSettings>(
        r#"
        INSERT INTO property_booking_options (
            property_id, option_id, custom_price_cents, custom_min_quantity,
            custom_max_quantity, is_enabled
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (property_id, option_id) DO UPDATE SET
            custom_price_cents = EXCLUDED.custom_price_cents,
            custom_min_quantity = EXCLUDED.custom_min_quantity,
            custom_max_quantity = EXCLUDED.custom_max_quantity,
            is_enabled = EXCLUDED.is_enabled
        RETURNING *
        "#,
    )
    .bind(property_id)
    .bind(option_id)
    .bind(request.custom_price_cents)
    .bind(request.custom_min_quantity)
    .bind(request.custom_max_quantity)
    .bind(request.is_enabled)
    .fetch_one(&mut *conn)
    .await?;

    Ok(settings)
}

/// Stop offering an option on a property, keeping its overrides.
pub async fn disable_property_option(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
    option_id: Uuid,
) -> Result<(), AppError> {
    property_service::get_property(conn, tenant_id, property_id).await?;
    get(conn, tenant_id, option_id).await?;

    sqlx::query(
        r#"
        INSERT INTO property_booking_options (property_id, option_id, is_enabled)
        VALUES ($1, $2, false)
        ON CONFLICT (property_id, option_id) DO UPDATE SET is_enabled = false
        "#,
    )
    .bind(property_id)
    .bind(option_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Store the option lines of a new booking.
pub async fn record_selection(
    conn: &mut PgConnection,
    booking_id: Uuid,
    lines: &[OptionLine],
) -> Result<(), AppError> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO booking_selected_options (
                booking_id, option_id, quantity, unit_price_cents, total_cents
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking_id)
        .bind(line.option_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.total_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking_option::OptionCategory;
    use chrono::Utc;

    fn option(pricing_type: OptionPricingType, period: OptionPricingPeriod, price: i64) -> BookingOption {
        let now = Utc::now();
        BookingOption {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: serde_json::json!({ "fr": "Petit-déjeuner", "en": "Breakfast" }),
            description: serde_json::json!({}),
            category: OptionCategory::Catering,
            pricing_type,
            price_per_unit_cents: price,
            pricing_period: period,
            is_mandatory: false,
            min_quantity: 0,
            max_quantity: None,
            min_guests: None,
            max_guests: None,
            min_nights: None,
            is_active: true,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn offer(option: BookingOption) -> OfferedOption {
        OfferedOption::new(option, None).unwrap()
    }

    fn pick(offer: &OfferedOption, quantity: i32) -> SelectedOption {
        SelectedOption {
            option_id: offer.option.id,
            quantity,
        }
    }

    #[test]
    fn price_scales_with_guests_quantity_and_nights() {
        use OptionPricingPeriod::*;
        use OptionPricingType::*;
        assert_eq!(option_total(PerPerson, PerDay, 1_500, 1, 4, 7), Some(42_000));
        assert_eq!(option_total(PerPerson, PerStay, 1_500, 2, 4, 7), Some(12_000));
        assert_eq!(option_total(PerGroup, PerDay, 3_000, 1, 4, 3), Some(9_000));
        assert_eq!(option_total(Fixed, PerStay, 8_000, 1, 4, 7), Some(8_000));
        assert_eq!(option_total(PerPerson, PerDay, i64::MAX / 2, 2, 4, 7), None);
    }

    #[test]
    fn overrides_replace_price_and_quantities() {
        let base = option(OptionPricingType::Fixed, OptionPricingPeriod::PerStay, 5_000);
        let settings = PropertyOptionSettings {
            property_id: Uuid::new_v4(),
            option_id: base.id,
            custom_price_cents: Some(6_500),
            custom_min_quantity: None,
            custom_max_quantity: Some(2),
            is_enabled: true,
        };
        let offered = OfferedOption::new(base.clone(), Some(&settings)).unwrap();
        assert_eq!(offered.unit_price_cents, 6_500);
        assert_eq!(offered.max_quantity, Some(2));

        let disabled = PropertyOptionSettings {
            is_enabled: false,
            ..settings
        };
        assert!(OfferedOption::new(base.clone(), Some(&disabled)).is_none());

        let mut inactive = base;
        inactive.is_active = false;
        assert!(OfferedOption::new(inactive, None).is_none());
    }

    #[test]
    fn mandatory_options_are_added_and_picks_priced() {
        let mut cleaning = option(OptionPricingType::Fixed, OptionPricingPeriod::PerStay, 8_000);
        cleaning.is_mandatory = true;
        let cleaning = offer(cleaning);
        let breakfast = offer(option(
            OptionPricingType::PerPerson,
            OptionPricingPeriod::PerDay,
            1_500,
        ));
        let offers = vec![cleaning.clone(), breakfast.clone()];

        let lines = price_selection(&offers, &[pick(&breakfast, 1)], 2, 3).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].option_id, cleaning.option.id);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].total_cents, 8_000);
        assert_eq!(lines[1].total_cents, 9_000);

        let only_mandatory = price_selection(&offers, &[], 2, 3).unwrap();
        assert_eq!(only_mandatory.len(), 1);
    }

    #[test]
    fn picks_must_be_offered_and_fit_the_stay() {
        let mut spa = option(OptionPricingType::PerGroup, OptionPricingPeriod::PerStay, 20_000);
        spa.min_nights = Some(5);
        spa.max_quantity = Some(1);
        let spa = offer(spa);
        let offers = vec![spa.clone()];

        let stranger = SelectedOption {
            option_id: Uuid::new_v4(),
            quantity: 1,
        };
        assert!(price_selection(&offers, &[stranger], 2, 7).is_err());
        assert!(price_selection(&offers, &[pick(&spa, 1)], 2, 4).is_err());
        assert!(price_selection(&offers, &[pick(&spa, 2)], 2, 7).is_err());
        assert!(price_selection(&offers, &[pick(&spa, 1)], 2, 7).is_ok());
    }

    #[test]
    fn mandatory_options_that_do_not_fit_are_skipped() {
        let mut shuttle = option(OptionPricingType::Fixed, OptionPricingPeriod::PerStay, 4_000);
        shuttle.is_mandatory = true;
        shuttle.min_guests = Some(6);
        let lines = price_selection(&[offer(shuttle)], &[], 2, 3).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn english_name_is_preferred() {
        assert_eq!(display_name(&serde_json::json!({ "fr": "Ménage", "en": "Cleaning" })), "Cleaning");
        assert_eq!(display_name(&serde_json::json!({ "fr": "Ménage" })), "Ménage");
        assert_eq!(display_name(&serde_json::json!(null)), "");
    }
}
