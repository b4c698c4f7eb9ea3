//! Stay pricing.
//!
//! Pure computation over a property's pricing basis and the periods that
//! overlap the stay. Loading those rows is done by the callers
//! (see [`load_periods`]), so the arithmetic can be tested without a database.
//!
//! # Rules
//!
//! - Each night `d` in `[check_in, check_out)` is priced by the period that
//!   applies on `d`, or by the property when none does.
//! - Friday and Saturday nights carry the weekend premium.
//! - Minimum stay comes from the period applying on the check-in night.
//! - Stays of 7+ nights get 5% off accommodation, 28+ nights 10%.
//! - Tourist tax is charged per guest (infants excluded) per night.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        booking::{MAX_STAY_NIGHTS, stay_nights},
        booking_option::OptionLine,
        period::Period,
        property::Property,
    },
};

/// Flat fee per pet and per stay, when the property accepts pets.
pub const PET_FEE_CENTS: i64 = 2_000;

const WEEKLY_DISCOUNT_BPS: i64 = 500;
const MONTHLY_DISCOUNT_BPS: i64 = 1_000;

/// The property fields pricing depends on.
#[derive(Debug, Clone)]
pub struct PriceBasis {
    pub property_id: Uuid,
    pub base_price_cents: i64,
    pub weekend_premium_cents: i64,
    pub cleaning_fee_cents: i64,
    pub security_deposit_cents: i64,
    pub tourist_tax_cents: i64,
    pub min_nights: i32,
    pub max_guests: i32,
    pub pets_allowed: bool,
}

impl From<&Property> for PriceBasis {
    fn from(p: &Property) -> Self {
        Self {
            property_id: p.id,
            base_price_cents: p.base_price_cents,
            weekend_premium_cents: p.weekend_premium_cents,
            cleaning_fee_cents: p.cleaning_fee_cents,
            security_deposit_cents: p.security_deposit_cents,
            tourist_tax_cents: p.tourist_tax_cents,
            min_nights: p.min_nights,
            max_guests: p.max_guests,
            pets_allowed: p.pets_allowed,
        }
    }
}

/// What is being priced.
#[derive(Debug, Clone, Copy)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Adults and children
    pub guests: i32,
    pub pets: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NightlyRate {
    pub date: NaiveDate,
    pub base_price_cents: i64,
    pub weekend_premium_cents: i64,
    pub final_price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtraFee {
    pub name: String,
    pub amount_cents: i64,
}

/// Full price breakdown of a stay.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub nights: i32,
    /// The property's own nightly price, for reference
    pub base_price_cents: i64,
    pub accommodation_cents: i64,
    pub weekend_premium_cents: i64,
    /// `accommodation - base price * nights`; positive in high season
    pub seasonal_adjustment_cents: i64,
    pub long_stay_discount_cents: i64,
    pub cleaning_fee_cents: i64,
    pub extra_fees: Vec<ExtraFee>,
    pub extra_fees_cents: i64,
    pub options: Vec<OptionLine>,
    pub options_cents: i64,
    pub tourist_tax_cents: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub average_price_per_night_cents: i64,
    /// Refundable, not part of the total
    pub security_deposit_cents: i64,
    pub min_nights: i32,
    pub breakdown: Vec<NightlyRate>,
}

/// Period that prices `date`, if any.
///
/// Precedence among active periods containing the date: property-specific
/// before tenant-wide, then higher `priority`, then the latest `start_date`.
pub fn applicable_period(periods: &[Period], date: NaiveDate) -> Option<&Period> {
    periods
        .iter()
        .filter(|p| p.is_active && p.contains(date))
        .max_by_key(|p| (p.property_id.is_some(), p.priority, p.start_date))
}

/// Friday and Saturday nights.
pub fn is_weekend_night(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat)
}

/// `amount * bps / 10_000`, rounded half up. `amount` must be non-negative.
pub fn apply_bps(amount: i64, bps: i64) -> i64 {
    (amount * bps + 5_000) / 10_000
}

/// Long-stay discount rate for a number of nights, in basis points.
pub fn long_stay_discount_bps(nights: i32) -> i64 {
    match nights {
        n if n >= 28 => MONTHLY_DISCOUNT_BPS,
        n if n >= 7 => WEEKLY_DISCOUNT_BPS,
        _ => 0,
    }
}

/// Price and minimum stay for a single night.
pub fn nightly_rate(basis: &PriceBasis, periods: &[Period], date: NaiveDate) -> (NightlyRate, i32) {
    let period = applicable_period(periods, date);
    let base = period.map_or(basis.base_price_cents, |p| p.base_price_cents);
    let premium_rate = match period {
        Some(p) if p.weekend_premium_cents > 0 => p.weekend_premium_cents,
        _ => basis.weekend_premium_cents,
    };
    let premium = if is_weekend_night(date) { premium_rate } else { 0 };
    let min_nights = period.map_or(basis.min_nights, |p| p.min_nights);

    let rate = NightlyRate {
        date,
        base_price_cents: base,
        weekend_premium_cents: premium,
        final_price_cents: base + premium,
        period_name: period.map(|p| p.name.clone()),
    };
    (rate, min_nights)
}

/// Minimum stay for a stay starting on `check_in`.
pub fn required_min_nights(basis: &PriceBasis, periods: &[Period], check_in: NaiveDate) -> i32 {
    applicable_period(periods, check_in).map_or(basis.min_nights, |p| p.min_nights)
}

/// Price a stay.
///
/// # Errors
///
/// `InvalidRequest` when the dates are reversed or equal, when the stay
/// exceeds [`MAX_STAY_NIGHTS`], when there are
/// more guests than the property sleeps, or when the stay is shorter than
/// the minimum stay.
pub fn quote(basis: &PriceBasis, periods: &[Period], stay: &Stay) -> Result<Quote, AppError> {
    let nights = stay_nights(stay.check_in, stay.check_out).map_err(AppError::InvalidRequest)?;
    let nights = i32::try_from(nights)
        .map_err(|_| AppError::InvalidRequest("Stay is too long".to_string()))?;

    if stay.guests < 1 {
        return Err(AppError::InvalidRequest(
            "At least one guest is required".to_string(),
        ));
    }
    if stay.guests > basis.max_guests {
        return Err(AppError::InvalidRequest(format!(
            "Maximum {} guests allowed",
            basis.max_guests
        )));
    }

    let min_nights = required_min_nights(basis, periods, stay.check_in);
    if nights < min_nights {
        return Err(AppError::InvalidRequest(format!(
            "Minimum stay is {min_nights} nights for these dates"
        )));
    }

    let breakdown: Vec<NightlyRate> = stay
        .check_in
        .iter_days()
        .take_while(|d| *d < stay.check_out)
        .map(|d| nightly_rate(basis, periods, d).0)
        .collect();

    let accommodation: i64 = breakdown.iter().map(|n| n.final_price_cents).sum();
    let weekend_premium: i64 = breakdown.iter().map(|n| n.weekend_premium_cents).sum();
    let long_stay_discount = apply_bps(accommodation, long_stay_discount_bps(nights));

    let mut extra_fees = Vec::new();
    if stay.pets > 0 && basis.pets_allowed {
        extra_fees.push(ExtraFee {
            name: "pets".to_string(),
            amount_cents: i64::from(stay.pets) * PET_FEE_CENTS,
        });
    }
    let extra_fees_cents: i64 = extra_fees.iter().map(|f| f.amount_cents).sum();

    let tourist_tax = i64::from(stay.guests) * i64::from(nights) * basis.tourist_tax_cents;
    let subtotal = accommodation - long_stay_discount + basis.cleaning_fee_cents + extra_fees_cents;
    let total = subtotal + tourist_tax;
    let nights_i64 = i64::from(nights);

    Ok(Quote {
        nights,
        base_price_cents: basis.base_price_cents,
        accommodation_cents: accommodation,
        weekend_premium_cents: weekend_premium,
        seasonal_adjustment_cents: accommodation - basis.base_price_cents * nights_i64,
        long_stay_discount_cents: long_stay_discount,
        cleaning_fee_cents: basis.cleaning_fee_cents,
        extra_fees,
        extra_fees_cents,
        options: Vec::new(),
        options_cents: 0,
        tourist_tax_cents: tourist_tax,
        subtotal_cents: subtotal,
        total_cents: total,
        average_price_per_night_cents: (total + nights_i64 / 2) / nights_i64,
        security_deposit_cents: basis.security_deposit_cents,
        min_nights,
        breakdown,
    })
}

impl Quote {
    /// Add priced booking options to the subtotal and total.
    pub fn add_options(&mut self, lines: Vec<OptionLine>) {
        let amount: i64 = lines.iter().map(|l| l.total_cents).sum();
        let nights = i64::from(self.nights);
        self.options.extend(lines);
        self.options_cents += amount;
        self.subtotal_cents += amount;
        self.total_cents += amount;
        self.average_price_per_night_cents = (self.total_cents + nights / 2) / nights;
    }
}

/// Platform commission and owner payout for a booking total.
pub fn split_commission(total_cents: i64, commission_rate_bps: i64) -> (i64, i64) {
    let commission = apply_bps(total_cents.max(0), commission_rate_bps);
    (commission, total_cents - commission)
}

/// Active periods of `property_id` (and tenant-wide ones) overlapping `[from, to]`.
pub async fn load_periods(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Period>, AppError> {
    let periods = sqlx::query_as::<_, Period>(
        r#"
        SELECT * FROM periods
        WHERE tenant_id = $1
          AND (property_id = $2 OR property_id IS NULL)
          AND is_active = true
          AND start_date <= $4
          AND end_date >= $3
        "#,
    )
    .bind(tenant_id)
    .bind(property_id)
    .bind(from)
    .bind(to)
    .fetch_all(&mut *conn)
    .await?;

    Ok(periods)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn basis() -> PriceBasis {
        PriceBasis {
            property_id: Uuid::nil(),
            base_price_cents: 10_000,
            weekend_premium_cents: 0,
            cleaning_fee_cents: 5_000,
            security_deposit_cents: 20_000,
            tourist_tax_cents: 100,
            min_nights: 1,
            max_guests: 4,
            pets_allowed: false,
        }
    }

    pub(crate) fn period(
        property_id: Option<Uuid>,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
        priority: i32,
        base_price_cents: i64,
    ) -> Period {
        let now = Utc::now();
        Period {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            property_id,
            name: name.to_string(),
            start_date: start,
            end_date: end,
            priority,
            base_price_cents,
            weekend_premium_cents: 0,
            min_nights: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn stay(check_in: NaiveDate, check_out: NaiveDate, guests: i32) -> Stay {
        Stay {
            check_in,
            check_out,
            guests,
            pets: 0,
        }
    }

    #[test]
    fn overlong_stays_are_refused_without_pricing_each_night() {
        let result = quote(&basis(), &[], &stay(date(2025, 1, 1), date(9999, 12, 31), 2));
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));

        let year = quote(&basis(), &[], &stay(date(2025, 1, 1), date(2026, 1, 1), 2)).unwrap();
        assert_eq!(year.breakdown.len(), 365);
    }

    #[test]
    fn prices_a_weekday_stay_at_base_rate() {
        // Monday 15 to Thursday 18 July 2024
        let q = quote(&basis(), &[], &stay(date(2024, 7, 15), date(2024, 7, 18), 2)).unwrap();

        assert_eq!(q.nights, 3);
        assert_eq!(q.accommodation_cents, 30_000);
        assert_eq!(q.cleaning_fee_cents, 5_000);
        assert_eq!(q.tourist_tax_cents, 600);
        assert_eq!(q.subtotal_cents, 35_000);
        assert_eq!(q.total_cents, 35_600);
        assert_eq!(q.seasonal_adjustment_cents, 0);
        assert_eq!(q.breakdown.len(), 3);
        assert_eq!(q.breakdown[0].date, date(2024, 7, 15));
    }

    #[test]
    fn friday_and_saturday_nights_carry_weekend_premium() {
        let basis = PriceBasis {
            weekend_premium_cents: 2_000,
            ..basis()
        };
        // Thursday 18 to Monday 22 July 2024: Thu, Fri, Sat, Sun nights
        let q = quote(&basis, &[], &stay(date(2024, 7, 18), date(2024, 7, 22), 2)).unwrap();

        assert_eq!(q.weekend_premium_cents, 4_000);
        assert_eq!(q.accommodation_cents, 44_000);
        let premiums: Vec<i64> = q.breakdown.iter().map(|n| n.weekend_premium_cents).collect();
        assert_eq!(premiums, vec![0, 2_000, 2_000, 0]);
    }

    #[test]
    fn period_rate_replaces_base_price() {
        let periods = vec![period(
            None,
            "Haute saison",
            date(2024, 7, 1),
            date(2024, 8, 31),
            1,
            15_000,
        )];
        let q = quote(&basis(), &periods, &stay(date(2024, 7, 15), date(2024, 7, 18), 2)).unwrap();

        assert_eq!(q.accommodation_cents, 45_000);
        assert_eq!(q.seasonal_adjustment_cents, 15_000);
        assert_eq!(q.breakdown[0].period_name.as_deref(), Some("Haute saison"));
    }

    #[test]
    fn stay_straddling_a_period_boundary_mixes_rates() {
        let periods = vec![period(
            None,
            "Été",
            date(2024, 7, 1),
            date(2024, 7, 31),
            0,
            15_000,
        )];
        // Nights of 30 and 31 July in season, 1 August off season
        let q = quote(&basis(), &periods, &stay(date(2024, 7, 30), date(2024, 8, 2), 1)).unwrap();
        let prices: Vec<i64> = q.breakdown.iter().map(|n| n.base_price_cents).collect();
        assert_eq!(prices, vec![15_000, 15_000, 10_000]);
    }

    #[test]
    fn property_period_beats_higher_priority_tenant_period() {
        let property_id = Uuid::new_v4();
        let periods = vec![
            period(None, "Global", date(2024, 7, 1), date(2024, 7, 31), 100, 20_000),
            period(
                Some(property_id),
                "Villa",
                date(2024, 7, 1),
                date(2024, 7, 31),
                0,
                12_000,
            ),
        ];
        let chosen = applicable_period(&periods, date(2024, 7, 10)).unwrap();
        assert_eq!(chosen.name, "Villa");
    }

    #[test]
    fn higher_priority_wins_within_scope() {
        let periods = vec![
            period(None, "Été", date(2024, 6, 1), date(2024, 9, 30), 1, 15_000),
            period(None, "15 août", date(2024, 8, 10), date(2024, 8, 20), 5, 25_000),
        ];
        assert_eq!(
            applicable_period(&periods, date(2024, 8, 15)).unwrap().name,
            "15 août"
        );
        assert_eq!(
            applicable_period(&periods, date(2024, 8, 25)).unwrap().name,
            "Été"
        );
    }

    #[test]
    fn inactive_periods_are_ignored() {
        let mut off = period(None, "Off", date(2024, 7, 1), date(2024, 7, 31), 1, 99_000);
        off.is_active = false;
        assert!(applicable_period(&[off], date(2024, 7, 10)).is_none());
    }

    #[test]
    fn weekly_stay_gets_five_percent_off_accommodation() {
        // Monday 15 to Monday 22 July 2024
        let q = quote(&basis(), &[], &stay(date(2024, 7, 15), date(2024, 7, 22), 2)).unwrap();

        assert_eq!(q.accommodation_cents, 70_000);
        assert_eq!(q.long_stay_discount_cents, 3_500);
        assert_eq!(q.total_cents, 70_000 - 3_500 + 5_000 + 1_400);
    }

    #[test]
    fn monthly_stay_gets_ten_percent_off() {
        assert_eq!(long_stay_discount_bps(6), 0);
        assert_eq!(long_stay_discount_bps(7), 500);
        assert_eq!(long_stay_discount_bps(27), 500);
        assert_eq!(long_stay_discount_bps(28), 1_000);
    }

    #[test]
    fn too_many_guests_is_rejected() {
        let err = quote(&basis(), &[], &stay(date(2024, 7, 15), date(2024, 7, 18), 5)).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(msg) if msg == "Maximum 4 guests allowed"));
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let err = quote(&basis(), &[], &stay(date(2024, 7, 18), date(2024, 7, 15), 2)).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn minimum_stay_comes_from_check_in_period() {
        let mut summer = period(None, "Été", date(2024, 7, 1), date(2024, 8, 31), 1, 15_000);
        summer.min_nights = 7;
        let periods = vec![summer];

        let err = quote(&basis(), &periods, &stay(date(2024, 7, 15), date(2024, 7, 18), 2))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(msg) if msg.contains("Minimum stay is 7")));

        // Checking in the day before the period uses the property minimum
        let q = quote(&basis(), &periods, &stay(date(2024, 6, 30), date(2024, 7, 2), 2)).unwrap();
        assert_eq!(q.min_nights, 1);
    }

    #[test]
    fn pet_fee_only_when_pets_allowed() {
        let mut with_pets = stay(date(2024, 7, 15), date(2024, 7, 17), 2);
        with_pets.pets = 2;

        let refused = quote(&basis(), &[], &with_pets).unwrap();
        assert_eq!(refused.extra_fees_cents, 0);

        let basis = PriceBasis {
            pets_allowed: true,
            ..basis()
        };
        let q = quote(&basis, &[], &with_pets).unwrap();
        assert_eq!(q.extra_fees_cents, 4_000);
        assert_eq!(q.subtotal_cents, 20_000 + 5_000 + 4_000);
    }

    #[test]
    fn period_without_premium_falls_back_to_property_premium() {
        let basis = PriceBasis {
            weekend_premium_cents: 1_500,
            ..basis()
        };
        let periods = vec![period(None, "Été", date(2024, 7, 1), date(2024, 7, 31), 0, 15_000)];
        // Friday 19 July
        let (rate, _) = nightly_rate(&basis, &periods, date(2024, 7, 19));
        assert_eq!(rate.final_price_cents, 16_500);
    }

    #[test]
    fn options_join_subtotal_but_not_long_stay_discount() {
        // Monday 15 to Monday 22 July 2024
        let mut q = quote(&basis(), &[], &stay(date(2024, 7, 15), date(2024, 7, 22), 2)).unwrap();
        let before = q.total_cents;
        q.add_options(vec![OptionLine {
            option_id: Uuid::new_v4(),
            name: serde_json::json!({ "en": "Breakfast" }),
            quantity: 1,
            unit_price_cents: 1_500,
            total_cents: 21_000,
        }]);

        assert_eq!(q.options_cents, 21_000);
        assert_eq!(q.long_stay_discount_cents, 3_500);
        assert_eq!(q.total_cents, before + 21_000);
        assert_eq!(q.average_price_per_night_cents, (q.total_cents + 3) / 7);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(apply_bps(10_001, 500), 500);
        assert_eq!(apply_bps(10_010, 500), 501);
        assert_eq!(apply_bps(0, 1_500), 0);
    }

    #[test]
    fn commission_and_payout_add_up() {
        let (commission, payout) = split_commission(187_433, 1_500);
        assert_eq!(commission, 28_115);
        assert_eq!(commission + payout, 187_433);
    }
}
