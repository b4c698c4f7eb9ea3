//! Booking service - pricing, creation and lifecycle of guest bookings.
//!
//! This service handles:
//! - Price calculation with availability checks
//! - Race-free booking creation
//! - Reference generation
//! - Status transitions
//! - Tenant statistics
//!
//! # Concurrency
//!
//! Creation runs in one PostgreSQL transaction that locks the property row
//! (`SELECT ... FOR UPDATE`) before re-checking availability, so two
//! requests for the same nights are serialised and the second one sees the
//! first booking. References are numbered under a transaction-scoped
//! advisory lock.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        booking::{
            Booking, BookingFilters, BookingListResponse, BookingStats, BookingStatsQuery,
            BookingStatus, CreateBookingRequest, Pagination, StayRequest, UpdateBookingRequest,
        },
        property::{Property, PropertyStatus},
    },
    services::{
        availability, option_service,
        pricing::{self, PriceBasis, Quote, Stay},
        promo_service::{self, PromoContext},
        property_service,
    },
};

/// Key of the advisory lock serialising reference numbering.
const REFERENCE_LOCK_KEY: i64 = 0x5653_5245_4600;

/// Where a booking request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOrigin {
    /// Admin API, always created `PENDING`
    Admin,
    /// Public booking site, confirmed at once on instant-booking properties
    Public,
}

/// Quote plus promo discount and commission split.
///
/// # JSON Example
///
/// ```json
/// {
///   "nights": 3,
///   "accommodation_cents": 30000,
///   "total_cents": 35600,
///   "promo_code": "ETE25",
///   "promo_discount_cents": 3560,
///   "final_total_cents": 32040,
///   "commission_cents": 4806,
///   "payout_cents": 27234,
///   "breakdown": [ ... ]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PriceCalculation {
    #[serde(flatten)]
    pub quote: Quote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub promo_discount_cents: i64,
    pub final_total_cents: i64,
    pub commission_cents: i64,
    pub payout_cents: i64,
    #[serde(skip)]
    pub promo_code_id: Option<Uuid>,
}

/// `VS` + two-digit year + two-digit month + four-digit monthly sequence.
pub fn format_reference(date: NaiveDate, sequence: i64) -> String {
    format!(
        "VS{:02}{:02}{:04}",
        date.year().rem_euclid(100),
        date.month(),
        sequence
    )
}

/// Next free reference for the month of `today`. Must run inside a transaction.
pub async fn next_reference(conn: &mut PgConnection, today: NaiveDate) -> Result<String, AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(REFERENCE_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let prefix = format_reference(today, 0);
    let prefix = &prefix[..6];
    let last: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MAX(SUBSTRING(reference FROM 7)::BIGINT)
        FROM bookings
        WHERE reference LIKE $1 || '%'
        "#,
    )
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_reference(today, last.unwrap_or(0) + 1))
}

/// Price a stay on a property already loaded and checked for availability.
pub async fn price_stay(
    conn: &mut PgConnection,
    property: &Property,
    stay: &StayRequest,
    commission_rate_bps: i64,
) -> Result<PriceCalculation, AppError> {
    let periods = pricing::load_periods(
        conn,
        property.tenant_id,
        property.id,
        stay.check_in,
        stay.check_out,
    )
    .await?;
    let mut quote = pricing::quote(
        &PriceBasis::from(property),
        &periods,
        &Stay {
            check_in: stay.check_in,
            check_out: stay.check_out,
            guests: stay.guests(),
            pets: stay.pets,
        },
    )?;

    let offers = option_service::offers_for_property(conn, property.tenant_id, property.id).await?;
    let lines = option_service::price_selection(&offers, &stay.options, stay.guests(), quote.nights)
        .map_err(AppError::InvalidRequest)?;
    quote.add_options(lines);

    let (promo_code, promo_code_id, promo_discount) = match stay.promo_code.as_deref() {
        Some(code) if !code.trim().is_empty() => {
            let ctx = PromoContext {
                property_id: property.id,
                nights: quote.nights,
                total_cents: quote.total_cents,
                now: Utc::now(),
            };
            let (promo, discount) =
                promo_service::apply(conn, property.tenant_id, code, &ctx).await?;
            (Some(promo.code), Some(promo.id), discount)
        }
        _ => (None, None, 0),
    };

    let final_total = quote.total_cents - promo_discount;
    let (commission, payout) = pricing::split_commission(final_total, commission_rate_bps);

    Ok(PriceCalculation {
        quote,
        promo_code,
        promo_discount_cents: promo_discount,
        final_total_cents: final_total,
        commission_cents: commission,
        payout_cents: payout,
        promo_code_id,
    })
}

/// Check availability and price a stay without booking it.
///
/// # Errors
///
/// - `PropertyNotFound` when the property is not the tenant's (or, for
///   public callers, not published)
/// - `DatesUnavailable` when the nights are taken or the stay is too short
/// - `InvalidRequest` for bad dates, guest counts or promo codes
pub async fn calculate_price(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    stay: &StayRequest,
    origin: BookingOrigin,
    commission_rate_bps: i64,
) -> Result<PriceCalculation, AppError> {
    stay.validate().map_err(AppError::InvalidRequest)?;
    let property = match origin {
        BookingOrigin::Public => {
            property_service::get_published_property(conn, tenant_id, stay.property_id).await?
        }
        BookingOrigin::Admin => {
            property_service::get_property(conn, tenant_id, stay.property_id).await?
        }
    };

    let today = Utc::now().date_naive();
    availability::ensure_available(conn, &property, stay.check_in, stay.check_out, None, today)
        .await?;
    price_stay(conn, &property, stay, commission_rate_bps).await
}

/// Create a booking.
///
/// # Process
///
/// 1. Validate the request
/// 2. Start a transaction and lock the property row
/// 3. Re-check availability under the lock
/// 4. Price the stay and its options, redeem the promo code
/// 5. Number the booking and insert it with its option lines
/// 6. Commit (or rollback on error)
pub async fn create_booking(
    pool: &DbPool,
    tenant_id: Uuid,
    request: CreateBookingRequest,
    origin: BookingOrigin,
    commission_rate_bps: i64,
) -> Result<Booking, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let stay = &request.stay;
    let today = Utc::now().date_naive();

    let mut tx = pool.begin().await?;

    let property = property_service::lock_property(&mut tx, tenant_id, stay.property_id).await?;

    if property.status != PropertyStatus::Published {
        return Err(match origin {
            BookingOrigin::Public => AppError::PropertyNotFound,
            BookingOrigin::Admin => {
                AppError::InvalidRequest("Property is not published".to_string())
            }
        });
    }

    availability::ensure_available(&mut tx, &property, stay.check_in, stay.check_out, None, today)
        .await?;
    let price = price_stay(&mut tx, &property, stay, commission_rate_bps).await?;
    if let Some(promo_id) = price.promo_code_id {
        promo_service::redeem(&mut tx, promo_id).await?;
    }

    let reference = next_reference(&mut tx, today).await?;
    let status = if origin == BookingOrigin::Public && property.instant_booking {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };
    let quote = &price.quote;

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            tenant_id, property_id, reference, check_in, check_out, nights,
            adults, children, infants, pets,
            guest_first_name, guest_last_name, guest_email, guest_phone,
            guest_country, guest_address, guest_notes, special_requests,
            source, external_id, status,
            accommodation_cents, cleaning_fee_cents, tourist_tax_cents, extra_fees_cents,
            discount_cents, subtotal_cents, total_cents, commission_cents, payout_cents,
            promo_code_id, promo_discount_cents, options_cents
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31,
                $32, $33)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(property.id)
    .bind(&reference)
    .bind(stay.check_in)
    .bind(stay.check_out)
    .bind(quote.nights)
    .bind(stay.adults)
    .bind(stay.children)
    .bind(stay.infants)
    .bind(stay.pets)
    .bind(request.guest_first_name.trim())
    .bind(request.guest_last_name.trim())
    .bind(request.guest_email.trim().to_lowercase())
    .bind(request.guest_phone.trim())
    .bind(request.guest_country.as_deref().map(str::to_ascii_uppercase))
    .bind(&request.guest_address)
    .bind(&request.guest_notes)
    .bind(&request.special_requests)
    .bind(request.source.as_deref().unwrap_or(match origin {
        BookingOrigin::Admin => "admin",
        BookingOrigin::Public => "website",
    }))
    .bind(&request.external_id)
    .bind(status)
    .bind(quote.accommodation_cents)
    .bind(quote.cleaning_fee_cents)
    .bind(quote.tourist_tax_cents)
    .bind(quote.extra_fees_cents)
    .bind(quote.long_stay_discount_cents + price.promo_discount_cents)
    .bind(quote.subtotal_cents)
    .bind(price.final_total_cents)
    .bind(price.commission_cents)
    .bind(price.payout_cents)
    .bind(price.promo_code_id)
    .bind(price.promo_discount_cents)
    .bind(quote.options_cents)
    .fetch_one(&mut *tx)
    .await?;
    option_service::record_selection(&mut tx, booking.id, &quote.options).await?;

    tx.commit().await?;

    tracing::info!(
        %tenant_id,
        booking_id = %booking.id,
        reference = %booking.reference,
        status = ?booking.status,
        total_cents = booking.total_cents,
        "Booking created"
    );
    Ok(booking)
}

pub async fn get_booking(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 AND tenant_id = $2")
        .bind(booking_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::BookingNotFound)
}

fn push_list_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    tenant_id: Uuid,
    filters: &'a BookingFilters,
) {
    builder.push(" WHERE tenant_id = ").push_bind(tenant_id);
    if let Some(property_id) = filters.property_id {
        builder.push(" AND property_id = ").push_bind(property_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(start) = filters.start_date {
        builder.push(" AND check_in >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        builder.push(" AND check_in <= ").push_bind(end);
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (reference ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR guest_first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR guest_last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR guest_email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Filtered, sorted and paginated bookings of a tenant.
pub async fn list_bookings(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    filters: &BookingFilters,
) -> Result<BookingListResponse, AppError> {
    filters.validate().map_err(AppError::InvalidRequest)?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
    push_list_filters(&mut count, tenant_id, filters);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM bookings");
    push_list_filters(&mut select, tenant_id, filters);
    select
        .push(" ORDER BY ")
        .push(filters.sort_by.column())
        .push(" ")
        .push(filters.sort_order.keyword())
        .push(", id LIMIT ")
        .push_bind(filters.limit)
        .push(" OFFSET ")
        .push_bind(Pagination::offset(filters.page, filters.limit));

    let bookings = select
        .build_query_as::<Booking>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(BookingListResponse {
        bookings,
        pagination: Pagination::new(filters.page, filters.limit, total),
    })
}

/// Edit guest details or internal notes of a booking still in progress.
pub async fn update_booking(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    booking_id: Uuid,
    request: UpdateBookingRequest,
) -> Result<Booking, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let current = get_booking(conn, tenant_id, booking_id).await?;
    if !current.status.is_editable() {
        return Err(AppError::InvalidRequest(format!(
            "Cannot modify a {:?} booking",
            current.status
        )));
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
            guest_first_name = COALESCE($3, guest_first_name),
            guest_last_name = COALESCE($4, guest_last_name),
            guest_email = COALESCE($5, guest_email),
            guest_phone = COALESCE($6, guest_phone),
            guest_country = COALESCE($7, guest_country),
            guest_address = COALESCE($8, guest_address),
            guest_notes = COALESCE($9, guest_notes),
            special_requests = COALESCE($10, special_requests),
            internal_notes = COALESCE($11, internal_notes),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(tenant_id)
    .bind(request.guest_first_name)
    .bind(request.guest_last_name)
    .bind(request.guest_email.map(|e| e.trim().to_lowercase()))
    .bind(request.guest_phone)
    .bind(request.guest_country.map(|c| c.to_ascii_uppercase()))
    .bind(request.guest_address)
    .bind(request.guest_notes)
    .bind(request.special_requests)
    .bind(request.internal_notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(booking)
}

/// Move a booking to `next`, enforcing the lifecycle.
///
/// Cancelling records the date and the optional reason.
pub async fn transition(
    pool: &DbPool,
    tenant_id: Uuid,
    booking_id: Uuid,
    next: BookingStatus,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(booking_id)
    .bind(tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::BookingNotFound)?;

    if !current.status.can_transition_to(next) {
        return Err(AppError::InvalidRequest(format!(
            "Cannot change booking status from {:?} to {:?}",
            current.status, next
        )));
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
            status = $2,
            cancelled_at = CASE WHEN $2 = 'CANCELLED'::booking_status THEN NOW() ELSE cancelled_at END,
            cancellation_reason = CASE WHEN $2 = 'CANCELLED'::booking_status THEN $3 ELSE cancellation_reason END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(next)
    .bind(reason)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %booking_id,
        reference = %booking.reference,
        from = ?current.status,
        to = ?next,
        "Booking status changed"
    );
    Ok(booking)
}

/// Percentage with one decimal; zero when the denominator is.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    confirmed: i64,
    cancelled: i64,
    revenue: i64,
    average_stay: f64,
}

/// Aggregates over bookings whose check-in falls in the optional range.
///
/// Occupancy is the share of property-nights in `[start_date, end_date]`
/// covered by confirmed or completed stays, and is only computed when both
/// bounds are given.
pub async fn stats(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    query: &BookingStatsQuery,
) -> Result<BookingStats, AppError> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::InvalidRequest(
                "End date must not be before start date".to_string(),
            ));
        }
    }
    if let Some(property_id) = query.property_id {
        property_service::get_property(conn, tenant_id, property_id).await?;
    }

    let row = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'CONFIRMED') AS confirmed,
            COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled,
            COALESCE(SUM(total_cents) FILTER (WHERE status IN ('CONFIRMED', 'COMPLETED')), 0)::BIGINT AS revenue,
            COALESCE(AVG(nights) FILTER (WHERE status <> 'CANCELLED'), 0)::FLOAT8 AS average_stay
        FROM bookings
        WHERE tenant_id = $1
          AND ($2::uuid IS NULL OR property_id = $2)
          AND ($3::date IS NULL OR check_in >= $3)
          AND ($4::date IS NULL OR check_in <= $4)
        "#,
    )
    .bind(tenant_id)
    .bind(query.property_id)
    .bind(query.start_date)
    .bind(query.end_date)
    .fetch_one(&mut *conn)
    .await?;

    let occupancy_rate = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => {
            let occupied: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(GREATEST(0,
                    LEAST(check_out, $4::date + 1) - GREATEST(check_in, $3::date))), 0)::BIGINT
                FROM bookings
                WHERE tenant_id = $1
                  AND ($2::uuid IS NULL OR property_id = $2)
                  AND status IN ('CONFIRMED', 'COMPLETED')
                  AND check_in <= $4
                  AND check_out > $3
                "#,
            )
            .bind(tenant_id)
            .bind(query.property_id)
            .bind(start)
            .bind(end)
            .fetch_one(&mut *conn)
            .await?;

            let properties: i64 = match query.property_id {
                Some(_) => 1,
                None => {
                    sqlx::query_scalar(
                        "SELECT COUNT(*) FROM properties WHERE tenant_id = $1 AND status <> 'ARCHIVED'",
                    )
                    .bind(tenant_id)
                    .fetch_one(&mut *conn)
                    .await?
                }
            };
            let nights = (end - start).num_days() + 1;
            percentage(occupied as f64, (properties * nights) as f64)
        }
        _ => 0.0,
    };

    Ok(BookingStats {
        total_bookings: row.total,
        confirmed_bookings: row.confirmed,
        cancelled_bookings: row.cancelled,
        cancellation_rate: percentage(row.cancelled as f64, row.total as f64),
        total_revenue_cents: row.revenue,
        average_stay: (row.average_stay * 10.0).round() / 10.0,
        occupancy_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reference_has_year_month_and_padded_sequence() {
        assert_eq!(format_reference(date(2025, 7, 14), 1), "VS25070001");
        assert_eq!(format_reference(date(2025, 12, 31), 123), "VS25120123");
        assert_eq!(format_reference(date(2030, 1, 1), 10_000), "VS300110000");
    }

    #[test]
    fn reference_prefix_is_six_chars() {
        assert_eq!(&format_reference(date(2025, 7, 14), 0)[..6], "VS2507");
    }

    #[test]
    fn percentage_has_one_decimal() {
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(2.0, 3.0), 66.7);
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(31.0, 31.0), 100.0);
    }
}
