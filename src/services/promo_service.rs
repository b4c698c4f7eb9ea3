//! Promo codes: admin CRUD, eligibility rules and redemption.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{AppError, is_unique_violation},
    models::promo_code::{
        CreatePromoCodeRequest, DiscountType, PromoBookingSummary, PromoCode, PromoCodeStats,
        PromoCodeValidation, UpdatePromoCodeRequest, ValidatePromoCodeRequest,
    },
    services::{
        booking_service::percentage,
        pricing::{self, PriceBasis, Stay},
        property_service,
    },
};

/// The stay a code is checked against.
#[derive(Debug, Clone, Copy)]
pub struct PromoContext {
    pub property_id: Uuid,
    pub nights: i32,
    pub total_cents: i64,
    pub now: DateTime<Utc>,
}

/// Discount a code grants on `total_cents`, never more than the total.
pub fn discount_for(code: &PromoCode, total_cents: i64) -> i64 {
    let discount = match code.discount_type {
        DiscountType::Percentage => (total_cents * code.discount_value + 50) / 100,
        DiscountType::FixedAmount => code.discount_value,
    };
    discount.clamp(0, total_cents.max(0))
}

/// Apply the eligibility rules of `code` to a stay.
///
/// Returns the discount in cents, or the reason the code does not apply.
pub fn evaluate(code: &PromoCode, ctx: &PromoContext) -> Result<i64, String> {
    if !code.is_active {
        return Err("Invalid promo code".to_string());
    }
    if ctx.now < code.valid_from || ctx.now > code.valid_until {
        return Err("Promo code expired".to_string());
    }
    if let Some(min) = code.min_amount_cents {
        if ctx.total_cents < min {
            return Err(format!("Minimum amount required: {min} cents"));
        }
    }
    if let Some(min) = code.min_nights {
        if ctx.nights < min {
            return Err(format!("Minimum stay required: {min} nights"));
        }
    }
    if !code.property_ids.is_empty() && !code.property_ids.contains(&ctx.property_id) {
        return Err("Promo code not valid for this property".to_string());
    }
    if code.max_uses.is_some_and(|max| code.current_uses >= max) {
        return Err("Promo code usage limit reached".to_string());
    }
    Ok(discount_for(code, ctx.total_cents))
}

/// Code of a tenant by its (case-insensitive) text.
pub async fn find_by_code(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<Option<PromoCode>, AppError> {
    let promo = sqlx::query_as::<_, PromoCode>(
        "SELECT * FROM promo_codes WHERE tenant_id = $1 AND code = $2",
    )
    .bind(tenant_id)
    .bind(code.trim().to_ascii_uppercase())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(promo)
}

/// Check a code against a stay and return `(code, discount)`.
///
/// # Errors
///
/// `InvalidRequest` carrying the rule that failed.
pub async fn apply(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
    ctx: &PromoContext,
) -> Result<(PromoCode, i64), AppError> {
    let promo = find_by_code(conn, tenant_id, code)
        .await?
        .ok_or_else(|| AppError::InvalidRequest("Invalid promo code".to_string()))?;
    let discount = evaluate(&promo, ctx).map_err(AppError::InvalidRequest)?;
    Ok((promo, discount))
}

/// Count one use of a code. Fails when a concurrent booking took the last use.
pub async fn redeem(conn: &mut PgConnection, promo_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE promo_codes
        SET current_uses = current_uses + 1
        WHERE id = $1 AND (max_uses IS NULL OR current_uses < max_uses)
        "#,
    )
    .bind(promo_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidRequest(
            "Promo code usage limit reached".to_string(),
        ));
    }
    Ok(())
}

/// Public check of a code for a prospective stay.
pub async fn validate_for_stay(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: &ValidatePromoCodeRequest,
) -> Result<PromoCodeValidation, AppError> {
    let property =
        property_service::get_published_property(conn, tenant_id, request.property_id).await?;
    let periods = pricing::load_periods(
        conn,
        tenant_id,
        property.id,
        request.check_in,
        request.check_out,
    )
    .await?;
    let quote = pricing::quote(
        &PriceBasis::from(&property),
        &periods,
        &Stay {
            check_in: request.check_in,
            check_out: request.check_out,
            guests: request.guests,
            pets: 0,
        },
    )?;

    let ctx = PromoContext {
        property_id: property.id,
        nights: quote.nights,
        total_cents: quote.total_cents,
        now: Utc::now(),
    };

    let Some(promo) = find_by_code(conn, tenant_id, &request.code).await? else {
        return Ok(invalid("Invalid promo code".to_string()));
    };

    Ok(match evaluate(&promo, &ctx) {
        Ok(discount) => PromoCodeValidation {
            valid: true,
            error: None,
            code: Some(promo.code),
            discount_cents: Some(discount),
            final_amount_cents: Some(quote.total_cents - discount),
        },
        Err(reason) => invalid(reason),
    })
}

fn invalid(reason: String) -> PromoCodeValidation {
    PromoCodeValidation {
        valid: false,
        error: Some(reason),
        code: None,
        discount_cents: None,
        final_amount_cents: None,
    }
}

pub async fn list(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<PromoCode>, AppError> {
    let codes = sqlx::query_as::<_, PromoCode>(
        "SELECT * FROM promo_codes WHERE tenant_id = $1 ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(codes)
}

pub async fn get(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<PromoCode, AppError> {
    sqlx::query_as::<_, PromoCode>("SELECT * FROM promo_codes WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::PromoCodeNotFound)
}

/// Share of a capped code already used, in percent with one decimal.
pub fn usage_rate(current_uses: i32, max_uses: Option<i32>) -> Option<f64> {
    max_uses.map(|max| percentage(f64::from(current_uses), f64::from(max)))
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    total: i64,
    discount: i64,
    revenue: i64,
}

/// Usage of a code: counters, discount granted and the latest bookings.
pub async fn stats(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<PromoCodeStats, AppError> {
    let promo = get(conn, tenant_id, id).await?;

    let usage = sqlx::query_as::<_, UsageRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(promo_discount_cents) FILTER (WHERE status <> 'CANCELLED'), 0)::BIGINT AS discount,
            COALESCE(SUM(total_cents) FILTER (WHERE status <> 'CANCELLED'), 0)::BIGINT AS revenue
        FROM bookings
        WHERE tenant_id = $1 AND promo_code_id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    let recent_bookings = sqlx::query_as::<_, PromoBookingSummary>(
        r#"
        SELECT id, reference, check_in, status, total_cents, promo_discount_cents, created_at
        FROM bookings
        WHERE tenant_id = $1 AND promo_code_id = $2
        ORDER BY created_at DESC
        LIMIT 10
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PromoCodeStats {
        usage_rate: usage_rate(promo.current_uses, promo.max_uses),
        code: promo.code,
        current_uses: promo.current_uses,
        max_uses: promo.max_uses,
        total_bookings: usage.total,
        total_discount_cents: usage.discount,
        revenue_cents: usage.revenue,
        recent_bookings,
    })
}

pub async fn create(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: CreatePromoCodeRequest,
) -> Result<PromoCode, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let property_ids = request.distinct_property_ids();
    if !property_ids.is_empty() {
        let owned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM properties WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(&property_ids)
        .fetch_one(&mut *conn)
        .await?;
        if owned != property_ids.len() as i64 {
            return Err(AppError::PropertyNotFound);
        }
    }

    sqlx::query_as::<_, PromoCode>(
        r#"
        INSERT INTO promo_codes (
            tenant_id, code, description, discount_type, discount_value,
            valid_from, valid_until, min_amount_cents, min_nights, property_ids, max_uses
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(request.code.trim().to_ascii_uppercase())
    .bind(request.description)
    .bind(request.discount_type)
    .bind(request.discount_value)
    .bind(request.valid_from)
    .bind(request.valid_until)
    .bind(request.min_amount_cents)
    .bind(request.min_nights)
    .bind(&property_ids)
    .bind(request.max_uses)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Promo code already exists".to_string())
        } else {
            e.into()
        }
    })
}

pub async fn update(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    request: UpdatePromoCodeRequest,
) -> Result<PromoCode, AppError> {
    if request.max_uses.is_some_and(|n| n < 1) {
        return Err(AppError::InvalidRequest("Limits must be positive".to_string()));
    }

    sqlx::query_as::<_, PromoCode>(
        r#"
        UPDATE promo_codes SET
            description = COALESCE($3, description),
            valid_until = COALESCE($4, valid_until),
            max_uses = COALESCE($5, max_uses),
            is_active = COALESCE($6, is_active)
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(request.description)
    .bind(request.valid_until)
    .bind(request.max_uses)
    .bind(request.is_active)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| match e {
        // valid_until moved before valid_from
        sqlx::Error::Database(ref db) if db.is_check_violation() => {
            AppError::InvalidRequest("valid_until must be after valid_from".to_string())
        }
        e => e.into(),
    })?
    .ok_or(AppError::PromoCodeNotFound)
}

pub async fn delete(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM promo_codes WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::PromoCodeNotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(discount_type: DiscountType, value: i64) -> PromoCode {
        let now = Utc::now();
        PromoCode {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            code: "ETE25".into(),
            description: None,
            discount_type,
            discount_value: value,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            min_amount_cents: None,
            min_nights: None,
            property_ids: Vec::new(),
            max_uses: None,
            current_uses: 0,
            is_active: true,
            created_at: now,
        }
    }

    fn ctx(total_cents: i64, nights: i32) -> PromoContext {
        PromoContext {
            property_id: Uuid::new_v4(),
            nights,
            total_cents,
            now: Utc::now(),
        }
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(discount_for(&code(DiscountType::Percentage, 10), 35_605), 3_561);
        assert_eq!(discount_for(&code(DiscountType::Percentage, 100), 35_600), 35_600);
    }

    #[test]
    fn fixed_amount_is_capped_at_total() {
        assert_eq!(discount_for(&code(DiscountType::FixedAmount, 5_000), 35_600), 5_000);
        assert_eq!(discount_for(&code(DiscountType::FixedAmount, 50_000), 35_600), 35_600);
    }

    #[test]
    fn expired_and_future_codes_are_rejected() {
        let mut promo = code(DiscountType::Percentage, 10);
        promo.valid_until = Utc::now() - Duration::hours(1);
        assert_eq!(evaluate(&promo, &ctx(10_000, 3)).unwrap_err(), "Promo code expired");

        let mut promo = code(DiscountType::Percentage, 10);
        promo.valid_from = Utc::now() + Duration::days(1);
        assert!(evaluate(&promo, &ctx(10_000, 3)).is_err());
    }

    #[test]
    fn minimums_are_enforced() {
        let mut promo = code(DiscountType::FixedAmount, 1_000);
        promo.min_amount_cents = Some(50_000);
        assert!(evaluate(&promo, &ctx(49_999, 7)).is_err());
        assert_eq!(evaluate(&promo, &ctx(50_000, 7)), Ok(1_000));

        promo.min_nights = Some(7);
        assert!(evaluate(&promo, &ctx(60_000, 6)).is_err());
    }

    #[test]
    fn restricted_codes_only_apply_to_listed_properties() {
        let listed = Uuid::new_v4();
        let mut promo = code(DiscountType::Percentage, 10);
        promo.property_ids = vec![listed];

        assert!(evaluate(&promo, &ctx(10_000, 2)).is_err());
        let mut on_listed = ctx(10_000, 2);
        on_listed.property_id = listed;
        assert_eq!(evaluate(&promo, &on_listed), Ok(1_000));
    }

    #[test]
    fn usage_rate_only_for_capped_codes() {
        assert_eq!(usage_rate(25, Some(100)), Some(25.0));
        assert_eq!(usage_rate(1, Some(3)), Some(33.3));
        assert_eq!(usage_rate(40, None), None);
    }

    #[test]
    fn exhausted_and_inactive_codes_are_rejected() {
        let mut promo = code(DiscountType::Percentage, 10);
        promo.max_uses = Some(3);
        promo.current_uses = 3;
        assert_eq!(
            evaluate(&promo, &ctx(10_000, 2)).unwrap_err(),
            "Promo code usage limit reached"
        );

        let mut promo = code(DiscountType::Percentage, 10);
        promo.is_active = false;
        assert!(evaluate(&promo, &ctx(10_000, 2)).is_err());
    }
}
