//! Pricing period management.
//!
//! Periods may overlap; which one prices a night is decided by
//! [`crate::services::pricing::applicable_period`]. Deleting a period that
//! live bookings depend on is refused so their breakdown stays explainable.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::period::{CreatePeriodRequest, Period, PeriodFilter, UpdatePeriodRequest},
    services::property_service,
};

pub async fn list_periods(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    filter: &PeriodFilter,
) -> Result<Vec<Period>, AppError> {
    if let Some(property_id) = filter.property_id {
        property_service::get_property(conn, tenant_id, property_id).await?;
    }

    let periods = sqlx::query_as::<_, Period>(
        r#"
        SELECT * FROM periods
        WHERE tenant_id = $1
          AND ($2::uuid IS NULL OR property_id = $2 OR property_id IS NULL)
        ORDER BY start_date, priority DESC
        "#,
    )
    .bind(tenant_id)
    .bind(filter.property_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(periods)
}

pub async fn get_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    period_id: Uuid,
) -> Result<Period, AppError> {
    sqlx::query_as::<_, Period>("SELECT * FROM periods WHERE id = $1 AND tenant_id = $2")
        .bind(period_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::PeriodNotFound)
}

pub async fn create_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: CreatePeriodRequest,
) -> Result<Period, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    if let Some(property_id) = request.property_id {
        property_service::get_property(conn, tenant_id, property_id).await?;
    }

    let period = sqlx::query_as::<_, Period>(
        r#"
        INSERT INTO periods (
            tenant_id, property_id, name, start_date, end_date, priority,
            base_price_cents, weekend_premium_cents, min_nights, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(request.property_id)
    .bind(request.name.trim())
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.priority)
    .bind(request.base_price_cents)
    .bind(request.weekend_premium_cents)
    .bind(request.min_nights)
    .bind(request.is_active)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(%tenant_id, period_id = %period.id, "Period created");
    Ok(period)
}

pub async fn update_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    period_id: Uuid,
    request: UpdatePeriodRequest,
) -> Result<Period, AppError> {
    let current = get_period(conn, tenant_id, period_id).await?;
    request
        .validate_against(&current)
        .map_err(AppError::InvalidRequest)?;

    let period = sqlx::query_as::<_, Period>(
        r#"
        UPDATE periods SET
            name = COALESCE($3, name),
            start_date = COALESCE($4, start_date),
            end_date = COALESCE($5, end_date),
            priority = COALESCE($6, priority),
            base_price_cents = COALESCE($7, base_price_cents),
            weekend_premium_cents = COALESCE($8, weekend_premium_cents),
            min_nights = COALESCE($9, min_nights),
            is_active = COALESCE($10, is_active),
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(period_id)
    .bind(tenant_id)
    .bind(request.name.map(|n| n.trim().to_string()))
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.priority)
    .bind(request.base_price_cents)
    .bind(request.weekend_premium_cents)
    .bind(request.min_nights)
    .bind(request.is_active)
    .fetch_one(&mut *conn)
    .await?;

    Ok(period)
}

/// 409 naming the live bookings priced by a period.
pub fn ensure_unused(references: &[String]) -> Result<(), AppError> {
    if references.is_empty() {
        return Ok(());
    }
    Err(AppError::Conflict(format!(
        "Period is used by bookings: {}",
        references.join(", ")
    )))
}

/// Delete a period unless live bookings overlap it.
///
/// A tenant-wide period is checked against every property of the tenant.
pub async fn delete_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    period_id: Uuid,
) -> Result<(), AppError> {
    let period = get_period(conn, tenant_id, period_id).await?;

    let references: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT reference FROM bookings
        WHERE tenant_id = $1
          AND ($2::uuid IS NULL OR property_id = $2)
          AND status IN ('PENDING', 'CONFIRMED')
          AND check_in <= $4
          AND check_out > $3
        ORDER BY check_in
        "#,
    )
    .bind(tenant_id)
    .bind(period.property_id)
    .bind(period.start_date)
    .bind(period.end_date)
    .fetch_all(&mut *conn)
    .await?;

    ensure_unused(&references)?;

    sqlx::query("DELETE FROM periods WHERE id = $1 AND tenant_id = $2")
        .bind(period_id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_period_can_go() {
        assert!(ensure_unused(&[]).is_ok());
    }

    #[test]
    fn live_bookings_keep_the_period() {
        let references = vec!["VS25070001".to_string(), "VS25070003".to_string()];
        match ensure_unused(&references) {
            Err(AppError::Conflict(message)) => {
                assert_eq!(message, "Period is used by bookings: VS25070001, VS25070003")
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }
}
