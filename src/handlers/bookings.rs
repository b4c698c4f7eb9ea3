//! Booking HTTP handlers.
//!
//! This module implements the admin booking endpoints:
//! - POST /api/v1/bookings/calculate-price - Quote a stay
//! - POST /api/v1/bookings - Create a booking
//! - GET /api/v1/bookings - Filtered, paginated list
//! - GET /api/v1/bookings/stats - Aggregates
//! - GET /api/v1/bookings/{id} - Booking details
//! - PATCH /api/v1/bookings/{id} - Edit guest details and notes
//! - POST /api/v1/bookings/{id}/confirm|cancel|complete|no-show - Lifecycle

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, Permission},
    models::{
        booking::{
            Booking, BookingFilters, BookingListResponse, BookingStats, BookingStatsQuery,
            BookingStatus, CancelBookingRequest, CreateBookingRequest, StayRequest,
            UpdateBookingRequest,
        },
        webhook::BookingEvent,
    },
    services::{
        booking_service::{self, BookingOrigin, PriceCalculation},
        webhook_service,
    },
    state::AppState,
};

/// Price a stay without booking it.
///
/// # Request Body
///
/// ```json
/// {
///   "property_id": "550e8400-e29b-41d4-a716-446655440000",
///   "check_in": "2025-07-12",
///   "check_out": "2025-07-19",
///   "adults": 2,
///   "promo_code": "ETE25"
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: quote with daily breakdown, promo discount and commission
/// - **Error (400)**: invalid dates, too many guests, stay too short, bad promo code
/// - **Error (409)**: dates not available
pub async fn calculate_price(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<StayRequest>,
) -> Result<Json<PriceCalculation>, AppError> {
    auth.require(Permission::BookingsRead)?;
    let mut conn = state.pool.acquire().await?;
    let price = booking_service::calculate_price(
        &mut conn,
        auth.tenant_id,
        &request,
        BookingOrigin::Admin,
        state.config.commission_rate_bps,
    )
    .await?;

    Ok(Json(price))
}

/// Create a booking on behalf of a guest.
///
/// The booking starts `PENDING`. A `booking.created` event is delivered to
/// the tenant's webhooks in the background.
///
/// # Response
///
/// - **Success (201 Created)**: the booking with its reference and frozen prices
/// - **Error (400)**: invalid request or unpublished property
/// - **Error (409)**: dates not available
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(Permission::BookingsWrite)?;
    let booking = booking_service::create_booking(
        &state.pool,
        auth.tenant_id,
        request,
        BookingOrigin::Admin,
        state.config.commission_rate_bps,
    )
    .await?;

    webhook_service::dispatch_booking_event(
        state.pool.clone(),
        state.http.clone(),
        BookingEvent::Created,
        booking.clone(),
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

/// List bookings.
///
/// # Query Parameters
///
/// - `property_id`, `status`: exact filters
/// - `start_date`, `end_date`: check-in range, inclusive
/// - `search`: reference, guest names or email, case-insensitive
/// - `sort_by`: `created_at` (default), `check_in`, `check_out`, `total`
/// - `sort_order`: `asc` or `desc` (default)
/// - `page` (default 1), `limit` (default 20, max 100)
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filters): Query<BookingFilters>,
) -> Result<Json<BookingListResponse>, AppError> {
    auth.require(Permission::BookingsRead)?;
    let mut conn = state.pool.acquire().await?;
    let list = booking_service::list_bookings(&mut conn, auth.tenant_id, &filters).await?;

    Ok(Json(list))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    auth.require(Permission::BookingsRead)?;
    let mut conn = state.pool.acquire().await?;
    let booking = booking_service::get_booking(&mut conn, auth.tenant_id, booking_id).await?;

    Ok(Json(booking))
}

/// Edit guest details or internal notes. Refused for cancelled and completed bookings.
pub async fn update_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    auth.require(Permission::BookingsWrite)?;
    let mut conn = state.pool.acquire().await?;
    let booking =
        booking_service::update_booking(&mut conn, auth.tenant_id, booking_id, request).await?;

    Ok(Json(booking))
}

async fn transition(
    state: AppState,
    auth: AuthContext,
    booking_id: Uuid,
    next: BookingStatus,
    reason: Option<String>,
) -> Result<Json<Booking>, AppError> {
    auth.require(Permission::BookingsWrite)?;
    let booking =
        booking_service::transition(&state.pool, auth.tenant_id, booking_id, next, reason).await?;

    if let Some(event) = BookingEvent::for_status(booking.status) {
        webhook_service::dispatch_booking_event(
            state.pool.clone(),
            state.http.clone(),
            event,
            booking.clone(),
        );
    }
    Ok(Json(booking))
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition(state, auth, booking_id, BookingStatus::Confirmed, None).await
}

/// Cancel a pending or confirmed booking. The body is optional.
///
/// ```json
/// { "reason": "Guest request" }
/// ```
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
    request: Option<Json<CancelBookingRequest>>,
) -> Result<Json<Booking>, AppError> {
    let reason = request.and_then(|Json(r)| r.reason);
    transition(state, auth, booking_id, BookingStatus::Cancelled, reason).await
}

pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition(state, auth, booking_id, BookingStatus::Completed, None).await
}

pub async fn no_show_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition(state, auth, booking_id, BookingStatus::NoShow, None).await
}

/// Booking statistics.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "total_bookings": 42,
///   "confirmed_bookings": 30,
///   "cancelled_bookings": 4,
///   "cancellation_rate": 9.5,
///   "total_revenue_cents": 12500000,
///   "average_stay": 6.3,
///   "occupancy_rate": 71.2
/// }
/// ```
pub async fn booking_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<BookingStatsQuery>,
) -> Result<Json<BookingStats>, AppError> {
    auth.require(Permission::AnalyticsRead)?;
    let mut conn = state.pool.acquire().await?;
    let stats = booking_service::stats(&mut conn, auth.tenant_id, &query).await?;

    Ok(Json(stats))
}
