//! Occupancy of properties: availability checks, calendars, blocked periods
//! and iCal synchronisation.
//!
//! # Occupancy rules
//!
//! - A booking occupies the nights `[check_in, check_out)`, so a guest may
//!   arrive the day another leaves.
//! - A blocked period occupies the nights `[start_date, end_date]`.
//! - Only `PENDING` and `CONFIRMED` bookings occupy anything.
//!
//! Both are normalised to half-open [`OccupiedRange`]s before comparison.

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        booking::stay_nights,
        period::{
            BlockedPeriod, BlockedPeriodFilter, CreateBlockedPeriodRequest, Period,
            UpdateBlockedPeriodRequest,
        },
        property::Property,
    },
    services::{
        ical::{self, CalendarEvent},
        pricing::{self, PriceBasis},
        property_service,
    },
};

/// Longest calendar a single request may ask for.
pub const MAX_CALENDAR_DAYS: i64 = 365;

const IMPORTED_REASON: &str = "Importé depuis iCal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Booking,
    Blocked,
}

/// Nights `[start, end)` taken by a booking or a blocked period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupiedRange {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub id: Uuid,
    #[serde(rename = "start_date")]
    pub start: NaiveDate,
    /// Exclusive
    #[serde(rename = "end_date")]
    pub end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl OccupiedRange {
    pub fn booking(id: Uuid, reference: String, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            kind: ConflictKind::Booking,
            id,
            start: check_in,
            end: check_out,
            reference: Some(reference),
        }
    }

    pub fn blocked(period: &BlockedPeriod) -> Self {
        Self {
            kind: ConflictKind::Blocked,
            id: period.id,
            start: period.start_date,
            end: period.end_date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX),
            reference: None,
        }
    }

    /// Whether any night of `[check_in, check_out)` is taken.
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.start < check_out && check_in < self.end
    }

    pub fn occupies(&self, night: NaiveDate) -> bool {
        self.start <= night && night < self.end
    }
}

/// Ranges colliding with the stay `[check_in, check_out)`.
pub fn find_conflicts(
    ranges: &[OccupiedRange],
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Vec<OccupiedRange> {
    ranges
        .iter()
        .filter(|r| r.overlaps(check_in, check_out))
        .cloned()
        .collect()
}

/// Answer of an availability check.
#[derive(Debug, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<OccupiedRange>,
}

/// Why a calendar day cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailableReason {
    Past,
    Booked,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nights: Option<i32>,
}

/// Reject reversed or oversized calendar windows. Both ends are included,
/// so `start == end` asks for a single day.
pub fn validate_calendar_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::InvalidRequest(
            "End date cannot be before start date".to_string(),
        ));
    }
    if (end - start).num_days() > MAX_CALENDAR_DAYS {
        return Err(AppError::InvalidRequest(format!(
            "Calendar range cannot exceed {MAX_CALENDAR_DAYS} days"
        )));
    }
    Ok(())
}

/// One entry per night of `[start, end]`.
///
/// Unavailable days report the first matching reason among past, booked and
/// blocked. Available days carry the nightly price and minimum stay.
pub fn build_calendar(
    basis: &PriceBasis,
    periods: &[Period],
    ranges: &[OccupiedRange],
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| {
            let taken = |kind| ranges.iter().any(|r| r.kind == kind && r.occupies(date));
            let reason = if date < today {
                Some(UnavailableReason::Past)
            } else if taken(ConflictKind::Booking) {
                Some(UnavailableReason::Booked)
            } else if taken(ConflictKind::Blocked) {
                Some(UnavailableReason::Blocked)
            } else {
                None
            };

            match reason {
                Some(reason) => CalendarDay {
                    date,
                    available: false,
                    reason: Some(reason),
                    price_cents: None,
                    min_nights: None,
                },
                None => {
                    let (rate, min_nights) = pricing::nightly_rate(basis, periods, date);
                    CalendarDay {
                        date,
                        available: true,
                        reason: None,
                        price_cents: Some(rate.final_price_cents),
                        min_nights: Some(min_nights),
                    }
                }
            }
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct BookingSpan {
    id: Uuid,
    reference: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
}

/// Bookings and blocked periods of `property_id` touching the nights `[from, to)`.
pub async fn load_occupied(
    conn: &mut PgConnection,
    property_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    exclude_booking: Option<Uuid>,
) -> Result<Vec<OccupiedRange>, AppError> {
    let bookings = sqlx::query_as::<_, BookingSpan>(
        r#"
        SELECT id, reference, check_in, check_out
        FROM bookings
        WHERE property_id = $1
          AND status IN ('PENDING', 'CONFIRMED')
          AND check_in < $3
          AND check_out > $2
          AND ($4::uuid IS NULL OR id <> $4)
        ORDER BY check_in
        "#,
    )
    .bind(property_id)
    .bind(from)
    .bind(to)
    .bind(exclude_booking)
    .fetch_all(&mut *conn)
    .await?;

    let blocked = sqlx::query_as::<_, BlockedPeriod>(
        r#"
        SELECT * FROM blocked_periods
        WHERE property_id = $1 AND start_date < $3 AND end_date >= $2
        ORDER BY start_date
        "#,
    )
    .bind(property_id)
    .bind(from)
    .bind(to)
    .fetch_all(&mut *conn)
    .await?;

    let mut ranges: Vec<OccupiedRange> = bookings
        .into_iter()
        .map(|b| OccupiedRange::booking(b.id, b.reference, b.check_in, b.check_out))
        .collect();
    ranges.extend(blocked.iter().map(OccupiedRange::blocked));
    Ok(ranges)
}

/// Whether `property` can host the stay `[check_in, check_out)`.
///
/// Reports past arrivals, collisions and minimum-stay violations as
/// unavailable rather than as errors.
pub async fn check(
    conn: &mut PgConnection,
    property: &Property,
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude_booking: Option<Uuid>,
    today: NaiveDate,
) -> Result<Availability, AppError> {
    stay_nights(check_in, check_out).map_err(AppError::InvalidRequest)?;
    if check_in < today {
        return Ok(Availability {
            available: false,
            reason: Some("Check-in date is in the past".to_string()),
            conflicts: Vec::new(),
        });
    }

    let ranges = load_occupied(conn, property.id, check_in, check_out, exclude_booking).await?;
    let conflicts = find_conflicts(&ranges, check_in, check_out);
    if !conflicts.is_empty() {
        return Ok(Availability {
            available: false,
            reason: Some("Dates not available".to_string()),
            conflicts,
        });
    }

    let periods =
        pricing::load_periods(conn, property.tenant_id, property.id, check_in, check_in).await?;
    let min_nights = pricing::required_min_nights(&PriceBasis::from(property), &periods, check_in);
    let nights = (check_out - check_in).num_days();
    if nights < i64::from(min_nights) {
        return Ok(Availability {
            available: false,
            reason: Some(format!("Minimum stay is {min_nights} nights for these dates")),
            conflicts: Vec::new(),
        });
    }

    Ok(Availability {
        available: true,
        reason: None,
        conflicts: Vec::new(),
    })
}

/// [`check`], turned into a `DatesUnavailable` error when the stay cannot be booked.
pub async fn ensure_available(
    conn: &mut PgConnection,
    property: &Property,
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude_booking: Option<Uuid>,
    today: NaiveDate,
) -> Result<(), AppError> {
    let availability = check(conn, property, check_in, check_out, exclude_booking, today).await?;
    if availability.available {
        Ok(())
    } else {
        Err(AppError::DatesUnavailable(
            availability
                .reason
                .unwrap_or_else(|| "Dates not available".to_string()),
        ))
    }
}

/// Calendar of `property` over `[start, end]`.
pub async fn calendar(
    conn: &mut PgConnection,
    property: &Property,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<CalendarDay>, AppError> {
    validate_calendar_range(start, end)?;
    let after_end = end.checked_add_days(Days::new(1)).unwrap_or(end);

    let ranges = load_occupied(conn, property.id, start, after_end, None).await?;
    let periods = pricing::load_periods(conn, property.tenant_id, property.id, start, end).await?;

    Ok(build_calendar(
        &PriceBasis::from(property),
        &periods,
        &ranges,
        start,
        end,
        today,
    ))
}

/// References of live bookings holding any night of `[start, end]`.
pub async fn bookings_overlapping(
    conn: &mut PgConnection,
    property_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<String>, AppError> {
    let references = sqlx::query_scalar::<_, String>(
        r#"
        SELECT reference FROM bookings
        WHERE property_id = $1
          AND status IN ('PENDING', 'CONFIRMED')
          AND check_in <= $3
          AND check_out > $2
        ORDER BY check_in
        "#,
    )
    .bind(property_id)
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(references)
}

/// 409 listing `references` when any live booking is in the way.
pub fn ensure_no_live_bookings(references: Vec<String>) -> Result<(), AppError> {
    if references.is_empty() {
        Ok(())
    } else {
        Err(AppError::OverlappingBookings(references))
    }
}

/// Blocked periods of a tenant's property, optionally restricted to a window.
pub async fn list_blocked_periods(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    filter: &BlockedPeriodFilter,
) -> Result<Vec<BlockedPeriod>, AppError> {
    property_service::get_property(conn, tenant_id, filter.property_id).await?;

    let periods = sqlx::query_as::<_, BlockedPeriod>(
        r#"
        SELECT * FROM blocked_periods
        WHERE property_id = $1
          AND ($2::date IS NULL OR end_date >= $2)
          AND ($3::date IS NULL OR start_date <= $3)
        ORDER BY start_date
        "#,
    )
    .bind(filter.property_id)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .fetch_all(&mut *conn)
    .await?;

    Ok(periods)
}

/// Block nights of a property.
///
/// # Errors
///
/// - `PropertyNotFound` when the property is not the tenant's
/// - `InvalidRequest` when the end is before the start
/// - `OverlappingBookings` listing the live bookings in the way
///
/// Runs inside the caller's transaction: the property row stays locked until
/// it commits, so no booking can take the nights in the meantime.
pub async fn create_blocked_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: CreateBlockedPeriodRequest,
) -> Result<BlockedPeriod, AppError> {
    if request.start_date > request.end_date {
        return Err(AppError::InvalidRequest(
            "End date must not be before start date".to_string(),
        ));
    }
    property_service::lock_property(conn, tenant_id, request.property_id).await?;

    let overlapping =
        bookings_overlapping(conn, request.property_id, request.start_date, request.end_date)
            .await?;
    ensure_no_live_bookings(overlapping)?;

    let period = sqlx::query_as::<_, BlockedPeriod>(
        r#"
        INSERT INTO blocked_periods (property_id, start_date, end_date, reason, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(request.property_id)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.reason)
    .bind(request.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(period)
}

async fn get_blocked_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<BlockedPeriod, AppError> {
    sqlx::query_as::<_, BlockedPeriod>(
        r#"
        SELECT bp.* FROM blocked_periods bp
        JOIN properties p ON p.id = bp.property_id
        WHERE bp.id = $1 AND p.tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::BlockedPeriodNotFound)
}

/// Move or annotate a blocked period. Moved dates are checked against bookings again.
pub async fn update_blocked_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    request: UpdateBlockedPeriodRequest,
) -> Result<BlockedPeriod, AppError> {
    let current = get_blocked_period(conn, tenant_id, id).await?;
    let start = request.start_date.unwrap_or(current.start_date);
    let end = request.end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(AppError::InvalidRequest(
            "End date must not be before start date".to_string(),
        ));
    }

    if start != current.start_date || end != current.end_date {
        property_service::lock_property(conn, tenant_id, current.property_id).await?;
        let overlapping = bookings_overlapping(conn, current.property_id, start, end).await?;
        ensure_no_live_bookings(overlapping)?;
    }

    let period = sqlx::query_as::<_, BlockedPeriod>(
        r#"
        UPDATE blocked_periods
        SET start_date = $2,
            end_date = $3,
            reason = COALESCE($4, reason),
            notes = COALESCE($5, notes)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(start)
    .bind(end)
    .bind(request.reason)
    .bind(request.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(period)
}

pub async fn delete_blocked_period(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        DELETE FROM blocked_periods bp
        USING properties p
        WHERE bp.id = $1 AND p.id = bp.property_id AND p.tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BlockedPeriodNotFound);
    }
    Ok(())
}

/// Outcome of an iCal import.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub imported: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

/// Turn the future events of a calendar into blocked periods.
///
/// Events already over, or colliding with a live booking, are skipped.
/// The exclusive `DTEND` becomes an inclusive `end_date` one day earlier.
pub async fn import_calendar(
    conn: &mut PgConnection,
    property: &Property,
    content: &str,
    today: NaiveDate,
) -> Result<ImportSummary, AppError> {
    let parsed = ical::parse_calendar(content)?;
    property_service::lock_property(conn, property.tenant_id, property.id).await?;
    let mut summary = ImportSummary {
        skipped: u32::try_from(parsed.errors.len()).unwrap_or(u32::MAX),
        errors: parsed.errors,
        ..ImportSummary::default()
    };

    for event in parsed.events {
        if event.end <= today {
            summary.skipped += 1;
            continue;
        }
        let last_night = event.end.pred_opt().unwrap_or(event.start);

        let overlapping = bookings_overlapping(conn, property.id, event.start, last_night).await?;
        if let Some(reference) = overlapping.first() {
            summary
                .errors
                .push(format!("Conflict with existing booking {reference}"));
            summary.skipped += 1;
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO blocked_periods (property_id, start_date, end_date, reason, notes)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(property.id)
        .bind(event.start)
        .bind(last_night)
        .bind(IMPORTED_REASON)
        .bind(event.summary)
        .execute(&mut *conn)
        .await?;
        summary.imported += 1;
    }

    tracing::info!(
        property_id = %property.id,
        imported = summary.imported,
        skipped = summary.skipped,
        "iCal import finished"
    );
    Ok(summary)
}

/// Fetch a remote calendar for import.
pub async fn fetch_calendar(http: &reqwest::Client, url: &str) -> Result<String, AppError> {
    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest("Invalid calendar URL".to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidRequest(
            "Calendar URL must use HTTP or HTTPS".to_string(),
        ));
    }

    let response = http
        .get(parsed)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to fetch iCal from URL: {e}")))?;
    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "Failed to fetch iCal from URL: HTTP {}",
            response.status().as_u16()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to read iCal body: {e}")))
}

/// Live bookings and blocked periods of a published property as an `.ics` document.
pub async fn export_calendar(
    conn: &mut PgConnection,
    property: &Property,
) -> Result<String, AppError> {
    #[derive(sqlx::FromRow)]
    struct ExportedBooking {
        id: Uuid,
        reference: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_first_name: String,
        guest_last_name: String,
        guests: i32,
    }

    let bookings = sqlx::query_as::<_, ExportedBooking>(
        r#"
        SELECT id, reference, check_in, check_out, guest_first_name, guest_last_name,
               adults + children AS guests
        FROM bookings
        WHERE property_id = $1 AND status IN ('PENDING', 'CONFIRMED')
        ORDER BY check_in
        "#,
    )
    .bind(property.id)
    .fetch_all(&mut *conn)
    .await?;

    let blocked = sqlx::query_as::<_, BlockedPeriod>(
        "SELECT * FROM blocked_periods WHERE property_id = $1 ORDER BY start_date",
    )
    .bind(property.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut events: Vec<CalendarEvent> = bookings
        .into_iter()
        .map(|b| CalendarEvent {
            uid: b.id.to_string(),
            start: b.check_in,
            end: b.check_out,
            summary: format!("Réservation {}", b.reference),
            description: Some(format!(
                "{} {} - {} personnes",
                b.guest_first_name, b.guest_last_name, b.guests
            )),
        })
        .collect();
    events.extend(blocked.iter().map(|b| {
        let range = OccupiedRange::blocked(b);
        CalendarEvent {
            uid: format!("blocked-{}", b.id),
            start: range.start,
            end: range.end,
            summary: b.reason.clone().unwrap_or_else(|| "Indisponible".to_string()),
            description: b.notes.clone(),
        }
    }));

    Ok(ical::render_calendar(&property.name, &events, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::tests::{basis, date, period};

    fn blocked(start: NaiveDate, end: NaiveDate) -> BlockedPeriod {
        BlockedPeriod {
            id: Uuid::new_v4(),
            property_id: Uuid::nil(),
            start_date: start,
            end_date: end,
            reason: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn booking(check_in: NaiveDate, check_out: NaiveDate) -> OccupiedRange {
        OccupiedRange::booking(Uuid::new_v4(), "VS25070001".into(), check_in, check_out)
    }

    #[test]
    fn back_to_back_bookings_do_not_conflict() {
        let existing = booking(date(2025, 7, 12), date(2025, 7, 19));
        assert!(!existing.overlaps(date(2025, 7, 19), date(2025, 7, 26)));
        assert!(!existing.overlaps(date(2025, 7, 5), date(2025, 7, 12)));
        assert!(existing.overlaps(date(2025, 7, 18), date(2025, 7, 20)));
    }

    #[test]
    fn blocked_end_date_is_a_blocked_night() {
        let range = OccupiedRange::blocked(&blocked(date(2025, 7, 12), date(2025, 7, 14)));
        assert_eq!(range.end, date(2025, 7, 15));
        assert!(range.overlaps(date(2025, 7, 14), date(2025, 7, 16)));
        assert!(!range.overlaps(date(2025, 7, 15), date(2025, 7, 16)));
        assert!(!range.overlaps(date(2025, 7, 10), date(2025, 7, 12)));
    }

    #[test]
    fn conflicts_keep_their_kind() {
        let ranges = vec![
            booking(date(2025, 7, 1), date(2025, 7, 5)),
            OccupiedRange::blocked(&blocked(date(2025, 7, 8), date(2025, 7, 9))),
            booking(date(2025, 8, 1), date(2025, 8, 5)),
        ];
        let conflicts = find_conflicts(&ranges, date(2025, 7, 3), date(2025, 7, 10));
        let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConflictKind::Booking, ConflictKind::Blocked]);
    }

    #[test]
    fn calendar_marks_past_booked_and_blocked_days() {
        let ranges = vec![
            booking(date(2025, 7, 11), date(2025, 7, 13)),
            OccupiedRange::blocked(&blocked(date(2025, 7, 14), date(2025, 7, 14))),
        ];
        let days = build_calendar(
            &basis(),
            &[],
            &ranges,
            date(2025, 7, 10),
            date(2025, 7, 15),
            date(2025, 7, 11),
        );

        let reasons: Vec<Option<UnavailableReason>> = days.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                Some(UnavailableReason::Past),
                Some(UnavailableReason::Booked),
                Some(UnavailableReason::Booked),
                None,
                Some(UnavailableReason::Blocked),
                None,
            ]
        );
        // Check-out day of a booking is free again
        assert!(days[3].available);
        assert_eq!(days[3].price_cents, Some(10_000));
        assert_eq!(days[0].price_cents, None);
    }

    #[test]
    fn calendar_prices_follow_periods() {
        let mut summer = period(None, "Été", date(2025, 7, 1), date(2025, 8, 31), 0, 15_000);
        summer.min_nights = 7;
        let days = build_calendar(
            &basis(),
            &[summer],
            &[],
            date(2025, 6, 30),
            date(2025, 7, 1),
            date(2025, 6, 1),
        );
        assert_eq!(days[0].price_cents, Some(10_000));
        assert_eq!(days[0].min_nights, Some(1));
        assert_eq!(days[1].price_cents, Some(15_000));
        assert_eq!(days[1].min_nights, Some(7));
    }

    #[test]
    fn calendar_range_is_bounded() {
        assert!(validate_calendar_range(date(2025, 1, 1), date(2025, 1, 1)).is_ok());
        assert!(validate_calendar_range(date(2025, 1, 2), date(2025, 1, 1)).is_err());
        assert!(validate_calendar_range(date(2025, 1, 1), date(2026, 1, 1)).is_ok());
        assert!(validate_calendar_range(date(2025, 1, 1), date(2026, 1, 2)).is_err());
    }

    #[test]
    fn single_day_calendar_has_one_entry() {
        let day = date(2025, 7, 14);
        assert!(validate_calendar_range(day, day).is_ok());
        let days = build_calendar(&basis(), &[], &[], day, day, date(2025, 7, 1));
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, day);
        assert!(days[0].available);
    }

    #[test]
    fn live_bookings_in_the_way_are_listed() {
        assert!(ensure_no_live_bookings(Vec::new()).is_ok());

        let err = ensure_no_live_bookings(vec!["VS25070001".into(), "VS25070004".into()])
            .unwrap_err();
        match err {
            AppError::OverlappingBookings(refs) => {
                assert_eq!(refs, vec!["VS25070001", "VS25070004"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
