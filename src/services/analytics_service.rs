//! Booking reports: overview, occupancy, revenue, property ranking,
//! booking sources and CSV export.
//!
//! Rows are loaded once per report and aggregated by the pure functions
//! below. A stay belongs to a range when all its nights fall inside it.
//! Occupancy counts booked nights (`[check_in, check_out)`) and blocked
//! nights (`[start, end]`) of PUBLISHED properties, clipped to the range.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::analytics::{
        AnalyticsOverview, DateRange, MonthlyOccupancy, MonthlyRevenue, OccupancyReport,
        PropertyPerformance, RevenueReport, SourceShare, StayRecord, TopPropertySort,
    },
    services::{booking_service::percentage, property_service},
};

/// Source reported for bookings that did not name one.
pub const DEFAULT_SOURCE: &str = "direct";

/// Properties listed in the overview.
const OVERVIEW_TOP: usize = 5;

/// The part of a calendar month inside a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSpan {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Calendar months of a range, first and last one clipped.
pub fn month_spans(range: &DateRange) -> Vec<MonthSpan> {
    let mut spans = Vec::new();
    let mut cursor = range.start;
    while cursor <= range.end {
        let Some(next) = cursor
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
        else {
            break;
        };
        let Some(last) = next.pred_opt() else {
            break;
        };
        spans.push(MonthSpan {
            label: cursor.format("%Y-%m").to_string(),
            start: cursor,
            end: last.min(range.end),
        });
        cursor = next;
    }
    spans
}

/// Nights of `[from, to)` falling on days `[start, end]`.
pub fn nights_within(from: NaiveDate, to: NaiveDate, start: NaiveDate, end: NaiveDate) -> i64 {
    let lo = from.max(start);
    let hi = to.min(end.succ_opt().unwrap_or(end));
    (hi - lo).num_days().max(0)
}

/// `total / count` rounded half up; zero without a count.
fn rounded_average(total: i64, count: i64) -> i64 {
    if count <= 0 {
        return 0;
    }
    (total + count / 2) / count
}

/// Occupancy of `properties` properties from their occupied night spans
/// (`[from, to)` each).
pub fn occupancy(
    range: &DateRange,
    properties: i64,
    occupied: &[(NaiveDate, NaiveDate)],
) -> OccupancyReport {
    let monthly: Vec<MonthlyOccupancy> = if properties == 0 {
        Vec::new()
    } else {
        month_spans(range)
            .into_iter()
            .map(|span| {
                let total = ((span.end - span.start).num_days() + 1) * properties;
                let used: i64 = occupied
                    .iter()
                    .map(|(from, to)| nights_within(*from, *to, span.start, span.end))
                    .sum();
                let used = used.min(total);
                MonthlyOccupancy {
                    month: span.label,
                    occupied_nights: used,
                    total_nights: total,
                    occupancy_rate: percentage(used as f64, total as f64),
                }
            })
            .collect()
    };

    let occupied_nights = monthly.iter().map(|m| m.occupied_nights).sum();
    let total_nights = monthly.iter().map(|m| m.total_nights).sum();
    OccupancyReport {
        range: *range,
        properties,
        occupied_nights,
        total_nights,
        occupancy_rate: percentage(occupied_nights as f64, total_nights as f64),
        monthly,
    }
}

/// Revenue per month of check-in, with per-night and per-booking averages.
pub fn revenue(range: &DateRange, stays: &[StayRecord]) -> RevenueReport {
    let monthly = month_spans(range)
        .into_iter()
        .map(|span| {
            let in_month = stays
                .iter()
                .filter(|s| s.check_in >= span.start && s.check_in <= span.end);
            let (revenue, bookings) =
                in_month.fold((0, 0), |(r, b), s| (r + s.total_cents, b + 1));
            MonthlyRevenue {
                month: span.label,
                revenue_cents: revenue,
                bookings,
            }
        })
        .collect();

    let total: i64 = stays.iter().map(|s| s.total_cents).sum();
    let nights: i64 = stays.iter().map(|s| i64::from(s.nights)).sum();
    RevenueReport {
        range: *range,
        total_revenue_cents: total,
        average_revenue_per_night_cents: rounded_average(total, nights),
        average_revenue_per_booking_cents: rounded_average(total, stays.len() as i64),
        monthly,
    }
}

/// Properties ranked by revenue or booking count, best first.
pub fn top_properties(
    range: &DateRange,
    stays: &[StayRecord],
    limit: usize,
    sort_by: TopPropertySort,
) -> Vec<PropertyPerformance> {
    let mut by_property: HashMap<Uuid, PropertyPerformance> = HashMap::new();
    for stay in stays {
        let entry = by_property
            .entry(stay.property_id)
            .or_insert_with(|| PropertyPerformance {
                property_id: stay.property_id,
                name: stay.property_name.clone(),
                revenue_cents: 0,
                bookings: 0,
                nights: 0,
                occupancy_rate: 0.0,
                average_nightly_rate_cents: 0,
            });
        entry.revenue_cents += stay.total_cents;
        entry.bookings += 1;
        entry.nights += i64::from(stay.nights);
    }

    let days = range.days();
    let mut ranked: Vec<PropertyPerformance> = by_property
        .into_values()
        .map(|mut p| {
            p.occupancy_rate = percentage(p.nights as f64, days as f64);
            p.average_nightly_rate_cents = rounded_average(p.revenue_cents, p.nights);
            p
        })
        .collect();

    ranked.sort_by(|a, b| {
        let key = |p: &PropertyPerformance| match sort_by {
            TopPropertySort::Revenue => (p.revenue_cents, p.bookings),
            TopPropertySort::Bookings => (p.bookings, p.revenue_cents),
        };
        key(b).cmp(&key(a)).then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

/// Bookings and revenue per source, largest revenue first.
pub fn booking_sources(stays: &[StayRecord]) -> Vec<SourceShare> {
    let mut by_source: HashMap<String, (i64, i64)> = HashMap::new();
    for stay in stays {
        let source = stay
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
            .to_lowercase();
        let entry = by_source.entry(source).or_default();
        entry.0 += 1;
        entry.1 += stay.total_cents;
    }

    let total: i64 = stays.iter().map(|s| s.total_cents).sum();
    let mut shares: Vec<SourceShare> = by_source
        .into_iter()
        .map(|(source, (count, revenue))| SourceShare {
            source,
            count,
            revenue_cents: revenue,
            percentage: percentage(revenue as f64, total as f64),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.revenue_cents
            .cmp(&a.revenue_cents)
            .then_with(|| a.source.cmp(&b.source))
    });
    shares
}

/// Mean nights per stay, one decimal.
pub fn average_stay(stays: &[StayRecord]) -> f64 {
    if stays.is_empty() {
        return 0.0;
    }
    let nights: i64 = stays.iter().map(|s| i64::from(s.nights)).sum();
    (nights as f64 / stays.len() as f64 * 10.0).round() / 10.0
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One CSV line per stay, with a header.
pub fn to_csv(stays: &[StayRecord]) -> String {
    let mut out = String::from(
        "reference,property,check_in,check_out,nights,guests,status,source,total_cents\n",
    );
    for stay in stays {
        let status = serde_json::to_value(stay.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let fields = [
            csv_field(&stay.reference),
            csv_field(&stay.property_name),
            stay.check_in.to_string(),
            stay.check_out.to_string(),
            stay.nights.to_string(),
            stay.guests.to_string(),
            status,
            csv_field(stay.source.as_deref().unwrap_or(DEFAULT_SOURCE)),
            stay.total_cents.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// CONFIRMED and COMPLETED stays whose nights all fall inside the range.
pub async fn load_stays(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    range: &DateRange,
    property_id: Option<Uuid>,
) -> Result<Vec<StayRecord>, AppError> {
    if let Some(property_id) = property_id {
        property_service::get_property(conn, tenant_id, property_id).await?;
    }

    let stays = sqlx::query_as::<_, StayRecord>(
        r#"
        SELECT b.reference, b.property_id, p.name AS property_name, b.check_in, b.check_out,
               b.nights, b.adults + b.children AS guests, b.status, b.source, b.total_cents
        FROM bookings b
        JOIN properties p ON p.id = b.property_id
        WHERE b.tenant_id = $1
          AND ($2::uuid IS NULL OR b.property_id = $2)
          AND b.status IN ('CONFIRMED', 'COMPLETED')
          AND b.check_in >= $3
          AND b.check_out <= $4::date + 1
        ORDER BY b.check_in, b.reference
        "#,
    )
    .bind(tenant_id)
    .bind(property_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(stays)
}

/// Occupancy of the tenant's PUBLISHED properties (or the one given).
pub async fn occupancy_report(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    range: &DateRange,
    property_id: Option<Uuid>,
) -> Result<OccupancyReport, AppError> {
    if let Some(property_id) = property_id {
        property_service::get_property(conn, tenant_id, property_id).await?;
    }

    let properties: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM properties
        WHERE tenant_id = $1 AND status = 'PUBLISHED' AND ($2::uuid IS NULL OR id = $2)
        "#,
    )
    .bind(tenant_id)
    .bind(property_id)
    .fetch_one(&mut *conn)
    .await?;

    let occupied: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
        r#"
        SELECT b.check_in, b.check_out
        FROM bookings b
        JOIN properties p ON p.id = b.property_id
        WHERE p.tenant_id = $1 AND p.status = 'PUBLISHED'
          AND ($2::uuid IS NULL OR p.id = $2)
          AND b.status IN ('CONFIRMED', 'COMPLETED')
          AND b.check_in <= $4 AND b.check_out > $3
        UNION ALL
        SELECT bp.start_date, bp.end_date + 1
        FROM blocked_periods bp
        JOIN properties p ON p.id = bp.property_id
        WHERE p.tenant_id = $1 AND p.status = 'PUBLISHED'
          AND ($2::uuid IS NULL OR p.id = $2)
          AND bp.start_date <= $4 AND bp.end_date >= $3
        "#,
    )
    .bind(tenant_id)
    .bind(property_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(occupancy(range, properties, &occupied))
}

pub async fn overview(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    range: &DateRange,
    property_id: Option<Uuid>,
) -> Result<AnalyticsOverview, AppError> {
    let stays = load_stays(conn, tenant_id, range, property_id).await?;
    let occupancy = occupancy_report(conn, tenant_id, range, property_id).await?;

    Ok(AnalyticsOverview {
        range: *range,
        total_bookings: stays.len() as i64,
        total_revenue_cents: stays.iter().map(|s| s.total_cents).sum(),
        average_stay: average_stay(&stays),
        occupancy_rate: occupancy.occupancy_rate,
        top_properties: top_properties(range, &stays, OVERVIEW_TOP, TopPropertySort::Revenue),
        booking_sources: booking_sources(&stays),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::BookingStatus;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange { start, end }
    }

    fn stay(property: Uuid, name: &str, check_in: NaiveDate, nights: i32, total: i64) -> StayRecord {
        StayRecord {
            reference: format!("VS2507{:04}", nights),
            property_id: property,
            property_name: name.to_string(),
            check_in,
            check_out: check_in + chrono::Days::new(nights as u64),
            nights,
            guests: 2,
            status: BookingStatus::Confirmed,
            source: None,
            total_cents: total,
        }
    }

    #[test]
    fn months_are_clipped_to_the_range() {
        let spans = month_spans(&range(day(2025, 5, 20), day(2025, 7, 10)));
        let labels: Vec<&str> = spans.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-05", "2025-06", "2025-07"]);
        assert_eq!(spans[0].start, day(2025, 5, 20));
        assert_eq!(spans[0].end, day(2025, 5, 31));
        assert_eq!(spans[1].end, day(2025, 6, 30));
        assert_eq!(spans[2].end, day(2025, 7, 10));

        let december = month_spans(&range(day(2025, 12, 30), day(2026, 1, 2)));
        assert_eq!(december.len(), 2);
        assert_eq!(december[1].label, "2026-01");
    }

    #[test]
    fn departure_day_is_not_an_occupied_night() {
        // Stay 29 June to 3 July: nights of 29 and 30 June, 1 and 2 July
        let (from, to) = (day(2025, 6, 29), day(2025, 7, 3));
        assert_eq!(nights_within(from, to, day(2025, 6, 1), day(2025, 6, 30)), 2);
        assert_eq!(nights_within(from, to, day(2025, 7, 1), day(2025, 7, 31)), 2);
        assert_eq!(nights_within(from, to, day(2025, 7, 3), day(2025, 7, 31)), 0);
    }

    #[test]
    fn occupancy_splits_stays_across_months() {
        let report = occupancy(
            &range(day(2025, 6, 1), day(2025, 7, 31)),
            2,
            &[
                (day(2025, 6, 29), day(2025, 7, 3)),
                // Blocked 10-12 July, stored as [10, 13)
                (day(2025, 7, 10), day(2025, 7, 13)),
            ],
        );
        assert_eq!(report.monthly.len(), 2);
        assert_eq!(report.monthly[0].occupied_nights, 2);
        assert_eq!(report.monthly[0].total_nights, 60);
        assert_eq!(report.monthly[1].occupied_nights, 5);
        assert_eq!(report.monthly[1].total_nights, 62);
        assert_eq!(report.occupied_nights, 7);
        assert_eq!(report.occupancy_rate, percentage(7.0, 122.0));
    }

    #[test]
    fn no_properties_means_no_occupancy() {
        let report = occupancy(&range(day(2025, 6, 1), day(2025, 6, 30)), 0, &[]);
        assert_eq!(report.total_nights, 0);
        assert_eq!(report.occupancy_rate, 0.0);
        assert!(report.monthly.is_empty());
    }

    #[test]
    fn revenue_is_bucketed_by_check_in_month() {
        let villa = Uuid::new_v4();
        let stays = vec![
            stay(villa, "Villa", day(2025, 6, 28), 4, 80_000),
            stay(villa, "Villa", day(2025, 7, 5), 7, 140_000),
            stay(villa, "Villa", day(2025, 7, 20), 3, 61_000),
        ];
        let report = revenue(&range(day(2025, 6, 1), day(2025, 7, 31)), &stays);

        assert_eq!(report.total_revenue_cents, 281_000);
        assert_eq!(report.monthly[0].revenue_cents, 80_000);
        assert_eq!(report.monthly[1].bookings, 2);
        assert_eq!(report.average_revenue_per_night_cents, 20_071);
        assert_eq!(report.average_revenue_per_booking_cents, 93_667);
    }

    #[test]
    fn top_properties_rank_by_the_requested_measure() {
        let (villa, studio) = (Uuid::new_v4(), Uuid::new_v4());
        let stays = vec![
            stay(villa, "Villa", day(2025, 7, 1), 7, 200_000),
            stay(studio, "Studio", day(2025, 7, 1), 2, 15_000),
            stay(studio, "Studio", day(2025, 7, 10), 2, 15_000),
        ];
        let july = range(day(2025, 7, 1), day(2025, 7, 31));

        let by_revenue = top_properties(&july, &stays, 10, TopPropertySort::Revenue);
        assert_eq!(by_revenue[0].property_id, villa);
        assert_eq!(by_revenue[0].average_nightly_rate_cents, 28_571);
        assert_eq!(by_revenue[0].occupancy_rate, percentage(7.0, 31.0));

        let by_bookings = top_properties(&july, &stays, 1, TopPropertySort::Bookings);
        assert_eq!(by_bookings.len(), 1);
        assert_eq!(by_bookings[0].property_id, studio);
        assert_eq!(by_bookings[0].bookings, 2);
    }

    #[test]
    fn unnamed_sources_count_as_direct() {
        let villa = Uuid::new_v4();
        let mut airbnb = stay(villa, "Villa", day(2025, 7, 1), 3, 30_000);
        airbnb.source = Some("Airbnb".to_string());
        let stays = vec![airbnb, stay(villa, "Villa", day(2025, 7, 10), 1, 10_000)];

        let shares = booking_sources(&stays);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].source, "airbnb");
        assert_eq!(shares[0].percentage, 75.0);
        assert_eq!(shares[1].source, DEFAULT_SOURCE);
        assert_eq!(shares[1].count, 1);
    }

    #[test]
    fn average_stay_has_one_decimal() {
        let villa = Uuid::new_v4();
        let stays = vec![
            stay(villa, "Villa", day(2025, 7, 1), 3, 1),
            stay(villa, "Villa", day(2025, 7, 10), 4, 1),
            stay(villa, "Villa", day(2025, 7, 20), 4, 1),
        ];
        assert_eq!(average_stay(&stays), 3.7);
        assert_eq!(average_stay(&[]), 0.0);
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        let mut record = stay(Uuid::new_v4(), "Villa \"Les Pins\", Antibes", day(2025, 7, 1), 2, 500);
        record.source = Some("website".to_string());
        let csv = to_csv(&[record]);
        let mut lines = csv.lines();

        assert!(lines.next().unwrap().starts_with("reference,property,"));
        assert_eq!(
            lines.next().unwrap(),
            "VS25070002,\"Villa \"\"Les Pins\"\", Antibes\",2025-07-01,2025-07-03,2,2,CONFIRMED,website,500"
        );
        assert!(lines.next().is_none());
    }
}
