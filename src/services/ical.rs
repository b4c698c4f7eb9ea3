//! Minimal iCalendar (RFC 5545) reader and writer for availability sync.
//!
//! Only what channel managers exchange is supported: all-day `VEVENT`s with
//! `DTSTART`/`DTEND`, a `UID` and a `SUMMARY`. Date-times are truncated to
//! their calendar date.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::AppError;

const PRODID: &str = "-//Villa SaaS//Property Calendar//FR";
const MAX_LINE_OCTETS: usize = 75;

/// Event written to an exported calendar. `end` is exclusive, as in `DTEND`.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub uid: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: String,
    pub description: Option<String>,
}

/// Event read from an imported calendar. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEvent {
    pub uid: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: Option<String>,
}

/// Result of parsing: usable events plus one message per rejected event.
#[derive(Debug, Default)]
pub struct ParsedCalendar {
    pub events: Vec<ImportedEvent>,
    pub errors: Vec<String>,
}

/// Render a `VCALENDAR` with CRLF line endings and folded long lines.
pub fn render_calendar(name: &str, events: &[CalendarEvent], stamp: DateTime<Utc>) -> String {
    let stamp = stamp.format("%Y%m%dT%H%M%SZ").to_string();
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(name)),
    ];

    for event in events {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}", escape_text(&event.uid)));
        lines.push(format!("DTSTAMP:{stamp}"));
        lines.push(format!("DTSTART;VALUE=DATE:{}", event.start.format("%Y%m%d")));
        lines.push(format!("DTEND;VALUE=DATE:{}", event.end.format("%Y%m%d")));
        lines.push(format!("SUMMARY:{}", escape_text(&event.summary)));
        if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(format!("DESCRIPTION:{}", escape_text(description)));
        }
        lines.push("END:VEVENT".to_string());
    }
    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in lines {
        out.push_str(&fold_line(&line));
        out.push_str("\r\n");
    }
    out
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split a content line into 75-octet chunks without breaking UTF-8 sequences.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        // Continuation lines start with a space, which counts toward the limit
        if width + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}

fn unfold_lines(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

/// `YYYYMMDD` or `YYYYMMDDTHHMMSS[Z]`, truncated to the date.
fn parse_ical_date(value: &str) -> Option<NaiveDate> {
    let date = value.get(..8)?;
    NaiveDate::parse_from_str(date, "%Y%m%d").ok()
}

#[derive(Default)]
struct EventBuilder {
    uid: Option<String>,
    start: Option<String>,
    end: Option<String>,
    summary: Option<String>,
}

impl EventBuilder {
    fn build(self) -> Result<ImportedEvent, String> {
        let label = self.uid.clone().unwrap_or_else(|| "without UID".to_string());
        let start = self
            .start
            .as_deref()
            .and_then(parse_ical_date)
            .ok_or_else(|| format!("Invalid dates for event {label}"))?;
        let end = match self.end.as_deref() {
            Some(raw) => parse_ical_date(raw).ok_or_else(|| format!("Invalid dates for event {label}"))?,
            None => start
                .checked_add_days(Days::new(1))
                .ok_or_else(|| format!("Invalid dates for event {label}"))?,
        };
        if end <= start {
            return Err(format!("Event {label} ends before it starts"));
        }
        Ok(ImportedEvent {
            uid: self.uid,
            start,
            end,
            summary: self.summary,
        })
    }
}

/// Parse the `VEVENT`s of a calendar.
///
/// # Errors
///
/// `InvalidRequest` when the content is not a `VCALENDAR`. Malformed events
/// do not fail the parse; they are reported in [`ParsedCalendar::errors`].
pub fn parse_calendar(content: &str) -> Result<ParsedCalendar, AppError> {
    let lines = unfold_lines(content);
    if !lines
        .first()
        .is_some_and(|l| l.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(AppError::InvalidRequest("Invalid iCal format".to_string()));
    }

    let mut parsed = ParsedCalendar::default();
    let mut current: Option<EventBuilder> = None;

    for line in &lines {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let name = head.split(';').next().unwrap_or_default().to_ascii_uppercase();

        match (name.as_str(), current.as_mut()) {
            ("BEGIN", None) if value.eq_ignore_ascii_case("VEVENT") => {
                current = Some(EventBuilder::default());
            }
            ("END", Some(_)) if value.eq_ignore_ascii_case("VEVENT") => {
                if let Some(builder) = current.take() {
                    match builder.build() {
                        Ok(event) => parsed.events.push(event),
                        Err(message) => parsed.errors.push(message),
                    }
                }
            }
            ("UID", Some(event)) => event.uid = Some(unescape_text(value)),
            ("DTSTART", Some(event)) => event.start = Some(value.trim().to_string()),
            ("DTEND", Some(event)) => event.end = Some(value.trim().to_string()),
            ("SUMMARY", Some(event)) => event.summary = Some(unescape_text(value)),
            _ => {}
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renders_all_day_events_with_crlf() {
        let stamp = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let events = vec![CalendarEvent {
            uid: "b-1".into(),
            start: date(2025, 7, 12),
            end: date(2025, 7, 19),
            summary: "Réservation VS25070001".into(),
            description: Some("Camille Durand, 3 personnes".into()),
        }];
        let ics = render_calendar("Villa Les Pins", &events, stamp);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20250712\r\n"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250719\r\n"));
        assert!(ics.contains("DTSTAMP:20250601T080000Z\r\n"));
        assert!(ics.contains("DESCRIPTION:Camille Durand\\, 3 personnes\r\n"));
    }

    #[test]
    fn long_lines_are_folded_within_75_octets() {
        let long = "é".repeat(60);
        let folded = fold_line(&format!("SUMMARY:{long}"));
        for part in folded.split("\r\n") {
            assert!(part.len() <= MAX_LINE_OCTETS);
        }
        assert_eq!(unfold_lines(&folded), vec![format!("SUMMARY:{long}")]);
    }

    #[test]
    fn parses_dates_and_date_times() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:abc@airbnb.com\r\n\
                   DTSTART;VALUE=DATE:20250712\r\n\
                   DTEND;VALUE=DATE:20250719\r\n\
                   SUMMARY:Reserved\r\n\
                   END:VEVENT\r\n\
                   BEGIN:VEVENT\r\n\
                   DTSTART:20250801T150000Z\r\n\
                   DTEND:20250803T100000Z\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let parsed = parse_calendar(ics).unwrap();

        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.events.len(), 2);
        assert_eq!(parsed.events[0].uid.as_deref(), Some("abc@airbnb.com"));
        assert_eq!(parsed.events[0].start, date(2025, 7, 12));
        assert_eq!(parsed.events[0].end, date(2025, 7, 19));
        assert_eq!(parsed.events[1].end, date(2025, 8, 3));
    }

    #[test]
    fn missing_dtend_means_one_day() {
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART;VALUE=DATE:20251224\nEND:VEVENT\nEND:VCALENDAR\n";
        let parsed = parse_calendar(ics).unwrap();
        assert_eq!(parsed.events[0].end, date(2025, 12, 25));
    }

    #[test]
    fn bad_events_are_reported_not_fatal() {
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\nDTSTART:garbage\nEND:VEVENT\nEND:VCALENDAR\n";
        let parsed = parse_calendar(ics).unwrap();
        assert!(parsed.events.is_empty());
        assert_eq!(parsed.errors, vec!["Invalid dates for event x".to_string()]);
    }

    #[test]
    fn rejects_non_calendar_content() {
        assert!(matches!(
            parse_calendar("<html></html>"),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn summary_round_trips_through_escaping() {
        let text = "Blocked; owner, family\\friends";
        assert_eq!(unescape_text(&escape_text(text)), text);
    }
}
