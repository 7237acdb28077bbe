use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime};

use crate::models::QuarterRange;

/// Largest serial a spreadsheet will render as a date (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDateOutcome {
    Parsed,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDate {
    pub date: NaiveDate,
    pub outcome: StartDateOutcome,
}

impl StartDate {
    pub fn is_fallback(&self) -> bool {
        self.outcome == StartDateOutcome::Fallback
    }
}

/// Unparseable or blank start dates anchor on `today`.
pub fn resolve_start_date(raw: &str, today: NaiveDate) -> StartDate {
    match parse_loose_date(raw) {
        Some(date) => StartDate {
            date,
            outcome: StartDateOutcome::Parsed,
        },
        None => StartDate {
            date: today,
            outcome: StartDateOutcome::Fallback,
        },
    }
}

pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    parse_iso(value)
        .or_else(|| parse_numeric_day_first(value))
        .or_else(|| parse_serial(value))
        .or_else(|| parse_named_month(value))
}

fn parse_iso(value: &str) -> Option<NaiveDate> {
    // chrono's %Y accepts short years, so insist on a four digit year up front.
    let bytes = value.as_bytes();
    if bytes.len() < 10 || !bytes[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.date_naive());
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(value, format) {
            return Some(stamp.date());
        }
    }

    None
}

/// `dd/mm/yyyy`, `dd-mm-yy`, `dd.mm.yyyy` or unpadded `yyyy-m-d`, optionally
/// followed by a time. Falls back to month-first only when the day-first reading is impossible.
fn parse_numeric_day_first(value: &str) -> Option<NaiveDate> {
    let date_part = value.split_whitespace().next()?;
    let parts: Vec<&str> = date_part
        .split(|c| c == '/' || c == '-' || c == '.')
        .collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|part| part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    if parts[1].len() > 2 {
        return None;
    }
    if parts[0].len() == 4 && parts[2].len() <= 2 {
        // Year first without zero padding, e.g. `2024-1-5`.
        return NaiveDate::from_ymd_opt(
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
        );
    }
    if parts[0].len() > 2 {
        return None;
    }

    let first: u32 = parts[0].parse().ok()?;
    let second: u32 = parts[1].parse().ok()?;
    let year: i32 = match parts[2].len() {
        2 => 2000 + parts[2].parse::<i32>().ok()?,
        4 => parts[2].parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

/// Spreadsheet day serials count from 1899-12-30.
fn parse_serial(value: &str) -> Option<NaiveDate> {
    let serial: f64 = value.parse().ok()?;
    if !serial.is_finite() || !(1.0..=MAX_SERIAL_DAY).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn parse_named_month(value: &str) -> Option<NaiveDate> {
    ["%d %b %Y", "%d %B %Y", "%d-%b-%Y", "%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Calendar-month difference; the day of month is ignored.
pub fn months_elapsed(start: NaiveDate, today: NaiveDate) -> i32 {
    (today.year() - start.year()) * 12 + today.month() as i32 - start.month() as i32
}

/// First day of the month `offset` months after the month of `start`.
pub fn month_start_after(start: NaiveDate, offset: i32) -> Option<NaiveDate> {
    let absolute = start.year() * 12 + start.month0() as i32 + offset;
    NaiveDate::from_ymd_opt(absolute.div_euclid(12), absolute.rem_euclid(12) as u32 + 1, 1)
}

/// Calendar spans of consecutive three-month quarters counted from `start`.
pub fn quarter_ranges(start: NaiveDate, labels: &[String]) -> Vec<QuarterRange> {
    let mut ranges = Vec::with_capacity(labels.len());
    let mut cursor = start;

    for (index, label) in labels.iter().enumerate() {
        let Some(end) = start.checked_add_months(Months::new(3 * (index as u32 + 1))) else {
            break;
        };
        ranges.push(QuarterRange {
            label: label.clone(),
            start: cursor,
            end,
        });
        cursor = end;
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_dates_and_timestamps() {
        assert_eq!(parse_loose_date("2024-01-15"), Some(date(2024, 1, 15)));
        assert_eq!(
            parse_loose_date("2024-01-15T08:30:00.000Z"),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_loose_date("2024-01-15 08:30:00"),
            Some(date(2024, 1, 15))
        );
    }

    #[test]
    fn numeric_dates_read_day_first() {
        assert_eq!(parse_loose_date("01/02/2024"), Some(date(2024, 2, 1)));
        assert_eq!(parse_loose_date("15-01-24"), Some(date(2024, 1, 15)));
        assert_eq!(
            parse_loose_date("15/01/2024 10:22:41"),
            Some(date(2024, 1, 15))
        );
        // Impossible as day-first, so read month-first.
        assert_eq!(parse_loose_date("01/15/2024"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn unpadded_year_first_dates_parse() {
        assert_eq!(parse_loose_date("2024-1-5"), Some(date(2024, 1, 5)));
        assert_eq!(parse_loose_date("2024/12/3 08:15"), Some(date(2024, 12, 3)));
        assert_eq!(parse_loose_date("2024-13-5"), None);
        assert_eq!(parse_loose_date("2024-1-2025"), None);
    }

    #[test]
    fn parses_spreadsheet_serials() {
        assert_eq!(parse_loose_date("45292"), Some(date(2024, 1, 1)));
        assert_eq!(parse_loose_date("45292.75"), Some(date(2024, 1, 1)));
        assert_eq!(parse_loose_date("-3"), None);
    }

    #[test]
    fn parses_named_months() {
        assert_eq!(parse_loose_date("15 Jan 2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_loose_date("March 3, 2023"), Some(date(2023, 3, 3)));
    }

    #[test]
    fn unparseable_start_falls_back_to_today() {
        let today = date(2025, 6, 9);
        let start = resolve_start_date("sometime next year", today);
        assert_eq!(start.date, today);
        assert!(start.is_fallback());

        let blank = resolve_start_date("   ", today);
        assert!(blank.is_fallback());

        let parsed = resolve_start_date("01/09/2023", today);
        assert_eq!(parsed.outcome, StartDateOutcome::Parsed);
        assert_eq!(parsed.date, date(2023, 9, 1));
    }

    #[test]
    fn months_elapsed_ignores_day_of_month() {
        assert_eq!(months_elapsed(date(2024, 1, 31), date(2024, 2, 1)), 1);
        assert_eq!(months_elapsed(date(2024, 1, 1), date(2024, 1, 31)), 0);
        assert_eq!(months_elapsed(date(2022, 1, 1), date(2024, 7, 1)), 30);
        assert_eq!(months_elapsed(date(2024, 5, 1), date(2024, 3, 1)), -2);
    }

    #[test]
    fn month_start_after_wraps_years() {
        assert_eq!(month_start_after(date(2024, 11, 20), 3), Some(date(2025, 2, 1)));
        assert_eq!(month_start_after(date(2024, 1, 5), -1), Some(date(2023, 12, 1)));
        assert_eq!(month_start_after(date(2024, 1, 5), 0), Some(date(2024, 1, 1)));
    }

    #[test]
    fn quarter_ranges_chain_end_to_start() {
        let labels: Vec<String> = ["Y1Q1", "Y1Q2", "Y1Q3"].iter().map(|s| s.to_string()).collect();
        let ranges = quarter_ranges(date(2024, 1, 31), &labels);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].start, date(2024, 1, 31));
        assert_eq!(ranges[0].end, date(2024, 4, 30));
        assert_eq!(ranges[1].start, date(2024, 4, 30));
        assert_eq!(ranges[2].end, date(2024, 10, 31));
        assert_eq!(ranges[2].label, "Y1Q3");
    }
}
