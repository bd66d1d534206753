//! Resolution of short due-date expressions such as `2d`, `tomorrow` or
//! `2025-07-01` into calendar dates.

use chrono::{Days, Months, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static RELATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([dwmy])$").unwrap());

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Resolve `expression` relative to `today`.
///
/// Forms are tried in order: relative offset (`<n>d|w|m|y`), named literal
/// (`today`, `tomorrow`, `next week`, `1 week`), then an exact `YYYY-MM-DD`
/// date. Anything else, including arithmetic overflow, yields `None`.
pub fn resolve(expression: &str, today: NaiveDate) -> Option<NaiveDate> {
    let expr = expression.trim().to_lowercase();

    if let Some(caps) = RELATIVE_RE.captures(&expr) {
        let amount: u32 = caps[1].parse().ok()?;
        return add_offset(today, amount, &caps[2]);
    }

    match expr.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        "next week" | "1 week" => return today.checked_add_days(Days::new(7)),
        _ => {}
    }

    if ISO_DATE_RE.is_match(&expr) {
        return NaiveDate::parse_from_str(&expr, DATE_FORMAT).ok();
    }

    tracing::debug!(expression = %expr, "unrecognised due date expression");
    None
}

/// Month and year steps clamp to the last day of a shorter target month
/// (Jan 31 + 1m = Feb 28/29).
fn add_offset(today: NaiveDate, amount: u32, unit: &str) -> Option<NaiveDate> {
    match unit {
        "d" => today.checked_add_days(Days::new(u64::from(amount))),
        "w" => today.checked_add_days(Days::new(u64::from(amount) * 7)),
        "m" => today.checked_add_months(Months::new(amount)),
        "y" => today.checked_add_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

/// Format a date the way it is persisted.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_relative_days_and_weeks() {
        let today = day(2025, 6, 28);
        assert_eq!(resolve("2d", today), Some(day(2025, 6, 30)));
        assert_eq!(resolve("1w", today), Some(day(2025, 7, 5)));
        assert_eq!(resolve("0d", today), Some(today));
    }

    #[test]
    fn test_relative_months_and_years_are_calendar_aware() {
        assert_eq!(resolve("1m", day(2025, 1, 31)), Some(day(2025, 2, 28)));
        assert_eq!(resolve("1m", day(2024, 1, 31)), Some(day(2024, 2, 29)));
        assert_eq!(resolve("1y", day(2024, 2, 29)), Some(day(2025, 2, 28)));
        assert_eq!(resolve("3m", day(2025, 11, 15)), Some(day(2026, 2, 15)));
    }

    #[test]
    fn test_named_literals() {
        let today = day(2025, 12, 31);
        assert_eq!(resolve("today", today), Some(today));
        assert_eq!(resolve("Tomorrow", today), Some(day(2026, 1, 1)));
        assert_eq!(resolve("next week", today), Some(day(2026, 1, 7)));
        assert_eq!(resolve("1 week", today), Some(day(2026, 1, 7)));
    }

    #[test]
    fn test_iso_dates() {
        let today = day(2025, 1, 1);
        assert_eq!(resolve("2025-07-01", today), Some(day(2025, 7, 1)));
        assert_eq!(resolve(" 2024-02-29 ", today), Some(day(2024, 2, 29)));
        assert_eq!(resolve("2025-02-30", today), None);
        assert_eq!(resolve("2025-7-1", today), None);
    }

    #[test]
    fn test_unrecognised_expressions() {
        let today = day(2025, 1, 1);
        assert_eq!(resolve("gibberish", today), None);
        assert_eq!(resolve("-2d", today), None);
        assert_eq!(resolve("2 d", today), None);
        assert_eq!(resolve("2h", today), None);
        assert_eq!(resolve("", today), None);
        assert_eq!(resolve("99999999999d", today), None);
        assert_eq!(resolve("4000000000y", today), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(day(2025, 7, 1)), "2025-07-01");
    }
}
