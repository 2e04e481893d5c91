//! Defensive RFC 2822 date parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses a message date.
///
/// Accepts RFC 2822 dates with or without the weekday, trailing comments
/// such as `(UTC)` or `(PST)`, and obsolete zone names. Returns `None` if
/// the value cannot be understood.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let cleaned = strip_comments(value);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(cleaned) {
        return Some(date.with_timezone(&Utc));
    }

    // Drop a weekday chrono rejected (e.g. a mismatching one).
    let without_weekday = cleaned
        .split_once(',')
        .map_or(cleaned, |(_, rest)| rest.trim());
    if let Ok(date) = DateTime::parse_from_rfc2822(without_weekday) {
        return Some(date.with_timezone(&Utc));
    }

    // Zone-less dates are taken as UTC.
    NaiveDateTime::parse_from_str(without_weekday, "%d %b %Y %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(without_weekday, "%d %b %Y %H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a message date, falling back to the current time.
#[must_use]
pub fn parse_date_or_now(value: &str) -> DateTime<Utc> {
    parse_date(value).unwrap_or_else(Utc::now)
}

fn strip_comments(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut depth = 0u32;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike};

    use super::*;

    #[test]
    fn test_parse_rfc2822() {
        let date = parse_date("Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2003, 7, 1, 8, 52, 37).unwrap());
    }

    #[test]
    fn test_parse_with_comment() {
        let date = parse_date("Mon, 7 Feb 1994 21:52:25 -0800 (PST)").unwrap();
        assert_eq!(date.hour(), 5);
        assert_eq!(date.day(), 8);
    }

    #[test]
    fn test_parse_without_weekday() {
        let date = parse_date("17 Jul 1996 02:44:25 GMT").unwrap();
        assert_eq!(date.year(), 1996);
    }

    #[test]
    fn test_parse_without_zone() {
        let date = parse_date("17 Jul 1996 02:44:25").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(1996, 7, 17, 2, 44, 25).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());

        let before = Utc::now();
        let date = parse_date_or_now("yesterday-ish");
        assert!(date >= before);
    }
}
