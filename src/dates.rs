//! Turns relative post-age phrases ("3 days ago", "Today") into calendar dates.
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("post age {0:?} has no day count")]
    Unrecognized(String),
    #[error("post age {0:?} has an out-of-range day count")]
    OutOfRange(String),
}

/// Resolve `post_age` against the date the batch was captured.
///
/// "Just posted" and "Today" (any case) map to `reference_date`; otherwise the
/// first run of digits is taken as a day count, so "30+ days ago" resolves to
/// thirty days earlier.
pub fn resolve(post_age: &str, reference_date: NaiveDate) -> Result<NaiveDate, DateParseError> {
    let phrase = post_age.trim();
    if phrase.eq_ignore_ascii_case("just posted") || phrase.eq_ignore_ascii_case("today") {
        return Ok(reference_date);
    }
    let digits = DAYS_RE
        .find(phrase)
        .ok_or_else(|| DateParseError::Unrecognized(post_age.to_string()))?;
    let days: u64 = digits
        .as_str()
        .parse()
        .map_err(|_| DateParseError::OutOfRange(post_age.to_string()))?;
    reference_date
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| DateParseError::OutOfRange(post_age.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn same_day_phrases() {
        let today = d(2020, 9, 14);
        assert_eq!(resolve("Today", today), Ok(today));
        assert_eq!(resolve("Just posted", today), Ok(today));
        assert_eq!(resolve("  just POSTED ", today), Ok(today));
    }

    #[test]
    fn day_counts_subtract() {
        let today = d(2020, 9, 14);
        assert_eq!(resolve("3 days ago", today), Ok(d(2020, 9, 11)));
        assert_eq!(resolve("1 day ago", today), Ok(d(2020, 9, 13)));
        assert_eq!(resolve("30+ days ago", today), Ok(d(2020, 8, 15)));
        assert_eq!(resolve("20 days ago", d(2020, 3, 5)), Ok(d(2020, 2, 14)));
    }

    #[test]
    fn deterministic_across_calls() {
        let today = d(2021, 1, 2);
        assert_eq!(resolve("5 days ago", today), resolve("5 days ago", today));
    }

    #[test]
    fn phrase_without_digits_is_an_error() {
        let err = resolve("Active recently", d(2020, 9, 14)).unwrap_err();
        assert_eq!(err, DateParseError::Unrecognized("Active recently".into()));
        assert!(resolve("", d(2020, 9, 14)).is_err());
    }

    #[test]
    fn absurd_counts_are_out_of_range() {
        let err = resolve("99999999999999999999999 days ago", d(2020, 9, 14)).unwrap_err();
        assert!(matches!(err, DateParseError::OutOfRange(_)));
        let err = resolve("999999999 days ago", d(2020, 9, 14)).unwrap_err();
        assert!(matches!(err, DateParseError::OutOfRange(_)));
    }
}
