//! Parsing of frequency and duration strings.
//!
//! Accepts an optional positive integer multiplier followed by a fixed-length
//! unit: `S`, `T`/`min`, `H`, `D`, `W`. Calendar units (months, years) have no
//! fixed length and are rejected.

use chrono::Duration;
use fundu::{DurationParser, TimeUnit};

use crate::types::ChangepointError;

const PARSER: DurationParser = DurationParser::builder()
    .time_units(&[
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
        TimeUnit::Week,
    ])
    .number_is_optional()
    .disable_fraction()
    .disable_exponent()
    .disable_infinity()
    .build();

/// fundu's identifier for a frequency alias.
fn unit_id(alias: &str) -> Option<&'static str> {
    match alias {
        "S" | "s" => Some("s"),
        "T" | "min" => Some("m"),
        "H" | "h" => Some("h"),
        "D" | "d" => Some("d"),
        "W" | "w" => Some("w"),
        _ => None,
    }
}

/// Parse a frequency such as `"D"`, `"7D"`, `"12H"` or `"30min"`.
///
/// # Example
/// ```
/// use trend_changepoint::parse_duration;
/// assert_eq!(parse_duration("30D").unwrap(), chrono::Duration::days(30));
/// assert!(parse_duration("M").is_err());
/// ```
pub fn parse_duration(freq: &str) -> Result<Duration, ChangepointError> {
    let malformed = || ChangepointError::MalformedFrequency(freq.to_string());
    let trimmed = freq.trim();
    let (count, alias) =
        trimmed.split_at(trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic()).len());
    // a bare number would fall back to seconds
    let unit = unit_id(alias).ok_or_else(malformed)?;

    let parsed = PARSER
        .parse(&format!("{count}{unit}"))
        .map_err(|_| malformed())?;
    let std_duration: std::time::Duration = parsed.try_into().map_err(|_| malformed())?;
    if std_duration.is_zero() {
        return Err(malformed());
    }
    Duration::from_std(std_duration).map_err(|_| malformed())
}

/// Parse an optional duration field.
pub(crate) fn parse_optional(freq: Option<&str>) -> Result<Option<Duration>, ChangepointError> {
    freq.map(parse_duration).transpose()
}
