//! Timestamp helpers for the solicitations API.
//!
//! The API takes window bounds as `DDMMYYYYHHMMSS` in Brazilian civil time.
//! São Paulo has observed a fixed UTC-3 offset since daylight saving was
//! abolished in 2019.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// `strftime` pattern of window bounds sent to the API.
pub const API_TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

/// `strftime` pattern of the admission date field.
pub const ADMISSION_DATE_FORMAT: &str = "%d%m%Y";

const SAO_PAULO_OFFSET_SECS: i32 = 3 * 3600;

/// The America/Sao_Paulo offset (UTC-3).
pub fn sao_paulo() -> FixedOffset {
    FixedOffset::west_opt(SAO_PAULO_OFFSET_SECS).expect("UTC-3 is a valid offset")
}

/// Current instant on the São Paulo wall clock.
pub fn now_sao_paulo() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&sao_paulo())
}

/// Formats a civil timestamp as `DDMMYYYYHHMMSS`.
pub fn format_api_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(API_TIMESTAMP_FORMAT).to_string()
}

/// Parses a `DDMMYYYYHHMMSS` window bound.
pub fn parse_api_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), API_TIMESTAMP_FORMAT).ok()
}

/// Parses the validity timestamp of a solicitation.
///
/// The API has returned this field both in the window format and in ISO
/// forms, so every known variant is tried. Offsets are converted to
/// São Paulo civil time before the offset is dropped.
pub fn parse_validity_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(ts) = parse_api_timestamp(raw) {
        return Some(ts);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&sao_paulo()).naive_local());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parses an admission date in `DDMMYYYY` form.
pub fn parse_admission_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(raw, ADMISSION_DATE_FORMAT).ok()
}
