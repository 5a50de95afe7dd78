//! Clinical timestamps and the elapsed times between them.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Format of timestamps typed in by the operator: `01.06.2025 12:00`
pub const CLINICAL_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Formats of the acquisition date and time recorded by the camera
pub const ACQUISITION_DATE_FORMAT: &str = "%Y%m%d";
pub const ACQUISITION_TIME_FORMAT: &str = "%H%M%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeParseError {
    #[error("cannot parse `{text}` as `{format}`: {source}")]
    Format { text: String, format: String, #[source] source: chrono::ParseError },

    #[error("{dates} acquisition dates but {times} acquisition times")]
    LengthMismatch { dates: usize, times: usize },
}

fn parse(text: &str, format: &str) -> Result<NaiveDateTime, TimeParseError> {
    NaiveDateTime::parse_from_str(text, format)
        .map_err(|source| TimeParseError::Format { text: text.into(), format: format.into(), source })
}

/// Parse an operator-entered `dd.mm.YYYY HH:MM` timestamp.
pub fn parse_clinical(text: &str) -> Result<NaiveDateTime, TimeParseError> {
    parse(text.trim(), CLINICAL_FORMAT)
}

/// Combine camera date `YYYYMMDD` and time `HHMMSS[.ffffff]`. Fractions of a
/// second are dropped.
pub fn parse_acquisition(date: &str, time: &str) -> Result<NaiveDateTime, TimeParseError> {
    let whole_seconds = time.split('.').next().unwrap_or(time);
    parse(&format!("{} {}", date.trim(), whole_seconds.trim()),
          &format!("{ACQUISITION_DATE_FORMAT} {ACQUISITION_TIME_FORMAT}"))
}

/// Signed hours from `from` to `to`
pub fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Hours elapsed between the `reference` clinical timestamp and each
/// acquisition.
pub fn time_differences<S: AsRef<str>>(reference: &str, dates: &[S], times: &[S]) -> Result<Vec<f64>, TimeParseError> {
    if dates.len() != times.len() {
        return Err(TimeParseError::LengthMismatch { dates: dates.len(), times: times.len() })
    }
    let reference = parse_clinical(reference)?;
    dates.iter().zip(times)
        .map(|(d, t)| Ok(hours_between(reference, parse_acquisition(d.as_ref(), t.as_ref())?)))
        .collect()
}
