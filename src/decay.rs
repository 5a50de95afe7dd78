//! Physical decay of iodine-131.

use chrono::NaiveDateTime;
use thiserror::Error;

use units::{day, day_, Time};
use units::todo::Activityf64;

use crate::timeline::{parse_clinical, TimeParseError};

/// Half-life of I-131
pub fn half_life() -> Time { day(8.02) }

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecayError {
    #[error("activity `{0}` is not a number")]
    NonNumericActivity(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),
}

/// Activity at `at` of a source holding `activity` at `reference`. Queries
/// earlier than `reference` give a larger activity.
pub fn decay_corrected(activity: Activityf64, reference: NaiveDateTime, at: NaiveDateTime) -> Activityf64 {
    let elapsed_days = (at - reference).num_milliseconds() as f64 / 86_400_000.0;
    activity * (-std::f64::consts::LN_2 / day_(half_life()) * elapsed_days).exp()
}

/// Activity administered to the patient, from the form fields: the activity
/// measured in the calibrator, when it was measured, and when it was given.
pub fn administered_activity(activity: &str, measured_at: &str, administered_at: &str) -> Result<Activityf64, DecayError> {
    let value: f64 = activity.trim().parse()
        .map_err(|_| DecayError::NonNumericActivity(activity.into()))?;
    if !value.is_finite() { return Err(DecayError::NonNumericActivity(activity.into())) }
    let measured_at     = parse_clinical(measured_at)?;
    let administered_at = parse_clinical(administered_at)?;
    Ok(decay_corrected(value, measured_at, administered_at))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    fn t0() -> NaiveDateTime { parse_clinical("01.06.2025 12:00").unwrap() }

    #[test]
    fn no_elapsed_time_no_decay() {
        assert_eq!(decay_corrected(537.0, t0(), t0()), 537.0);
    }

    #[test]
    fn earlier_query_gives_more_activity() {
        assert!(decay_corrected(100.0, t0(), t0() - Duration::hours(5)) > 100.0);
    }

    #[test]
    fn administered_activity_from_form_fields() {
        let a = administered_activity("800", "01.06.2025 12:00", "09.06.2025 12:28").unwrap();
        // 8 days and 28 minutes is 8.0194 days
        assert_float_eq!(a, 800.0 * (-std::f64::consts::LN_2 / 8.02 * (8.0 + 28.0 / 1440.0)).exp(), r2nd <= 1e-12);
        assert_float_eq!(a, 400.0, r2nd <= 2e-4);
    }

    #[test]
    fn bad_form_fields() {
        assert_eq!(administered_activity("8OO", "01.06.2025 12:00", "02.06.2025 12:00"),
                   Err(DecayError::NonNumericActivity("8OO".into())));
        assert!(matches!(administered_activity("800", "01-06-2025 12:00", "02.06.2025 12:00"),
                         Err(DecayError::Time(_))));
    }

    proptest! {
        #[test]
        fn one_half_life_halves(activity in 1e-3..1e5_f64) {
            let after = t0() + Duration::minutes((8.02 * 24.0 * 60.0) as i64);
            let a = decay_corrected(activity, t0(), after);
            prop_assert!((a / (activity / 2.0) - 1.0).abs() < 0.01);
        }
    }
}
