//! Absorbed dose from a fitted uptake curve.
//!
//! The time-integrated activity coefficient (TIAC, days) is obtained both by
//! integrating the model to infinity and by numerically integrating it over
//! the sampled interval. The dose factor relation `E(m) = (m^¼ + 18) / 7.2`
//! (Gy·g / (MBq·day)) links TIAC, organ mass and administered activity to the
//! absorbed dose.

use serde::Serialize;

use units::{g_, g_ml, Mass, MassDensity, Volume};
use units::todo::{Activityf64, Uptakef64};

use crate::quadrature::{integrate, IntegrationError};
use crate::uptake::Rates;

/// Density of thyroid tissue
pub fn tissue_density() -> MassDensity { g_ml(1.045) }

/// Doses (Gy) for which the required administered activity is tabulated
pub const TARGET_DOSES: [f64; 6] = [150.0, 200.0, 250.0, 300.0, 350.0, 400.0];

const HOURS_PER_DAY: f64 = 24.0;

/// `∫₀^∞ f dt` in days, scaled by `ratio`
pub fn tiac_closed_form(rates: &Rates, ratio: f64) -> f64 {
    ratio * rates.k_t / (rates.k_B * rates.k_T) / HOURS_PER_DAY
}

/// `∫ f dt` in days over `[first, last]` hours, scaled by `ratio`
pub fn tiac_numeric(rates: &Rates, first: f64, last: f64, ratio: f64) -> Result<f64, IntegrationError> {
    let integral = integrate(|t| rates.uptake(t), first, last)?;
    Ok(ratio * integral.value / HOURS_PER_DAY)
}

/// Percentage of the closed-form TIAC *not* covered by the sampled interval
pub fn fit_fraction_deviation(numeric: f64, closed_form: f64) -> f64 {
    100.0 - 100.0 * numeric / closed_form
}

/// Effective half-life (days) from the clearance rate (1/h)
pub fn effective_half_life(rates: &Rates) -> f64 {
    std::f64::consts::LN_2 / rates.k_T / HOURS_PER_DAY
}

pub fn organ_mass(volume: Volume) -> Mass { volume * tissue_density() }

/// Gy·g / (MBq·day)
pub fn dose_factor(mass: Mass) -> f64 { (g_(mass).powf(0.25) + 18.0) / 7.2 }

/// Absorbed dose (Gy)
pub fn absorbed_dose(activity: Activityf64, mass: Mass, tiac: f64) -> f64 {
    activity * dose_factor(mass) * tiac / g_(mass)
}

/// Activity (MBq) needed to deliver `dose` Gy
pub fn required_activity(dose: f64, mass: Mass, tiac: f64) -> Activityf64 {
    g_(mass) * dose / (dose_factor(mass) * tiac)
}

/// Ratio anchoring the model to an independently measured SPECT uptake (in
/// percent) at `t` hours. No measurement, or zero, means no rescaling.
pub fn spect_ratio(spect_uptake_percent: Option<f64>, rates: &Rates, t: f64) -> f64 {
    match spect_uptake_percent {
        Some(percent) if percent != 0.0 => 0.01 * percent / rates.uptake(t),
        _ => 1.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequiredActivity {
    pub dose: f64,
    pub activity: Activityf64,
}

/// Everything derived from one fit for one organ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseReport {
    pub spect_ratio: f64,
    pub tiac: f64,
    pub tiac_numeric: f64,
    pub fit_fraction_deviation: f64,
    pub effective_half_life: f64,
    /// g
    pub organ_mass: f64,
    pub dose_factor: f64,
    pub administered_activity: Activityf64,
    pub absorbed_dose: f64,
    pub required: Vec<RequiredActivity>,
}

/// Dose quantities for an organ of `volume` which received `activity` MBq,
/// given a fit to samples spanning `first..last` hours.
pub fn dose_report(
    rates: &Rates,
    (first, last): (f64, f64),
    activity: Activityf64,
    volume: Volume,
    spect_ratio: f64,
) -> Result<DoseReport, IntegrationError> {
    let tiac = tiac_closed_form(rates, spect_ratio);
    let tiac_numeric = tiac_numeric(rates, first, last, spect_ratio)?;
    let mass = organ_mass(volume);
    let report = DoseReport {
        spect_ratio,
        tiac,
        tiac_numeric,
        fit_fraction_deviation: fit_fraction_deviation(tiac_numeric, tiac),
        effective_half_life: effective_half_life(rates),
        organ_mass: g_(mass),
        dose_factor: dose_factor(mass),
        administered_activity: activity,
        absorbed_dose: absorbed_dose(activity, mass, tiac),
        required: TARGET_DOSES.iter()
            .map(|&dose| RequiredActivity { dose, activity: required_activity(dose, mass, tiac) })
            .collect(),
    };
    log::info!("TIAC {:.3} d, T_eff {:.3} d, dose {:.3} Gy", report.tiac, report.effective_half_life, report.absorbed_dose);
    Ok(report)
}

/// Uptake fraction predicted at `t` hours, rescaled by `ratio`
pub fn scaled_uptake(rates: &Rates, t: f64, ratio: f64) -> Uptakef64 { ratio * rates.uptake(t) }
