//! Paralyzable dead-time correction.
//!
//! A paralyzable detector records `R_m = R·exp(-R·τ)` counts per second when
//! exposed to a true rate `R`. The true rate is recovered with the principal
//! branch of the Lambert W function: `R = -Re(W₀(-R_m·τ)) / τ`.

use std::io::Write;

use units::todo::{DeadTimef64, Ratef64};

use crate::acquisition::{Acquisition, Window};
use crate::calibration::DeadTimeTable;
use crate::lambert::{lambert_w0_real, BRANCH_POINT};

/// Name of the audit file written next to the other outputs
pub const AUDIT_FILE: &str = "DT_correction_params.txt";

/// True count rate corresponding to `measured` counts per second.
pub fn true_rate(measured: Ratef64, tau: DeadTimef64) -> Ratef64 {
    let x = -measured * tau;
    if x < BRANCH_POINT {
        log::warn!("Measured rate {measured} cps exceeds the maximum a detector with dead time {tau} s can record: using the real part of a complex solution");
    }
    -lambert_w0_real(x).re / tau
}

/// Multiplicative correction `true / measured`; 1 when nothing was measured.
pub fn correction_factor(measured: Ratef64, tau: DeadTimef64) -> f64 {
    if measured == 0.0 { return 1.0 }
    true_rate(measured, tau) / measured
}

/// What was applied to one window of one acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowCorrection {
    pub window: Window,
    pub measured_rate: Ratef64,
    pub factor: f64,
}

/// Scale every window of `acquisition` by its dead-time correction factor.
pub fn correct_acquisition(acquisition: &mut Acquisition, table: &DeadTimeTable) -> Vec<WindowCorrection> {
    let duration = units::s_(acquisition.duration());
    let corrections = table.iter()
        .map(|(window, tau)| {
            let measured_rate = acquisition[window].sum() / duration;
            let factor = correction_factor(measured_rate, tau);
            acquisition[window].mapv_inplace(|v| v * factor);
            WindowCorrection { window, measured_rate, factor }
        })
        .collect();
    acquisition.refresh_display_max();
    corrections
}

/// Write the rates and factors applied to each acquisition (outer index) in
/// the form kept for traceability.
pub fn write_audit(out: &mut impl Write, corrections: &[Vec<WindowCorrection>]) -> std::io::Result<()> {
    writeln!(out, "Correction applied by Lambert W function:")?;
    writeln!(out, "R_corr = -REAL(W(-R_m * tau)) / tau")?;
    writeln!(out)?;
    for (index, acquisition) in corrections.iter().enumerate() {
        for c in acquisition {
            writeln!(out, "Measured rate for {} for index {index}: {} cps", c.window, c.measured_rate)?;
            writeln!(out, "Correction factor for {} for index {index}: {}", c.window, c.factor)?;
        }
        writeln!(out, "----------------------------------------")?;
    }
    Ok(())
}
