//! Conversion of ROI counts into fractions of the administered activity.
//!
//! Count rates inside the ROI are combined according to the selected
//! correction mode and divided by the planar sensitivity for that mode:
//!
//! | mode      | value                                                  |
//! |-----------|--------------------------------------------------------|
//! | `ACSC`    | `sqrt(TEW(ant) · TEW(pos)) / CF`                       |
//! | `SC`      | `TEW(ant) / CF`                                        |
//! | `AC`      | `sqrt(ant_pw · pos_pw) / CF`                           |
//! | `No corr` | `ant_pw / CF`                                          |

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use units::todo::{Activityf64, Ratef64, Uptakef64};

use crate::acquisition::{Acquisition, Projection, Window};
use crate::calibration::CalibrationFactors;
use crate::error::ShapeMismatchError;
use crate::roi::masked_sum;
use crate::tew::tew_correction;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantifyError {
    #[error("acquisition {index} has no {projection} ROI")]
    MissingRoi { projection: Projection, index: usize },

    #[error(transparent)]
    Shape(#[from] ShapeMismatchError),

    #[error("administered activity must be positive, got {0} MBq")]
    Activity(Activityf64),

    #[error("unknown correction mode `{0}`: expected ACSC, SC, AC or No corr")]
    UnknownMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrectionMode {
    #[serde(rename = "ACSC")]    Acsc,
    #[serde(rename = "SC")]      Sc,
    #[serde(rename = "AC")]      Ac,
    #[serde(rename = "No corr")] NoCorr,
}

impl CorrectionMode {
    pub const ALL: [CorrectionMode; 4] = [Self::Acsc, Self::Sc, Self::Ac, Self::NoCorr];

    pub fn name(self) -> &'static str {
        match self {
            Self::Acsc   => "ACSC",
            Self::Sc     => "SC",
            Self::Ac     => "AC",
            Self::NoCorr => "No corr",
        }
    }

    /// Projections whose ROI the mode reads
    pub fn projections(self) -> &'static [Projection] {
        match self {
            Self::Acsc | Self::Ac    => &Projection::BOTH,
            Self::Sc   | Self::NoCorr => &[Projection::Anterior],
        }
    }

    fn scatter_corrected(self) -> bool { matches!(self, Self::Acsc | Self::Sc) }
}

impl Default for CorrectionMode {
    fn default() -> Self { Self::Acsc }
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for CorrectionMode {
    type Err = QuantifyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| QuantifyError::UnknownMode(s.into()))
    }
}

/// Count rate (cps) of `window` inside the ROI of its projection
pub fn roi_count_rate(acquisition: &Acquisition, window: Window, index: usize) -> Result<Ratef64, QuantifyError> {
    let projection = window.projection();
    let mask = acquisition.roi(projection).ok_or(QuantifyError::MissingRoi { projection, index })?;
    let image = &acquisition[window];
    ShapeMismatchError::check(image.dim(), mask.dim())?;
    Ok(masked_sum(image, mask) / units::s_(acquisition.duration()))
}

/// ROI count rates of one window across all acquisitions
fn rates(acquisitions: &[Acquisition], window: Window) -> Result<Array1<Ratef64>, QuantifyError> {
    acquisitions.iter().enumerate()
        .map(|(index, a)| roi_count_rate(a, window, index))
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from)
}

/// Count rate of `projection` per acquisition, scatter-corrected if `tew`
fn projection_rates(acquisitions: &[Acquisition], projection: Projection, tew: bool) -> Result<Array1<Ratef64>, QuantifyError> {
    let pw = rates(acquisitions, projection.photopeak())?;
    if !tew { return Ok(pw) }
    let usw = rates(acquisitions, projection.upper_scatter())?;
    let lsw = rates(acquisitions, projection.lower_scatter())?;
    Ok(tew_correction(&pw, &usw, &lsw)?.0)
}

/// Activity (MBq) seen in the ROI of each acquisition
pub fn roi_activities(
    acquisitions: &[Acquisition],
    mode: CorrectionMode,
    factors: &CalibrationFactors,
) -> Result<Vec<Activityf64>, QuantifyError> {
    let tew = mode.scatter_corrected();
    let ant = projection_rates(acquisitions, Projection::Anterior, tew)?;
    let combined = if mode.projections().len() == 2 {
        let pos = projection_rates(acquisitions, Projection::Posterior, tew)?;
        (ant * pos).mapv_into(f64::sqrt)
    } else {
        ant
    };
    let cf = factors.factor(mode);
    Ok(combined.iter().map(|r| r / cf).collect())
}

/// Fraction of the administered activity in the ROI of each acquisition
pub fn uptake_fractions(
    acquisitions: &[Acquisition],
    mode: CorrectionMode,
    factors: &CalibrationFactors,
    administered: Activityf64,
) -> Result<Vec<Uptakef64>, QuantifyError> {
    if !(administered.is_finite() && administered > 0.0) { return Err(QuantifyError::Activity(administered)) }
    let activities = roi_activities(acquisitions, mode, factors)?;
    log::info!("{mode} uptake in ROI: {:?}", activities.iter().map(|a| a / administered).collect::<Vec<_>>());
    Ok(activities.into_iter().map(|a| a / administered).collect())
}
