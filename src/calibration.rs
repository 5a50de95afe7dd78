//! Camera calibration tables: dead-time constants per window and system
//! sensitivity per correction mode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use units::todo::DeadTimef64;

use crate::acquisition::Window;
use crate::quantify::CorrectionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraPreset {
    #[serde(rename = "FNKV - GE Optima NM/CT 640")]       OptimaNmCt640,
    #[serde(rename = "FNKV - GE Discovery NM/CT 870 DR")] DiscoveryNmCt870Dr,
}

impl CameraPreset {
    pub const ALL: [CameraPreset; 2] = [CameraPreset::OptimaNmCt640, CameraPreset::DiscoveryNmCt870Dr];

    pub fn name(self) -> &'static str {
        match self {
            Self::OptimaNmCt640      => "FNKV - GE Optima NM/CT 640",
            Self::DiscoveryNmCt870Dr => "FNKV - GE Discovery NM/CT 870 DR",
        }
    }
}

impl fmt::Display for CameraPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for CameraPreset {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown camera preset `{s}`"))
    }
}

// ----- Dead time -----------------------------------------------------------------------------

/// Paralyzable dead-time constant (seconds) for each window
#[derive(Debug, Clone, PartialEq)]
pub struct DeadTimeTable {
    tau: BTreeMap<Window, DeadTimef64>,
}

/// Constants measured on the site's cameras; both share one set
const MEASURED_TAU: [(Window, DeadTimef64); 6] = [
    (Window::AntPw , 1.2278225074520933e-05),
    (Window::AntUsw, 7.523878532633466e-05 ),
    (Window::AntLsw, 7.52862007849338e-05  ),
    (Window::PosPw , 1.2120528337418146e-05),
    (Window::PosUsw, 5.7212768749137515e-05),
    (Window::PosLsw, 5.6539578680391605e-05),
];

fn measured_tau(window: Window) -> DeadTimef64 {
    MEASURED_TAU.iter().find(|(w, _)| *w == window).map_or(MEASURED_TAU[0].1, |(_, t)| *t)
}

impl DeadTimeTable {
    pub fn preset(camera: CameraPreset) -> Self {
        let tau = match camera {
            CameraPreset::OptimaNmCt640 | CameraPreset::DiscoveryNmCt870Dr => MEASURED_TAU,
        };
        Self { tau: tau.into_iter().collect() }
    }

    /// User-entered constants, starting from the default camera's preset:
    /// windows not mentioned keep their preset value.
    pub fn custom(entries: impl IntoIterator<Item = (Window, DeadTimef64)>) -> Self {
        let mut table = Self::preset(CameraPreset::OptimaNmCt640);
        table.tau.extend(entries);
        table
    }

    pub fn tau(&self, window: Window) -> DeadTimef64 {
        self.tau.get(&window).copied().unwrap_or_else(|| measured_tau(window))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Window, DeadTimef64)> + '_ {
        self.tau.iter().map(|(w, t)| (*w, *t))
    }
}

// ----- Sensitivity ---------------------------------------------------------------------------

/// Planar sensitivity (cps/MBq) for each correction mode
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationFactors {
    cf: BTreeMap<CorrectionMode, f64>,
}

impl CalibrationFactors {
    pub fn preset(camera: CameraPreset) -> Self {
        use CorrectionMode::*;
        let cf = match camera {
            CameraPreset::OptimaNmCt640 | CameraPreset::DiscoveryNmCt870Dr =>
                [(Acsc, 7.77), (Sc, 13.30), (Ac, 18.3), (NoCorr, 19.7)],
        };
        Self { cf: cf.into_iter().collect() }
    }

    /// User-entered factors; modes not mentioned get 1.
    pub fn custom(entries: impl IntoIterator<Item = (CorrectionMode, f64)>) -> Self {
        let mut cf: BTreeMap<_, _> = CorrectionMode::ALL.into_iter().map(|m| (m, 1.0)).collect();
        cf.extend(entries);
        Self { cf }
    }

    pub fn factor(&self, mode: CorrectionMode) -> f64 {
        self.cf.get(&mode).copied().unwrap_or(1.0)
    }
}
