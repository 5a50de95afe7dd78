//! Configuration file parser for a dosimetry evaluation

use std::collections::BTreeMap;
use std::fs;
use std::str::FromStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, de};
use thiserror::Error;

use units::{hr, Time, Volume};

use crate::acquisition::Window;
use crate::calibration::{CalibrationFactors, CameraPreset, DeadTimeTable};
use crate::plot::Region;
use crate::quantify::CorrectionMode;
use crate::registration::DEFAULT_SIGMA;
use crate::types::Vertex;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read config file `{path}`: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("malformed config file `{path}`: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },

    #[error("[{0}] may give either a preset or custom values, not both")]
    PresetAndCustom(&'static str),

    #[error("reference acquisition {reference} does not exist: {count} acquisitions configured")]
    Reference { reference: usize, count: usize },
}

fn deserialize_uom_opt<'d, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Option::<&str>::deserialize(deserializer)?
        .map(str::parse::<T>)
        .transpose()
        .map_err(de::Error::custom)
}

/// Map whose keys are parsed with `FromStr`, for key types serde would want
/// to see as enum variants
fn deserialize_keyed<'d, D, K>(deserializer: D) -> Result<BTreeMap<K, f64>, D::Error>
where
    D: Deserializer<'d>,
    K: FromStr + Ord,
    <K as FromStr>::Err: std::fmt::Display,
{
    BTreeMap::<String, f64>::deserialize(deserializer)?
        .into_iter()
        .map(|(k, v)| Ok((k.parse::<K>().map_err(de::Error::custom)?, v)))
        .collect()
}

fn deserialize_uom<'d, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    <&str>::deserialize(deserializer)?
        .parse::<T>()
        .map_err(de::Error::custom)
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Headers of the planar stacks, in chronological order
    pub acquisitions: Vec<PathBuf>,

    /// Acquisition to which the others are aligned and on which ROIs are
    /// drawn; also the time of the SPECT reference measurement
    #[serde(default = "default_reference")]
    pub reference: usize,

    /// Smoothing applied before cross-correlating images
    #[serde(default = "default_sigma")]
    pub sigma: f64,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub correction: CorrectionMode,

    #[serde(default)]
    pub region: Region,

    #[serde(deserialize_with = "deserialize_uom")]
    pub volume: Volume,

    /// SPECT uptake (%) at the reference acquisition; 0 means none
    pub spect_uptake: Option<f64>,

    /// How far the plotted curve extends beyond the last sample
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_uom_opt")]
    pub plot_extension: Option<Time>,

    pub activity: Activity,

    #[serde(default)]
    pub roi: Roi,

    #[serde(default)]
    pub dead_time: DeadTime,

    #[serde(default)]
    pub calibration: Calibration,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Activity {
    /// MBq, as read off the dose calibrator
    pub value: ActivityValue,
    /// `dd.mm.YYYY HH:MM`
    pub measured_at: String,
    /// `dd.mm.YYYY HH:MM`
    pub administered_at: String,
}

/// Activity as written by the operator: either a TOML number or a string
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ActivityValue {
    Number(f64),
    Text(String),
}

impl ActivityValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(x) => x.to_string(),
            Self::Text(s)   => s.clone(),
        }
    }
}

/// Polygons `[[x, y], ...]` in pixel coordinates of the reference acquisition
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Roi {
    #[serde(default)] pub anterior : Vec<Vertex>,
    #[serde(default)] pub posterior: Vec<Vertex>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeadTime {
    pub preset: Option<CameraPreset>,
    /// Seconds, per window; windows left out keep the default camera's value
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_keyed")]
    pub custom: BTreeMap<Window, f64>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Calibration {
    pub preset: Option<CameraPreset>,
    /// cps/MBq, per correction mode
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_keyed")]
    pub custom: BTreeMap<CorrectionMode, f64>,
}

impl DeadTime {
    /// Preset if one is named; custom values if any are given; otherwise the
    /// first camera's preset.
    pub fn table(&self) -> Result<DeadTimeTable, ConfigError> {
        match (self.preset, self.custom.is_empty()) {
            (Some(_), false) => Err(ConfigError::PresetAndCustom("dead_time")),
            (Some(p), true ) => Ok(DeadTimeTable::preset(p)),
            (None   , false) => Ok(DeadTimeTable::custom(self.custom.clone())),
            (None   , true ) => Ok(DeadTimeTable::preset(CameraPreset::OptimaNmCt640)),
        }
    }
}

impl Calibration {
    pub fn factors(&self) -> Result<CalibrationFactors, ConfigError> {
        match (self.preset, self.custom.is_empty()) {
            (Some(_), false) => Err(ConfigError::PresetAndCustom("calibration")),
            (Some(p), true ) => Ok(CalibrationFactors::preset(p)),
            (None   , false) => Ok(CalibrationFactors::custom(self.custom.clone())),
            (None   , true ) => Ok(CalibrationFactors::preset(CameraPreset::OptimaNmCt640)),
        }
    }
}

impl Config {
    pub fn plot_extension(&self) -> Time { self.plot_extension.unwrap_or_else(|| hr(150.0)) }

    /// Make relative paths relative to `base` rather than to the working
    /// directory.
    fn resolve(mut self, base: &Path) -> Self {
        for path in self.acquisitions.iter_mut().chain(std::iter::once(&mut self.output)) {
            if path.is_relative() { *path = base.join(&*path) }
        }
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        self.dead_time.table()?;
        self.calibration.factors()?;
        let count = self.acquisitions.len();
        if self.reference >= count {
            return Err(ConfigError::Reference { reference: self.reference, count })
        }
        Ok(self)
    }
}

fn default_reference() -> usize { 2 }
fn default_sigma() -> f64 { DEFAULT_SIGMA }
fn default_output() -> PathBuf { "dosithyroid_output".into() }

pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.into(), source })?;
    let config: Config = toml::from_str(&text)
        .map_err(|source| ConfigError::Parse { path: path.into(), source })?;
    config
        .resolve(path.parent().unwrap_or(Path::new("")))
        .validate()
}
