//! State of one evaluation: the loaded acquisitions and everything derived
//! from them so far.
//!
//! Every operation either completes or leaves the session as it was: new
//! pixel data, masks and results are computed aside and committed only once
//! nothing more can fail.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::RgbImage;

use units::todo::{Activityf64, Uptakef64};
use units::Volume;

use crate::acquisition::{Acquisition, Projection};
use crate::calibration::{CalibrationFactors, DeadTimeTable};
use crate::deadtime::{self, WindowCorrection};
use crate::dose::{self, DoseReport};
use crate::error::{Error, Result, ShapeMismatchError};
use crate::plot::{Region, SpectPoint, UptakePlot};
use crate::quantify::{uptake_fractions, CorrectionMode};
use crate::registration::{align, shift_image, Shift};
use crate::roi::polygon_mask;
use crate::timeline::time_differences;
use crate::types::Vertex;
use crate::uptake::{fit_uptake, UptakeFit};

/// Uptake of each acquisition against hours since administration
#[derive(Debug, Clone, PartialEq)]
pub struct TimeActivity {
    pub hours: Vec<f64>,
    pub uptake: Vec<Uptakef64>,
    pub mode: CorrectionMode,
    pub administered: Activityf64,
}

impl TimeActivity {
    /// Earliest and latest sample times
    pub fn span(&self) -> (f64, f64) {
        self.hours.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)))
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    acquisitions: Vec<Acquisition>,
    dead_time: DeadTimeTable,
    calibration: CalibrationFactors,
    dead_time_applied: bool,
    polygons: [Option<Vec<Vertex>>; 2],
    shifts: [Option<Vec<Shift>>; 2],
    time_activity: Option<TimeActivity>,
    fit: Option<UptakeFit>,
}

impl Session {

    pub fn new(acquisitions: Vec<Acquisition>, dead_time: DeadTimeTable, calibration: CalibrationFactors) -> Result<Self> {
        if acquisitions.is_empty() { return Err(Error::EmptySession) }
        Ok(Self {
            acquisitions, dead_time, calibration,
            dead_time_applied: false,
            polygons: [None, None],
            shifts: [None, None],
            time_activity: None,
            fit: None,
        })
    }

    /// Read one planar stack per header
    pub fn load(headers: &[PathBuf], dead_time: DeadTimeTable, calibration: CalibrationFactors) -> Result<Self> {
        let acquisitions = headers.iter()
            .map(|h| -> Result<Acquisition> {
                log::info!("Loading {}", h.display());
                Ok(Acquisition::load(crate::io::stack::read(h)?)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(acquisitions, dead_time, calibration)
    }

    pub fn acquisitions(&self) -> &[Acquisition] { &self.acquisitions }

    pub fn acquisition(&self, index: usize) -> Result<&Acquisition> {
        self.acquisitions.get(index).ok_or(Error::NoSuchAcquisition { index, len: self.acquisitions.len() })
    }

    pub fn dead_time_applied(&self) -> bool { self.dead_time_applied }

    pub fn polygon(&self, projection: Projection) -> Option<&[Vertex]> {
        self.polygons[projection as usize].as_deref()
    }

    /// Shifts applied to each acquisition by the last alignment of `projection`
    pub fn shifts(&self, projection: Projection) -> Option<&[Shift]> {
        self.shifts[projection as usize].as_deref()
    }

    pub fn time_activity_samples(&self) -> Option<&TimeActivity> { self.time_activity.as_ref() }

    pub fn last_fit(&self) -> Option<&UptakeFit> { self.fit.as_ref() }

    // ----- Corrections and alignment ---------------------------------------------------------

    /// Apply dead-time correction to every window of every acquisition and
    /// record what was done in `audit`. Only the first call has any effect:
    /// later ones return `None`.
    pub fn correct_dead_time(&mut self, audit: &Path) -> Result<Option<Vec<Vec<WindowCorrection>>>> {
        if self.dead_time_applied {
            log::info!("Dead-time correction has already been applied: nothing to do");
            return Ok(None)
        }
        let mut corrected = self.acquisitions.clone();
        let corrections: Vec<_> = corrected.iter_mut()
            .map(|a| deadtime::correct_acquisition(a, &self.dead_time))
            .collect();

        let io_error = |source| Error::Io { path: audit.to_path_buf(), source };
        let mut out = BufWriter::new(File::create(audit).map_err(io_error)?);
        deadtime::write_audit(&mut out, &corrections).map_err(io_error)?;

        self.acquisitions = corrected;
        self.dead_time_applied = true;
        log::info!("Dead-time correction applied to {} acquisitions; audit written to {}",
                   self.acquisitions.len(), audit.display());
        Ok(Some(corrections))
    }

    /// Align the photopeak of `projection` in every acquisition to that of
    /// acquisition `reference`, moving the scatter windows of the projection
    /// by the same shift.
    pub fn align(&mut self, projection: Projection, reference: usize, sigma: f64) -> Result<Vec<Shift>> {
        let pw = projection.photopeak();
        let target = self.acquisition(reference)?[pw].clone();
        let mut aligned = self.acquisitions.clone();
        let mut shifts = Vec::with_capacity(aligned.len());
        for (index, acquisition) in aligned.iter_mut().enumerate() {
            let (moved, shift) = align(&target, &acquisition[pw], sigma)?;
            acquisition[pw] = moved;
            for window in [projection.lower_scatter(), projection.upper_scatter()] {
                ShapeMismatchError::check(target.dim(), acquisition[window].dim())?;
                acquisition[window] = shift_image(&acquisition[window], shift);
            }
            acquisition.refresh_display_max();
            log::info!("Acquisition {index} {projection}: shift {shift:?}");
            shifts.push(shift);
        }
        self.acquisitions = aligned;
        self.shifts[projection as usize] = Some(shifts.clone());
        self.discard_results();
        Ok(shifts)
    }

    /// Use the polygon through `vertices`, drawn on acquisition `reference`,
    /// as the `projection` ROI of every acquisition. Replaces any previous
    /// ROI. Returns the outlined photopeak of each acquisition.
    pub fn segment(&mut self, projection: Projection, reference: usize, vertices: &[Vertex]) -> Result<Vec<RgbImage>> {
        let shape = self.acquisition(reference)?.shape();
        for acquisition in &self.acquisitions {
            ShapeMismatchError::check(shape, acquisition.shape())?;
        }
        let mask = polygon_mask(shape, vertices);
        log::info!("{projection} ROI: {} pixels", mask.iter().filter(|&&m| m).count());
        for acquisition in &mut self.acquisitions {
            acquisition.set_roi(projection, mask.clone());
        }
        self.polygons[projection as usize] = Some(vertices.to_vec());
        self.discard_results();
        Ok(self.acquisitions.iter().map(|a| a.roi_overlay(projection, vertices)).collect())
    }

    /// Samples and fit no longer describe the ROI counts
    fn discard_results(&mut self) {
        self.time_activity = None;
        self.fit = None;
    }

    // ----- Quantification and dosimetry ------------------------------------------------------

    /// Uptake in the ROIs of every acquisition, timed from `administered_at`
    /// (`dd.mm.YYYY HH:MM`), when `administered` MBq were given.
    pub fn time_activity(&mut self, mode: CorrectionMode, administered: Activityf64, administered_at: &str) -> Result<&TimeActivity> {
        let dates: Vec<_> = self.acquisitions.iter().map(|a| a.date.as_str()).collect();
        let times: Vec<_> = self.acquisitions.iter().map(|a| a.time.as_str()).collect();
        let hours = time_differences(administered_at, &dates, &times)?;
        let uptake = uptake_fractions(&self.acquisitions, mode, &self.calibration, administered)?;
        log::info!("Sample times (h): {hours:.2?}");
        self.fit = None;
        Ok(&*self.time_activity.insert(TimeActivity { hours, uptake, mode, administered }))
    }

    /// Fit the uptake model to the current time-activity samples.
    pub fn fit(&mut self, uncertainties: Option<&[f64]>) -> Result<&UptakeFit> {
        let samples = self.time_activity.as_ref().ok_or(Error::NoTimeActivity)?;
        let fit = fit_uptake(&samples.hours, &samples.uptake, uncertainties)?;
        Ok(&*self.fit.insert(fit))
    }

    fn fitted(&self) -> Result<(&TimeActivity, &UptakeFit)> {
        let samples = self.time_activity.as_ref().ok_or(Error::NoTimeActivity)?;
        let fit = self.fit.as_ref().ok_or(Error::NoFit)?;
        Ok((samples, fit))
    }

    /// SPECT ratio for an uptake (%) measured at the time of acquisition
    /// `reference`
    pub fn spect_ratio(&self, spect_uptake: Option<f64>, reference: usize) -> Result<f64> {
        let (samples, fit) = self.fitted()?;
        let t = *samples.hours.get(reference)
            .ok_or(Error::NoSuchAcquisition { index: reference, len: samples.hours.len() })?;
        Ok(dose::spect_ratio(spect_uptake, &fit.rates, t))
    }

    pub fn dose(&self, volume: Volume, spect_uptake: Option<f64>, reference: usize) -> Result<DoseReport> {
        let (samples, fit) = self.fitted()?;
        let ratio = self.spect_ratio(spect_uptake, reference)?;
        Ok(dose::dose_report(&fit.rates, samples.span(), samples.administered, volume, ratio)?)
    }

    /// Draw the measured uptake and the fitted curve into `path`
    pub fn plot(&self, path: &Path, region: Region, extension_hours: f64, spect_uptake: Option<f64>, reference: usize) -> Result<()> {
        let (samples, fit) = self.fitted()?;
        let spect = match spect_uptake {
            Some(uptake) if uptake != 0.0 => {
                let ratio = self.spect_ratio(spect_uptake, reference)?;
                Some(SpectPoint { hours: samples.hours[reference], uptake, ratio })
            }
            _ => None,
        };
        UptakePlot {
            region,
            hours: &samples.hours,
            uptake: &samples.uptake,
            rates: fit.rates,
            extension: extension_hours,
            spect,
        }.write_svg(path)?;
        Ok(())
    }
}
