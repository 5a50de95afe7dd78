//! Uptake curve plot: measured points and fitted model, exported as SVG.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::uptake::Rates;

/// File name of the exported plot
pub const GRAPH_FILE: &str = "Graph.svg";

/// Points on the fitted curve
const CURVE_POINTS: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("could not draw uptake plot: {0}")]
pub struct PlotError(pub String);

fn plot_error(e: impl fmt::Display) -> PlotError { PlotError(e.to_string()) }

/// Part of the thyroid enclosed by the ROI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[default]
    #[serde(rename = "Whole thyroid gland")]     WholeGland,
    #[serde(rename = "Right lobe")]              RightLobe,
    #[serde(rename = "Left lobe")]               LeftLobe,
    #[serde(rename = "Hyperfunctioning nodule")] Nodule,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::WholeGland, Region::RightLobe, Region::LeftLobe, Region::Nodule];

    pub fn name(self) -> &'static str {
        match self {
            Self::WholeGland => "Whole thyroid gland",
            Self::RightLobe  => "Right lobe",
            Self::LeftLobe   => "Left lobe",
            Self::Nodule     => "Hyperfunctioning nodule",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::WholeGland => "Activity uptake in the whole thyroid gland",
            Self::RightLobe  => "Activity uptake in the right thyroid lobe",
            Self::LeftLobe   => "Activity uptake in the left thyroid lobe",
            Self::Nodule     => "Activity uptake in the hyperfunctioning nodule",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Region {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| format!("unknown region `{s}`"))
    }
}

/// SPECT anchor: ratio applied to the model and the measurement it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectPoint {
    pub hours: f64,
    /// %
    pub uptake: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone)]
pub struct UptakePlot<'a> {
    pub region: Region,
    pub hours: &'a [f64],
    /// Fractions of administered activity
    pub uptake: &'a [f64],
    pub rates: Rates,
    /// Hours beyond the last sample covered by the curve
    pub extension: f64,
    pub spect: Option<SpectPoint>,
}

impl UptakePlot<'_> {

    /// `(hours, %)` along the fitted curve, scaled by `ratio`
    pub fn curve(&self, ratio: f64) -> Vec<(f64, f64)> {
        let last = self.hours.iter().copied().fold(0.0, f64::max) + self.extension;
        (0..CURVE_POINTS)
            .map(|i| last * i as f64 / (CURVE_POINTS - 1) as f64)
            .map(|t| (t, 100.0 * ratio * self.rates.uptake(t)))
            .collect()
    }

    fn measured(&self) -> Vec<(f64, f64)> {
        self.hours.iter().zip(self.uptake).map(|(&t, &u)| (t, 100.0 * u)).collect()
    }

    pub fn write_svg(&self, path: &Path) -> Result<(), PlotError> {
        let curve = self.curve(1.0);
        let scaled = self.spect.map(|s| self.curve(s.ratio));
        let measured = self.measured();

        let spect_point = self.spect.map(|s| (s.hours, s.uptake));
        let points = curve.iter()
            .chain(scaled.iter().flatten())
            .chain(&measured)
            .chain(spect_point.iter())
            .copied()
            .filter(|(_, y)| y.is_finite())
            .collect_vec();
        let x_max = points.iter().map(|p| p.0).fold(1.0, f64::max);
        let y_max = points.iter().map(|p| p.1).fold(1.0, f64::max) * 1.1;

        let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(self.region.title(), ("sans-serif", 24))
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max, 0.0..y_max)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("Time (h)")
            .y_desc("Activity uptake (%)")
            .draw()
            .map_err(plot_error)?;

        let orange = RGBColor(255, 165, 0);
        chart
            .draw_series(LineSeries::new(curve, &orange)).map_err(plot_error)?
            .label("Fit")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], orange));

        if let Some(scaled) = scaled {
            chart
                .draw_series(LineSeries::new(scaled, orange.mix(0.5).stroke_width(3))).map_err(plot_error)?
                .label("Fit corrected to SPECT")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], orange.mix(0.5).stroke_width(3)));
        }

        chart
            .draw_series(measured.into_iter().map(|p| Circle::new(p, 5, BLUE.filled()))).map_err(plot_error)?
            .label("Measured")
            .legend(|(x, y)| Circle::new((x + 12, y), 5, BLUE.filled()));

        if let Some(s) = self.spect {
            chart
                .draw_series(std::iter::once(Circle::new((s.hours, s.uptake), 5, RED.filled()))).map_err(plot_error)?
                .label("SPECT uptake")
                .legend(|(x, y)| Circle::new((x + 12, y), 5, RED.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
        Ok(())
    }
}
