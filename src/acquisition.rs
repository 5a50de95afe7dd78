//! One time point of a serial planar scintigraphy study.
//!
//! An acquisition holds six co-registered windows: anterior and posterior
//! projections, each recorded in the photopeak and in the lower and upper
//! scatter windows.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use units::{ms, Time};

use crate::types::{Image, Mask, Shape, Vertex};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("expected 2 or 6 image planes, found {0}")]
    PlaneCount(usize),

    #[error("missing acquisition metadata: {0}")]
    MissingMetadata(&'static str),

    #[error("plane {index} has shape {found:?}, expected {expected:?}")]
    PlaneShape { index: usize, expected: Shape, found: Shape },

    #[error("could not read `{path}`: {source}")]
    Io { path: std::path::PathBuf, #[source] source: std::io::Error },

    #[error("malformed stack header `{path}`: {source}")]
    Header { path: std::path::PathBuf, #[source] source: toml::de::Error },

    #[error("stack data holds {found} values, header implies {expected}")]
    DataLength { expected: usize, found: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown window `{0}`: expected one of ant_pw, pos_pw, ant_lsw, pos_lsw, ant_usw, pos_usw")]
pub struct InvalidWindowError(pub String);

// ----- Windows and projections --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection { Anterior, Posterior }

impl Projection {
    pub const BOTH: [Projection; 2] = [Projection::Anterior, Projection::Posterior];

    pub fn photopeak(self) -> Window {
        match self { Self::Anterior => Window::AntPw,  Self::Posterior => Window::PosPw  }
    }

    pub fn lower_scatter(self) -> Window {
        match self { Self::Anterior => Window::AntLsw, Self::Posterior => Window::PosLsw }
    }

    pub fn upper_scatter(self) -> Window {
        match self { Self::Anterior => Window::AntUsw, Self::Posterior => Window::PosUsw }
    }

    /// Photopeak followed by the two scatter windows
    pub fn windows(self) -> [Window; 3] {
        [self.photopeak(), self.lower_scatter(), self.upper_scatter()]
    }

    fn position(self) -> usize { self as usize }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Anterior => "anterior", Self::Posterior => "posterior" })
    }
}

impl FromStr for Projection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anterior"  | "ant" => Ok(Self::Anterior),
            "posterior" | "pos" => Ok(Self::Posterior),
            _ => Err(format!("unknown projection `{s}`: expected anterior or posterior")),
        }
    }
}

/// Energy window of one projection. Declaration order is the order in which
/// planes are stored in a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window { AntPw, PosPw, AntLsw, PosLsw, AntUsw, PosUsw }

impl Window {
    pub const ALL: [Window; 6] = [
        Window::AntPw, Window::PosPw, Window::AntLsw, Window::PosLsw, Window::AntUsw, Window::PosUsw,
    ];

    pub fn name(self) -> &'static str {
        use Window::*;
        match self {
            AntPw  => "ant_pw",
            PosPw  => "pos_pw",
            AntLsw => "ant_lsw",
            PosLsw => "pos_lsw",
            AntUsw => "ant_usw",
            PosUsw => "pos_usw",
        }
    }

    pub fn projection(self) -> Projection {
        use Window::*;
        match self {
            AntPw | AntLsw | AntUsw => Projection::Anterior,
            PosPw | PosLsw | PosUsw => Projection::Posterior,
        }
    }

    pub fn is_photopeak(self) -> bool { matches!(self, Window::AntPw | Window::PosPw) }

    fn position(self) -> usize { self as usize }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Window {
    type Err = InvalidWindowError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Window::ALL.into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| InvalidWindowError(s.to_string()))
    }
}

// ----- Source data ---------------------------------------------------------------------------

/// Planes and metadata as delivered by a loader, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanarStack {
    /// ANT_PW, POS_PW[, ANT_LSW, POS_LSW, ANT_USW, POS_USW]
    pub planes: Vec<Image>,
    /// `YYYYMMDD`
    pub acquisition_date: Option<String>,
    /// `HHMMSS`, possibly followed by fractional seconds
    pub acquisition_time: Option<String>,
    /// Milliseconds
    pub acquisition_duration: Option<f64>,
}

// ----- Acquisition ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Acquisition {
    windows: [Image; 6],
    pub date: String,
    pub time: String,
    duration: Time,
    rois: [Option<Mask>; 2],
    display_max: [f64; 2],
    scatter_acquired: bool,
}

impl Acquisition {

    pub fn load(source: PlanarStack) -> Result<Self, LoadError> {
        let PlanarStack { planes, acquisition_date, acquisition_time, acquisition_duration } = source;
        let n = planes.len();
        if n != 2 && n != 6 { return Err(LoadError::PlaneCount(n)) }

        let date     = acquisition_date    .ok_or(LoadError::MissingMetadata("acquisition date"))?;
        let time     = acquisition_time    .ok_or(LoadError::MissingMetadata("acquisition time"))?;
        let duration = acquisition_duration.ok_or(LoadError::MissingMetadata("acquisition duration"))?;

        let expected = planes[0].dim();
        if let Some((index, found)) = planes.iter().map(|p| p.dim()).enumerate().find(|(_, d)| *d != expected) {
            return Err(LoadError::PlaneShape { index, expected, found })
        }

        let scatter_acquired = n == 6;
        if !scatter_acquired {
            log::warn!("Acquisition {date} {time} has no scatter windows: using planes of ones");
        }
        let ones = Image::ones(expected);
        let mut planes = planes.into_iter();
        let mut next = || planes.next().unwrap_or_else(|| ones.clone());
        let windows = [next(), next(), next(), next(), next(), next()];

        let mut acquisition = Self {
            windows, date, time,
            duration: ms(duration),
            rois: [None, None],
            display_max: [1.0, 1.0],
            scatter_acquired,
        };
        acquisition.refresh_display_max();
        Ok(acquisition)
    }

    pub fn shape(&self) -> Shape { self.windows[0].dim() }

    pub fn duration(&self) -> Time { self.duration }

    /// `false` when scatter windows were synthesized as planes of ones
    pub fn scatter_acquired(&self) -> bool { self.scatter_acquired }

    pub fn windows(&self) -> impl Iterator<Item = (Window, &Image)> {
        Window::ALL.into_iter().zip(self.windows.iter())
    }

    pub fn roi(&self, projection: Projection) -> Option<&Mask> {
        self.rois[projection.position()].as_ref()
    }

    pub fn set_roi(&mut self, projection: Projection, mask: Mask) {
        self.rois[projection.position()] = Some(mask);
    }

    /// Recompute the photopeak maxima used for display, after the pixel data
    /// have been changed.
    pub fn refresh_display_max(&mut self) {
        for projection in Projection::BOTH {
            let max = self[projection.photopeak()].fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            self.display_max[projection.position()] = if max <= 0.0 || !max.is_finite() {
                log::warn!("Empty or negative {projection} photopeak in acquisition {} {}: display maximum set to 1", self.date, self.time);
                1.0
            } else {
                max
            };
        }
    }

    pub fn display_max(&self, projection: Projection) -> f64 {
        self.display_max[projection.position()]
    }

    /// 8-bit grayscale rendering of `window`. Photopeaks are stretched to
    /// their own maximum; scatter windows are clipped but not scaled.
    pub fn display(&self, window: Window) -> GrayImage {
        let data = &self[window];
        let scale = if window.is_photopeak() { 255.0 / self.display_max(window.projection()) } else { 1.0 };
        let (rows, cols) = data.dim();
        GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            Luma([(data[[y as usize, x as usize]] * scale).clamp(0.0, 255.0) as u8])
        })
    }

    pub fn display_image(&self, window_name: &str) -> Result<GrayImage, InvalidWindowError> {
        Ok(self.display(window_name.parse()?))
    }

    /// Photopeak display of `projection` with the closed polygon outlined.
    pub fn roi_overlay(&self, projection: Projection, vertices: &[Vertex]) -> RgbImage {
        let mut canvas = DynamicImage::ImageLuma8(self.display(projection.photopeak())).to_rgb8();
        if vertices.len() > 1 {
            for (a, b) in vertices.iter().circular_tuple_windows() {
                draw_line_segment_mut(&mut canvas, (a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32), OUTLINE);
            }
        }
        canvas
    }

    /// All six planes (including any synthesized scatter planes) with metadata
    pub fn to_stack(&self) -> PlanarStack {
        PlanarStack {
            planes: self.windows.to_vec(),
            acquisition_date: Some(self.date.clone()),
            acquisition_time: Some(self.time.clone()),
            acquisition_duration: Some(units::ms_(self.duration)),
        }
    }
}

const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

impl core::ops::Index<Window> for Acquisition {
    type Output = Image;
    #[inline]
    fn index(&self, w: Window) -> &Self::Output { &self.windows[w.position()] }
}

impl core::ops::IndexMut<Window> for Acquisition {
    #[inline]
    fn index_mut(&mut self, w: Window) -> &mut Self::Output { &mut self.windows[w.position()] }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::array;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use rstest::rstest;

    /// Six-plane stack whose plane `i` is filled with `value(i)`
    pub(crate) fn stack(shape: Shape, value: impl Fn(usize) -> f64) -> PlanarStack {
        PlanarStack {
            planes: (0..6).map(|i| Image::from_elem(shape, value(i))).collect(),
            acquisition_date: Some("20250601".into()),
            acquisition_time: Some("120000.000000".into()),
            acquisition_duration: Some(600_000.0),
        }
    }

    #[rstest(/**/ name    , window,
             case("ant_pw" , Window::AntPw ),
             case("pos_pw" , Window::PosPw ),
             case("ant_lsw", Window::AntLsw),
             case("pos_lsw", Window::PosLsw),
             case("ant_usw", Window::AntUsw),
             case("pos_usw", Window::PosUsw),
    )]
    fn window_names(name: &str, window: Window) {
        assert_eq!(name.parse::<Window>(), Ok(window));
        assert_eq!(window.to_string(), name);
    }

    #[rstest(/**/ name, case("ANT_PW"), case("ant-pw"), case(""), case("ant_pw "))]
    fn unknown_window_names(name: &str) {
        assert_eq!(name.parse::<Window>(), Err(InvalidWindowError(name.to_string())));
    }

    #[test]
    fn windows_belong_to_their_projection() {
        for projection in Projection::BOTH {
            for window in projection.windows() {
                assert_eq!(window.projection(), projection);
            }
        }
    }

    #[test]
    fn six_planes_keep_their_order() {
        let acq = Acquisition::load(stack((3, 4), |i| i as f64)).unwrap();
        for (i, (window, data)) in acq.windows().enumerate() {
            assert_eq!(window, Window::ALL[i]);
            assert!(data.iter().all(|&v| v == i as f64));
        }
        assert!(acq.scatter_acquired());
        assert_float_eq!(units::s_(acq.duration()), 600.0, ulps <= 1);
    }

    #[test]
    fn two_planes_get_scatter_planes_of_ones() {
        let mut source = stack((3, 4), |i| 10.0 + i as f64);
        source.planes.truncate(2);
        let acq = Acquisition::load(source).unwrap();
        assert!(!acq.scatter_acquired());
        assert!(acq[Window::AntPw].iter().all(|&v| v == 10.0));
        assert!(acq[Window::PosPw].iter().all(|&v| v == 11.0));
        for w in [Window::AntLsw, Window::PosLsw, Window::AntUsw, Window::PosUsw] {
            assert_eq!(acq[w], Image::ones((3, 4)));
        }
    }

    #[rstest(/**/ n, case(0), case(1), case(3), case(5), case(7))]
    fn wrong_plane_count(n: usize) {
        let mut source = stack((2, 2), |_| 1.0);
        source.planes = (0..n).map(|_| Image::ones((2, 2))).collect();
        assert!(matches!(Acquisition::load(source), Err(LoadError::PlaneCount(m)) if m == n));
    }

    #[test]
    fn missing_metadata() {
        let mut source = stack((2, 2), |_| 1.0);
        source.acquisition_duration = None;
        assert!(matches!(Acquisition::load(source), Err(LoadError::MissingMetadata(_))));
        let mut source = stack((2, 2), |_| 1.0);
        source.acquisition_date = None;
        assert!(matches!(Acquisition::load(source), Err(LoadError::MissingMetadata(_))));
    }

    #[test]
    fn planes_of_different_shapes() {
        let mut source = stack((2, 2), |_| 1.0);
        source.planes[4] = Image::ones((2, 3));
        let err = Acquisition::load(source).unwrap_err();
        assert!(matches!(err, LoadError::PlaneShape { index: 4, expected: (2, 2), found: (2, 3) }));
    }

    #[test]
    fn photopeak_display_is_stretched_to_its_maximum() {
        let mut source = stack((2, 2), |_| 1.0);
        source.planes[0] = array![[0.0, 10.0], [20.0, 40.0]];
        let acq = Acquisition::load(source).unwrap();
        assert_float_eq!(acq.display_max(Projection::Anterior), 40.0, ulps <= 0);
        let img = acq.display(Window::AntPw);
        assert_eq!((img.width(), img.height()), (2, 2));
        // (x, y) = (column, row)
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [63]);
        assert_eq!(img.get_pixel(0, 1).0, [127]);
        assert_eq!(img.get_pixel(1, 1).0, [255]);
    }

    #[test]
    fn scatter_display_is_clipped_not_scaled() {
        let mut source = stack((1, 3), |_| 1.0);
        source.planes[2] = array![[-5.0, 100.0, 1000.0]];
        let acq = Acquisition::load(source).unwrap();
        let img = acq.display_image("ant_lsw").unwrap();
        assert_eq!(img.into_raw(), vec![0, 100, 255]);
    }

    #[test]
    fn empty_photopeak_displays_as_black() {
        let acq = Acquisition::load(stack((2, 2), |_| 0.0)).unwrap();
        assert_float_eq!(acq.display_max(Projection::Posterior), 1.0, ulps <= 0);
        assert!(acq.display(Window::PosPw).pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn negative_photopeak_keeps_a_positive_scale() {
        let mut source = stack((2, 2), |_| 1.0);
        source.planes[0] = array![[-3.0, -1.0], [-2.0, -4.0]];
        let acq = Acquisition::load(source).unwrap();
        assert_float_eq!(acq.display_max(Projection::Anterior), 1.0, ulps <= 0);
        assert!(acq.display(Window::AntPw).pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn display_of_unknown_window() {
        let acq = Acquisition::load(stack((2, 2), |_| 1.0)).unwrap();
        assert!(acq.display_image("lsw").is_err());
    }

    #[test]
    fn overlay_outlines_polygon() {
        let acq = Acquisition::load(stack((10, 12), |_| 0.0)).unwrap();
        let overlay = acq.roi_overlay(Projection::Anterior, &[(2.0, 2.0), (8.0, 2.0), (8.0, 6.0)]);
        assert_eq!((overlay.width(), overlay.height()), (12, 10));
        assert_eq!(overlay.get_pixel(5, 2).0, OUTLINE.0);
        assert_eq!(overlay.get_pixel(8, 4).0, OUTLINE.0);
        assert_eq!(overlay.get_pixel(0, 9).0, [0, 0, 0]);
    }

    #[test]
    fn stack_roundtrip_through_acquisition() {
        let source = stack((3, 2), |i| i as f64 * 2.5);
        let acq = Acquisition::load(source.clone()).unwrap();
        assert_eq!(acq.to_stack(), source);
    }
}
