//! Rigid integer-pixel registration of planar images.
//!
//! The shift between two images is taken from the maximum of the
//! cross-correlation of their smoothed versions. Shifts are applied as cyclic
//! rolls: pixels leaving one edge re-enter at the opposite one.

use std::sync::Arc;

use ndarray::{s, Array2};
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::ShapeMismatchError;
use crate::gauss::gaussian_filter;
use crate::types::Image;

/// Smoothing applied before correlating
pub const DEFAULT_SIGMA: f64 = 0.5;

/// Integer pixel shift: `y` along axis 0 (rows), `x` along axis 1 (columns).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub x: isize,
    pub y: isize,
}

impl Shift {
    pub fn new(x: isize, y: isize) -> Self { Self { x, y } }
}

/// Align `moving` onto `reference`, returning the shifted (unsmoothed) image
/// and the shift that was applied to it.
pub fn align(reference: &Image, moving: &Image, sigma: f64) -> Result<(Image, Shift), ShapeMismatchError> {
    let shift = estimate_shift(reference, moving, sigma)?;
    Ok((shift_image(moving, shift), shift))
}

/// Shift which, applied to `moving` with `shift_image`, best overlays it on `reference`.
pub fn estimate_shift(reference: &Image, moving: &Image, sigma: f64) -> Result<Shift, ShapeMismatchError> {
    ShapeMismatchError::check(reference.dim(), moving.dim())?;
    let (rows, cols) = reference.dim();
    if rows == 0 || cols == 0 { return Ok(Shift::default()) }

    let surface = correlation_surface(&gaussian_filter(reference, sigma),
                                      &gaussian_filter(moving   , sigma));
    let (y_max, x_max) = argmax(&surface);
    Ok(Shift {
        x: x_max as isize - (cols / 2) as isize,
        y: y_max as isize - (rows / 2) as isize,
    })
}

/// Cyclic roll: the pixel at `(row, col)` moves to `(row + y, col + x)`,
/// wrapping around the edges.
pub fn shift_image(image: &Image, shift: Shift) -> Image {
    let (rows, cols) = image.dim();
    let mut shifted = Image::zeros((rows, cols));
    for ((r, c), &v) in image.indexed_iter() {
        let r = (r as isize + shift.y).rem_euclid(rows as isize) as usize;
        let c = (c as isize + shift.x).rem_euclid(cols as isize) as usize;
        shifted[[r, c]] = v;
    }
    shifted
}

/// Central, `a`-sized part of the full linear convolution of `a` with `b`
/// rotated by 180 degrees.
fn correlation_surface(a: &Image, b: &Image) -> Image {
    let (n, m) = a.dim();
    let (p, q) = (2 * n - 1, 2 * m - 1);
    let complex = |v: &f64| Complex64::new(*v, 0.0);

    let mut fa = Array2::<Complex64>::zeros((p, q));
    let mut fb = Array2::<Complex64>::zeros((p, q));
    fa.slice_mut(s![..n, ..m]).assign(&a.map(complex));
    fb.slice_mut(s![..n, ..m]).assign(&b.slice(s![..;-1, ..;-1]).map(complex));

    let fft = Fft2::new(p, q);
    fft.process(&mut fa, FftDirection::Forward);
    fft.process(&mut fb, FftDirection::Forward);
    fa.zip_mut_with(&fb, |x, y| *x = *x * *y);
    fft.process(&mut fa, FftDirection::Inverse);

    let norm = (p * q) as f64;
    let (r0, c0) = ((n - 1) / 2, (m - 1) / 2);
    fa.slice(s![r0..r0 + n, c0..c0 + m]).map(|z| z.re / norm)
}

/// Row-major position of the first occurrence of the maximum
fn argmax(surface: &Image) -> (usize, usize) {
    let mut best = ((0, 0), f64::NEG_INFINITY);
    for (index, &v) in surface.indexed_iter() {
        if v > best.1 { best = (index, v) }
    }
    best.0
}

/// Unnormalized 2-d FFT over rows then columns
struct Fft2 {
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2 {
    fn new(rows: usize, cols: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            row_forward: planner.plan_fft(cols, FftDirection::Forward),
            row_inverse: planner.plan_fft(cols, FftDirection::Inverse),
            col_forward: planner.plan_fft(rows, FftDirection::Forward),
            col_inverse: planner.plan_fft(rows, FftDirection::Inverse),
        }
    }

    fn process(&self, data: &mut Array2<Complex64>, direction: FftDirection) {
        let (row_plan, col_plan) = match direction {
            FftDirection::Forward => (&self.row_forward, &self.col_forward),
            FftDirection::Inverse => (&self.row_inverse, &self.col_inverse),
        };
        let mut buffer = Vec::with_capacity(data.nrows().max(data.ncols()));
        for mut row in data.rows_mut() {
            buffer.clear();
            buffer.extend(row.iter().copied());
            row_plan.process(&mut buffer);
            row.iter_mut().zip(&buffer).for_each(|(d, s)| *d = *s);
        }
        for mut col in data.columns_mut() {
            buffer.clear();
            buffer.extend(col.iter().copied());
            col_plan.process(&mut buffer);
            col.iter_mut().zip(&buffer).for_each(|(d, s)| *d = *s);
        }
    }
}
