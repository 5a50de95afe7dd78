//! Separable Gaussian smoothing of 2-d images.
//!
//! Kernel support and boundary handling are those of the classic
//! `gaussian_filter`: the kernel extends to `truncate * sigma` (rounded to the
//! nearest pixel) and the image is extended by mirror reflection about its
//! edges (`d c b a | a b c d | d c b a`).

use ndarray::{Array1, ArrayView1, ArrayViewMut1, Axis};

use crate::types::Image;

/// Kernel support in units of sigma
pub const TRUNCATE: f64 = 4.0;

/// Normalized kernel of length `2 * radius + 1`.
pub fn make_gauss(sigma: f64, truncate: f64) -> Array1<f64> {
    let radius = (truncate * sigma + 0.5) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let kernel: Array1<f64> = (-radius..=radius)
        .map(|x| (-(x * x) as f64 / two_sigma_sq).exp())
        .collect();
    let total = kernel.sum();
    kernel / total
}

/// Index into `0..n` of position `i` in the mirror-extended signal
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

fn smooth_lane(input: ArrayView1<f64>, mut output: ArrayViewMut1<f64>, kernel: &Array1<f64>) {
    let n = input.len();
    let radius = (kernel.len() / 2) as isize;
    for (i, out) in output.iter_mut().enumerate() {
        *out = kernel.iter().enumerate()
            .map(|(k, w)| w * input[reflect(i as isize + k as isize - radius, n)])
            .sum();
    }
}

/// Smooth `image` along both axes. A non-positive `sigma` returns an
/// unchanged copy.
pub fn gaussian_filter(image: &Image, sigma: f64) -> Image {
    if !(sigma > 0.0) || image.is_empty() { return image.clone() }
    let kernel = make_gauss(sigma, TRUNCATE);
    let mut result = image.clone();
    for axis in [Axis(0), Axis(1)] {
        let input = result.clone();
        for (lane_in, lane_out) in input.lanes(axis).into_iter().zip(result.lanes_mut(axis)) {
            smooth_lane(lane_in, lane_out, &kernel);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::{array, Array2};
    use rstest::rstest;

    #[rstest(/**/ sigma, radius,
             case(0.5, 2),
             case(1.0, 4),
             case(1.5, 6),
             case(0.1, 0),
    )]
    fn kernel_radius(sigma: f64, radius: usize) {
        let k = make_gauss(sigma, TRUNCATE);
        assert_eq!(k.len(), 2 * radius + 1);
        assert_float_eq!(k.sum(), 1.0, r2nd <= 1e-14);
    }

    #[test]
    fn kernel_values_for_half_pixel_sigma() {
        // exp(-2 x^2) at x = 0, 1, 2, normalized
        let raw = [(-8.0_f64).exp(), (-2.0_f64).exp(), 1.0, (-2.0_f64).exp(), (-8.0_f64).exp()];
        let total: f64 = raw.iter().sum();
        let k = make_gauss(0.5, TRUNCATE);
        for (got, want) in k.iter().zip(raw) {
            assert_float_eq!(*got, want / total, r2nd <= 1e-14);
        }
    }

    #[rstest(/**/ i, n, expected,
             case(-1, 4, 0),
             case(-2, 4, 1),
             case( 4, 4, 3),
             case( 5, 4, 2),
             case( 9, 4, 1),
             case(-5, 4, 3),
             case( 2, 1, 0),
    )]
    fn reflection(i: isize, n: usize, expected: usize) {
        assert_eq!(reflect(i, n), expected);
    }

    #[test]
    fn uniform_image_is_unchanged() {
        let image = Array2::from_elem((5, 7), 3.5);
        let smoothed = gaussian_filter(&image, 1.3);
        for v in smoothed.iter() { assert_float_eq!(*v, 3.5, r2nd <= 1e-12) }
    }

    #[test]
    fn smoothing_conserves_total_away_from_edges() {
        let mut image = Array2::zeros((15, 15));
        image[[7, 7]] = 100.0;
        let smoothed = gaussian_filter(&image, 0.5);
        assert_float_eq!(smoothed.sum(), 100.0, r2nd <= 1e-12);
        assert!(smoothed[[7, 7]] < 100.0);
        assert!(smoothed[[7, 8]] > 0.0);
        assert_float_eq!(smoothed[[7, 8]], smoothed[[8, 7]], r2nd <= 1e-12);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let image = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(gaussian_filter(&image, 0.0), image);
    }
}
