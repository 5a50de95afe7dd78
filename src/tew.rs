//! Triple-energy-window scatter correction.
//!
//! Scatter inside the photopeak is estimated from the counts in two narrow
//! windows adjacent to it, scaled by the ratio of window widths. Counting
//! errors are Poisson: `σ = sqrt(n)`.

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};

use crate::error::ShapeMismatchError;

/// Width of each scatter window relative to the photopeak energy
pub const SCATTER_WINDOW_WIDTH: f64 = 0.06;

/// Width of the photopeak window relative to its energy
pub const MAIN_WINDOW_WIDTH: f64 = 0.2;

/// Scatter expected in the photopeak window given the counts in the two
/// scatter windows
pub fn scatter_estimate(sc1: f64, sc2: f64) -> f64 {
    (sc1 / SCATTER_WINDOW_WIDTH + sc2 / SCATTER_WINDOW_WIDTH) * (MAIN_WINDOW_WIDTH / 2.0)
}

/// Corrected counts and their uncertainty for a single pixel (or sum).
///
/// The corrected value is clipped at zero; the uncertainty is not adjusted
/// for the clipping.
pub fn tew_pixel(em: f64, sc1: f64, sc2: f64) -> (f64, f64) {
    let (em_err, sc1_err, sc2_err) = (em.sqrt(), sc1.sqrt(), sc2.sqrt());
    let scatter = scatter_estimate(sc1, sc2);
    let scatter_err = MAIN_WINDOW_WIDTH / (2.0 * SCATTER_WINDOW_WIDTH) * (sc1_err.powi(2) + sc2_err.powi(2)).sqrt();
    let corrected = (em - scatter).max(0.0);
    let corrected_err = (em_err.powi(2) + scatter_err.powi(2)).sqrt();
    (corrected, corrected_err)
}

/// Apply `tew_pixel` element-wise to three conformable arrays of any
/// dimensionality, returning `(corrected, uncertainty)`.
pub fn tew_correction<S, D>(
    emission: &ArrayBase<S, D>,
    scatter1: &ArrayBase<S, D>,
    scatter2: &ArrayBase<S, D>,
) -> Result<(Array<f64, D>, Array<f64, D>), ShapeMismatchError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    for other in [scatter1, scatter2] {
        if other.shape() != emission.shape() {
            return Err(ShapeMismatchError::new(emission.shape(), other.shape()))
        }
    }
    let pairs = Zip::from(emission).and(scatter1).and(scatter2)
        .map_collect(|&em, &sc1, &sc2| tew_pixel(em, sc1, sc2));
    Ok((pairs.map(|p| p.0), pairs.map(|p| p.1)))
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::{array, Array1, Array2};
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest(/**/ em, sc1, sc2, expected,
             case(1000.0,  60.0,  60.0, 800.0),
             case( 500.0,  30.0,   0.0, 450.0),
             case( 100.0, 120.0,  60.0,   0.0),
             case(   0.0,   0.0,   0.0,   0.0),
    )]
    fn uniform_images(em: f64, sc1: f64, sc2: f64, expected: f64) {
        let e = Array2::from_elem((3, 4), em);
        let (corrected, _) = tew_correction(&e, &Array2::from_elem((3, 4), sc1), &Array2::from_elem((3, 4), sc2)).unwrap();
        let closed_form = (em - (sc1 / 0.06 + sc2 / 0.06) * (0.2 / 2.0)).max(0.0);
        assert_float_eq!(closed_form, expected, abs <= 1e-9);
        for v in corrected.iter() { assert_float_eq!(*v, closed_form, abs <= 1e-9) }
    }

    #[test]
    fn uncertainty_combines_poisson_errors() {
        let (corrected, err) = tew_pixel(400.0, 9.0, 16.0);
        assert_float_eq!(corrected, 400.0 - 25.0 / 0.06 * 0.1, r2nd <= 1e-12);
        // sqrt(400 + (0.2 / 0.12)^2 * 25)
        let expected = (400.0 + (0.2_f64 / 0.12).powi(2) * 25.0).sqrt();
        assert_float_eq!(err, expected, r2nd <= 1e-12);
    }

    #[test]
    fn clipping_keeps_emission_error() {
        let (corrected, err) = tew_pixel(4.0, 100.0, 100.0);
        assert_eq!(corrected, 0.0);
        assert!(err > 2.0);
    }

    #[test]
    fn works_on_rate_vectors() {
        let (c, e) = tew_correction(&array![600.0, 300.0], &array![6.0, 3.0], &array![6.0, 3.0]).unwrap();
        assert_float_eq!(c[0], 580.0, r2nd <= 1e-12);
        assert_float_eq!(c[1], 290.0, r2nd <= 1e-12);
        assert_eq!(e.len(), 2);
    }

    #[test]
    fn mismatched_shapes() {
        let a: Array1<f64> = Array1::zeros(3);
        let b: Array1<f64> = Array1::zeros(4);
        let err = tew_correction(&a, &a, &b).unwrap_err();
        assert_eq!(err, ShapeMismatchError::new(&[3], &[4]));
        assert_eq!(err.to_string(), "arrays are not conformable: [3] vs [4]");
    }

    #[test]
    fn negative_input_gives_nan_uncertainty() {
        let (_, err) = tew_pixel(-1.0, 0.0, 0.0);
        assert!(err.is_nan());
    }

    proptest! {
        #[test]
        fn never_negative(em in 0.0..1e6_f64, sc1 in 0.0..1e5_f64, sc2 in 0.0..1e5_f64) {
            let (c, e) = tew_pixel(em, sc1, sc2);
            prop_assert!(c >= 0.0);
            prop_assert!(c <= em);
            prop_assert!(e >= em.sqrt() * (1.0 - 1e-12));
        }
    }
}
