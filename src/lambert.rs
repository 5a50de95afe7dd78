//! Principal branch `W₀` of the Lambert W function, `w·exp(w) = z`.

use num_complex::Complex64;

/// Branch point: `W₀(-1/e) = -1`
pub const BRANCH_POINT: f64 = -1.0 / std::f64::consts::E;

const MAX_ITERATIONS: usize = 64;

/// `W₀(z)` for complex `z`, by Halley iteration.
///
/// On the real axis the result is real for `z >= -1/e`; below the branch point
/// it is the complex conjugate pair member with positive imaginary part.
pub fn lambert_w0(z: Complex64) -> Complex64 {
    if z == Complex64::new(0.0, 0.0) { return z }
    if !(z.re.is_finite() && z.im.is_finite()) { return Complex64::new(f64::NAN, f64::NAN) }

    let mut w = initial_guess(z);
    for _ in 0..MAX_ITERATIONS {
        let ew = w.exp();
        let f = w * ew - z;
        let wp1 = w + 1.0;
        if f.norm() == 0.0 || wp1.norm() < f64::EPSILON { break }
        let step = f / (ew * wp1 - (w + 2.0) * f / (2.0 * wp1));
        w -= step;
        if step.norm() <= 4.0 * f64::EPSILON * (1.0 + w.norm()) { break }
    }
    w
}

/// `W₀(x)` for real `x`, complex when `x < -1/e`.
pub fn lambert_w0_real(x: f64) -> Complex64 { lambert_w0(Complex64::new(x, 0.0)) }

fn initial_guess(z: Complex64) -> Complex64 {
    if (z - BRANCH_POINT).norm() < 0.3 {
        // Series about the branch point
        let p = (2.0 * (std::f64::consts::E * z + 1.0)).sqrt();
        -1.0 + p - p * p / 3.0 + 11.0 / 72.0 * p * p * p
    } else if z.norm() <= 3.0 {
        (z + 1.0).ln()
    } else {
        // Asymptotic expansion for large |z|
        let l1 = z.ln();
        let l2 = l1.ln();
        l1 - l2 + l2 / l1
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest(/**/ x, expected,
             case(0.0                    , 0.0               ),
             case(1.0                    , 0.5671432904097838),
             case(std::f64::consts::E    , 1.0               ),
             case(-0.1                   , -0.111832559158963),
             case(-0.2                   , -0.259171101819074),
             case(-0.35                  , -0.716638816456074),
             case(0.5                    , 0.351733711249196 ),
             case(2.0                    , 0.852605502013726 ),
             case(10.0                   , 1.7455280027407   ),
             case(1e-3                   , 0.000999001497338531),
    )]
    fn real_values(x: f64, expected: f64) {
        let w = lambert_w0_real(x);
        assert_float_eq!(w.re, expected, abs <= 1e-13);
        assert_float_eq!(w.im, 0.0, abs <= 1e-15);
    }

    #[test]
    fn at_branch_point() {
        let w = lambert_w0_real(BRANCH_POINT);
        assert_float_eq!(w.re, -1.0, abs <= 1e-6);
        assert_float_eq!(w.im, 0.0, abs <= 1e-6);
    }

    #[test]
    fn below_branch_point_is_complex() {
        let w = lambert_w0_real(-0.5);
        assert_float_eq!(w.re, -0.794023632344689, abs <= 1e-12);
        assert_float_eq!(w.im, 0.770111750510379, abs <= 1e-12);
    }

    #[test]
    fn non_finite_input() {
        assert!(lambert_w0_real(f64::NAN).re.is_nan());
    }

    proptest! {
        #[test]
        fn inverts_w_exp_w(x in -0.36..1e4_f64) {
            let w = lambert_w0_real(x);
            let back = w * w.exp();
            prop_assert!((back.re - x).abs() <= 1e-10 * (1.0 + x.abs()), "x = {x}, w = {w}, back = {back}");
            prop_assert!(w.re >= -1.0);
        }
    }
}
