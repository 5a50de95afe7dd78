//! Two-compartment uptake model and its weighted least-squares fit.
//!
//! Fraction of administered activity in the organ `t` hours after
//! administration:
//!
//! ```text
//! f(t) = k_t / (k_B - k_T) · (exp(-k_T·t) - exp(-k_B·t))
//! ```
//!
//! `k_B` governs the initial rise and `k_T` the subsequent clearance. The model
//! is unchanged by swapping `k_B` and `k_T`; fitted rates are reported with
//! `k_B > k_T`.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("no samples to fit")]
    Empty,

    #[error("{times} sample times but {values} values")]
    LengthMismatch { times: usize, values: usize },

    #[error("{values} values but {uncertainties} uncertainties")]
    UncertaintyLength { values: usize, uncertainties: usize },

    #[error("sample {index} is not finite")]
    NonFinite { index: usize },

    #[error("uncertainty of sample {index} is negative or not finite")]
    BadUncertainty { index: usize },

    #[error("all uncertainties are zero")]
    AllZeroUncertainty,

    #[error("{0} samples cannot determine 3 parameters")]
    TooFewPoints(usize),

    #[error("fit diverged to non-finite parameters")]
    Diverged,
}

/// Rate constants in 1/h
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub k_t: f64,
    pub k_B: f64,
    pub k_T: f64,
}

impl Rates {
    pub const INITIAL_GUESS: Rates = Rates { k_t: 0.05, k_B: 0.1, k_T: 0.005 };

    #[allow(non_snake_case)]
    pub fn new(k_t: f64, k_B: f64, k_T: f64) -> Self { Self { k_t, k_B, k_T } }

    /// Uptake fraction at `t` hours. Not finite when `k_B == k_T`.
    pub fn uptake(&self, t: f64) -> f64 {
        let Rates { k_t, k_B, k_T } = *self;
        k_t / (k_B - k_T) * ((-k_T * t).exp() - (-k_B * t).exp())
    }

    /// Derivatives of `uptake(t)` with respect to `(k_t, k_B, k_T)`
    pub fn gradient(&self, t: f64) -> Vector3<f64> {
        let Rates { k_t, k_B, k_T } = *self;
        let d = k_B - k_T;
        let (e_t, e_b) = ((-k_T * t).exp(), (-k_B * t).exp());
        let difference = e_t - e_b;
        let a = k_t / d;
        Vector3::new(
            difference / d,
            -a / d * difference + a * t * e_b,
             a / d * difference - a * t * e_t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.k_t.is_finite() && self.k_B.is_finite() && self.k_T.is_finite()
    }

    fn as_vector(&self) -> Vector3<f64> { Vector3::new(self.k_t, self.k_B, self.k_T) }

    fn from_vector(v: Vector3<f64>) -> Self { Self::new(v[0], v[1], v[2]) }
}

/// Free-function form of `Rates::uptake`
pub fn uptake(t: f64, rates: &Rates) -> f64 { rates.uptake(t) }

#[derive(Debug, Clone, PartialEq)]
pub struct UptakeFit {
    pub rates: Rates,
    /// Standard errors of `(k_t, k_B, k_T)`, when they can be estimated
    pub stderr: [Option<f64>; 3],
    /// Scaled by the reduced χ²
    pub covariance: Option<Matrix3<f64>>,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub evaluations: usize,
}

/// Number of times the optimizer is restarted from its previous result
pub const PASSES: usize = 5;

const MAX_ITERATIONS: usize = 500;
const MAX_DAMPING_ATTEMPTS: usize = 50;

/// Fit the uptake model to `values` sampled at `times` (hours), optionally
/// weighting each residual by `1/σ`.
pub fn fit_uptake(times: &[f64], values: &[f64], uncertainties: Option<&[f64]>) -> Result<UptakeFit, FitError> {
    fit_uptake_from(times, values, uncertainties, Rates::INITIAL_GUESS, PASSES)
}

pub fn fit_uptake_from(
    times: &[f64],
    values: &[f64],
    uncertainties: Option<&[f64]>,
    initial: Rates,
    passes: usize,
) -> Result<UptakeFit, FitError> {
    let problem = Problem::new(times, values, uncertainties)?;

    let mut rates = initial;
    let mut evaluations = 0;
    for pass in 0..passes.max(1) {
        let outcome = problem.levenberg_marquardt(rates);
        evaluations += outcome.evaluations;
        log::debug!("Fit pass {pass}: {:?}, χ² = {:e}", outcome.rates, outcome.cost);
        rates = outcome.rates;
    }
    if !rates.is_finite() { return Err(FitError::Diverged) }

    let (rates, swapped) = if rates.k_B < rates.k_T {
        (Rates::new(rates.k_t, rates.k_T, rates.k_B), true)
    } else {
        (rates, false)
    };

    let (jtj, _, chi_square) = problem.normal_equations(&rates);
    if !chi_square.is_finite() { return Err(FitError::Diverged) }
    let degrees_of_freedom = problem.len() - 3;
    let covariance = (degrees_of_freedom > 0)
        .then(|| jtj.try_inverse())
        .flatten()
        .map(|inverse| inverse * (chi_square / degrees_of_freedom as f64))
        .filter(|c| c.iter().all(|x| x.is_finite()));
    let stderr = match &covariance {
        Some(c) => [0, 1, 2].map(|i| (c[(i, i)] >= 0.0).then(|| c[(i, i)].sqrt())),
        None    => [None; 3],
    };
    if swapped { log::debug!("Fitted k_B < k_T: reported with k_B and k_T exchanged") }
    log::info!("Uptake fit: k_t = {:.5}, k_B = {:.5}, k_T = {:.6} (χ² = {chi_square:.3e}, {degrees_of_freedom} dof)",
               rates.k_t, rates.k_B, rates.k_T);

    Ok(UptakeFit { rates, stderr, covariance, chi_square, degrees_of_freedom, evaluations })
}

// ----- Least-squares machinery ---------------------------------------------------------------

struct Problem<'a> {
    times: &'a [f64],
    values: &'a [f64],
    /// Square roots of the weights: `1/σ`, or 1 when unweighted
    scale: Vec<f64>,
}

struct Outcome {
    rates: Rates,
    cost: f64,
    evaluations: usize,
}

impl<'a> Problem<'a> {

    fn new(times: &'a [f64], values: &'a [f64], uncertainties: Option<&[f64]>) -> Result<Self, FitError> {
        if times.len() != values.len() {
            return Err(FitError::LengthMismatch { times: times.len(), values: values.len() })
        }
        if values.is_empty() { return Err(FitError::Empty) }
        if let Some(index) = times.iter().zip(values).position(|(t, v)| !(t.is_finite() && v.is_finite())) {
            return Err(FitError::NonFinite { index })
        }
        let scale = match uncertainties {
            None        => vec![1.0; values.len()],
            Some(sigma) => inverse_uncertainties(sigma, values.len())?,
        };
        if values.len() < 3 { return Err(FitError::TooFewPoints(values.len())) }
        Ok(Self { times, values, scale })
    }

    fn len(&self) -> usize { self.values.len() }

    fn samples(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.times.iter().zip(self.values).zip(&self.scale).map(|((&t, &y), &s)| (t, y, s))
    }

    fn cost(&self, rates: &Rates) -> f64 {
        self.samples().map(|(t, y, s)| (s * (y - rates.uptake(t))).powi(2)).sum()
    }

    /// `(JᵀJ, Jᵀr, rᵀr)` for weighted residuals `r = s·(y - f)`
    fn normal_equations(&self, rates: &Rates) -> (Matrix3<f64>, Vector3<f64>, f64) {
        let mut jtj = Matrix3::zeros();
        let mut jtr = Vector3::zeros();
        let mut cost = 0.0;
        for (t, y, s) in self.samples() {
            let j = rates.gradient(t) * s;
            let r = s * (y - rates.uptake(t));
            jtj += j * j.transpose();
            jtr += j * r;
            cost += r * r;
        }
        (jtj, jtr, cost)
    }

    fn levenberg_marquardt(&self, start: Rates) -> Outcome {
        let mut p = start.as_vector();
        let mut cost = self.cost(&start);
        let mut evaluations = 1;
        if !cost.is_finite() { return Outcome { rates: start, cost, evaluations } }
        let mut lambda: Option<f64> = None;

        for _ in 0..MAX_ITERATIONS {
            let (jtj, jtr, _) = self.normal_equations(&Rates::from_vector(p));
            evaluations += 1;
            if jtr.amax() < 1e-15 { break }
            let lambda = lambda.get_or_insert_with(|| 1e-3 * jtj.diagonal().max());

            let mut accepted = None;
            for _ in 0..MAX_DAMPING_ATTEMPTS {
                let mut damped = jtj;
                for i in 0..3 { damped[(i, i)] += *lambda * jtj[(i, i)].max(f64::MIN_POSITIVE) }
                let Some(step) = damped.lu().solve(&jtr) else { *lambda *= 10.0; continue };
                let trial = p + step;
                let trial_cost = self.cost(&Rates::from_vector(trial));
                evaluations += 1;
                if trial_cost.is_finite() && trial_cost < cost {
                    *lambda = (*lambda / 10.0).max(1e-12);
                    accepted = Some((step, trial, trial_cost));
                    break
                }
                *lambda *= 10.0;
            }

            let Some((step, trial, trial_cost)) = accepted else { break };
            let reduction = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
            p = trial;
            cost = trial_cost;
            if reduction < 1e-15 || step.norm() < 1e-14 * (p.norm() + 1e-14) { break }
        }
        Outcome { rates: Rates::from_vector(p), cost, evaluations }
    }
}

/// `1/σ` with zero uncertainties replaced by the smallest positive one
fn inverse_uncertainties(sigma: &[f64], n: usize) -> Result<Vec<f64>, FitError> {
    if sigma.len() != n {
        return Err(FitError::UncertaintyLength { values: n, uncertainties: sigma.len() })
    }
    if let Some(index) = sigma.iter().position(|s| !(s.is_finite() && *s >= 0.0)) {
        return Err(FitError::BadUncertainty { index })
    }
    let smallest = sigma.iter().copied()
        .filter(|&s| s > 0.0)
        .min_by(f64::total_cmp)
        .ok_or(FitError::AllZeroUncertainty)?;
    if sigma.contains(&0.0) {
        log::warn!("Zero uncertainties replaced by the smallest non-zero one: {smallest}");
    }
    Ok(sigma.iter().map(|&s| 1.0 / if s > 0.0 { s } else { smallest }).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use proptest::prelude::*;
    use rstest::rstest;

    const TIMES: [f64; 7] = [2.0, 6.0, 24.0, 48.0, 72.0, 96.0, 144.0];

    fn truth() -> Rates { Rates::new(0.04, 0.12, 0.006) }

    fn noiseless(times: &[f64]) -> Vec<f64> { times.iter().map(|&t| truth().uptake(t)).collect() }

    #[test]
    fn model_values() {
        let r = truth();
        assert_eq!(r.uptake(0.0), 0.0);
        assert_float_eq!(r.uptake(24.0), 0.04 / 0.114 * ((-0.144_f64).exp() - (-2.88_f64).exp()), r2nd <= 1e-14);
        assert_float_eq!(uptake(24.0, &r), r.uptake(24.0), ulps <= 0);
    }

    #[test]
    fn model_is_symmetric_in_the_exponential_rates() {
        let a = Rates::new(0.03, 0.2, 0.01);
        let b = Rates::new(0.03, 0.01, 0.2);
        for t in [1.0, 10.0, 100.0] { assert_float_eq!(a.uptake(t), b.uptake(t), r2nd <= 1e-12) }
    }

    #[test]
    fn equal_rates_are_singular() {
        assert!(!Rates::new(0.05, 0.1, 0.1).uptake(5.0).is_finite());
    }

    proptest! {
        #[test]
        fn gradient_matches_finite_differences(t in 0.0..200.0_f64,
                                               k_t in 0.01..0.1_f64,
                                               k_B in 0.05..0.5_f64,
                                               k_T in 0.001..0.02_f64) {
            let r = Rates::new(k_t, k_B, k_T);
            let g = r.gradient(t);
            let h = 1e-7;
            let num = [
                (Rates::new(k_t + h, k_B, k_T).uptake(t) - Rates::new(k_t - h, k_B, k_T).uptake(t)) / (2.0 * h),
                (Rates::new(k_t, k_B + h, k_T).uptake(t) - Rates::new(k_t, k_B - h, k_T).uptake(t)) / (2.0 * h),
                (Rates::new(k_t, k_B, k_T + h).uptake(t) - Rates::new(k_t, k_B, k_T - h).uptake(t)) / (2.0 * h),
            ];
            for i in 0..3 {
                prop_assert!((g[i] - num[i]).abs() <= 1e-5 * (1.0 + g[i].abs()), "{i}: {} vs {}", g[i], num[i]);
            }
        }
    }

    #[test]
    fn recovers_noiseless_parameters() {
        let fit = fit_uptake(&TIMES, &noiseless(&TIMES), None).unwrap();
        assert_float_eq!(fit.rates.k_t, 0.04 , r2nd <= 1e-6);
        assert_float_eq!(fit.rates.k_B, 0.12 , r2nd <= 1e-6);
        assert_float_eq!(fit.rates.k_T, 0.006, r2nd <= 1e-6);
        assert!(fit.chi_square < 1e-20);
        assert_eq!(fit.degrees_of_freedom, 4);
        let covariance = fit.covariance.unwrap();
        assert!(covariance.iter().all(|c| c.is_finite()));
        assert!(fit.stderr.iter().all(|e| e.is_some()));
    }

    #[test]
    fn weighted_fit_of_noisy_data() {
        let jitter = [1.02, 0.98, 1.01, 0.99, 1.02, 0.97, 1.0];
        let values: Vec<_> = noiseless(&TIMES).iter().zip(jitter).map(|(y, j)| y * j).collect();
        let sigma: Vec<_> = values.iter().map(|y| 0.05 * y).collect();
        let fit = fit_uptake(&TIMES, &values, Some(&sigma)).unwrap();
        assert_float_eq!(fit.rates.k_t, 0.04 , r2nd <= 0.02);
        assert_float_eq!(fit.rates.k_B, 0.12 , r2nd <= 0.02);
        assert_float_eq!(fit.rates.k_T, 0.006, r2nd <= 0.02);
        for (error, expected) in fit.stderr.iter().zip([8.8e-4, 4.3e-3, 2.9e-4]) {
            assert_float_eq!(error.unwrap(), expected, r2nd <= 0.05);
        }
    }

    #[test]
    fn zero_uncertainty_is_replaced_by_smallest() {
        let values = noiseless(&TIMES);
        let mut sigma: Vec<_> = values.iter().map(|y| 0.05 * y).collect();
        sigma[3] = 0.0;
        assert_eq!(inverse_uncertainties(&sigma, 7).unwrap()[3], 1.0 / (0.05 * values[0]));
        assert!(fit_uptake(&TIMES, &values, Some(&sigma)).is_ok());
    }

    #[test]
    fn three_points_give_no_errors() {
        let times = [6.0, 24.0, 96.0];
        let fit = fit_uptake(&times, &noiseless(&times), None).unwrap();
        assert_float_eq!(fit.rates.k_T, 0.006, r2nd <= 1e-6);
        assert_eq!(fit.degrees_of_freedom, 0);
        assert_eq!(fit.covariance, None);
        assert_eq!(fit.stderr, [None; 3]);
    }

    #[test]
    fn swapped_solution_is_reported_in_canonical_order() {
        let values = noiseless(&TIMES);
        let fit = fit_uptake_from(&TIMES, &values, None, Rates::new(0.04, 0.006, 0.12), 1).unwrap();
        assert!(fit.rates.k_B > fit.rates.k_T);
        assert_float_eq!(fit.rates.k_T, 0.006, r2nd <= 1e-6);
    }

    #[rstest(/**/ times, values, sigma, expected,
             case(vec![], vec![], None, FitError::Empty),
             case(vec![1.0, 2.0], vec![0.1], None, FitError::LengthMismatch { times: 2, values: 1 }),
             case(vec![1.0, 2.0, 3.0], vec![0.1, f64::NAN, 0.2], None, FitError::NonFinite { index: 1 }),
             case(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3], Some(vec![0.0, 0.0, 0.0]), FitError::AllZeroUncertainty),
             case(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3], Some(vec![0.1, 0.1]), FitError::UncertaintyLength { values: 3, uncertainties: 2 }),
             case(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3], Some(vec![0.1, -0.1, 0.1]), FitError::BadUncertainty { index: 1 }),
             case(vec![1.0, 2.0], vec![0.1, 0.2], None, FitError::TooFewPoints(2)),
    )]
    fn invalid_input(times: Vec<f64>, values: Vec<f64>, sigma: Option<Vec<f64>>, expected: FitError) {
        assert_eq!(fit_uptake(&times, &values, sigma.as_deref()), Err(expected));
    }
}
