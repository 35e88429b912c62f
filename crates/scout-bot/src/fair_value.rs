//! Log-normal fair value for crypto threshold markets.
//!
//! Computes the model-implied probability that a spot price crosses a
//! target by expiry under a driftless log-normal walk:
//!
//! ```text
//! d2 = (ln(S/K) - sigma^2 * T / 2) / (sigma * sqrt(T))
//! P(S_T > K) = phi(d2)
//! ```
//!
//! The standard-normal CDF uses the Abramowitz & Stegun 26.2.17 polynomial
//! approximation (absolute error < 7.5e-8), which is plenty for probability
//! edges quoted to two decimals.
//!
//! This is the one module in the crate that works in `f64`: the model needs
//! `ln`/`sqrt`/`exp`, and its output is a probability, not money. Callers
//! convert `Decimal` prices at the boundary.

/// Days in a year for time-to-expiry conversion.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Probabilities are clamped into this band; the model is never certain.
const PROB_MIN: f64 = 0.01;
const PROB_MAX: f64 = 0.99;

/// Probability assigned at/after expiry when the target is already crossed.
const EXPIRED_IN_THE_MONEY: f64 = 0.98;
/// Probability assigned at/after expiry when the target is not crossed.
const EXPIRED_OUT_OF_MONEY: f64 = 0.02;

/// Abramowitz & Stegun 26.2.17 constants.
const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;
const P: f64 = 0.3275911;

/// Model-implied probability that the spot ends above the target.
///
/// `spot` and `target` must be positive; `annual_vol` is the annualised
/// volatility as a fraction; `years` is time to expiry (365.25-day years).
pub fn probability_above(spot: f64, target: f64, annual_vol: f64, years: f64) -> f64 {
    if years <= 0.0 {
        return if spot >= target {
            EXPIRED_IN_THE_MONEY
        } else {
            EXPIRED_OUT_OF_MONEY
        };
    }

    let variance_drag = annual_vol * annual_vol * years / 2.0;
    let d2 = ((spot / target).ln() - variance_drag) / (annual_vol * years.sqrt());
    normal_cdf(d2).clamp(PROB_MIN, PROB_MAX)
}

/// Probability that the spot ends below the target (complement).
pub fn probability_below(spot: f64, target: f64, annual_vol: f64, years: f64) -> f64 {
    let above = probability_above(spot, target, annual_vol, years);
    (1.0 - above).clamp(PROB_MIN, PROB_MAX)
}

/// Convert days to model years.
pub fn years_from_days(days: f64) -> f64 {
    days / DAYS_PER_YEAR
}

/// Standard normal CDF via Abramowitz & Stegun 26.2.17.
pub fn normal_cdf(x: f64) -> f64 {
    if x < 0.0 {
        return 1.0 - normal_cdf(-x);
    }
    let t = 1.0 / (1.0 + P * x);
    let poly = t * (A1 + t * (A2 + t * (A3 + t * (A4 + t * A5))));
    let pdf = (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt();
    1.0 - pdf * poly
}
