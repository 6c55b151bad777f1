//! Probability calibration (Platt scaling).
//!
//! The map is `p_calibrated = sigmoid(a * logit(p_raw) + b)`, fitted by
//! gradient descent on (raw score, outcome) pairs — a logistic regression on
//! the base learner's raw output.

use serde::{Deserialize, Serialize};
use tracing::debug;

const EPS: f64 = 1e-6;

/// Minimum holdout size below which calibration is skipped entirely and raw
/// scores are used as-is.
pub const MIN_CALIBRATION_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCalibration {
    pub a: f64,
    pub b: f64,
}

pub(crate) fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

pub(crate) fn logit(p: f64) -> f64 {
    let p = clamp_prob(p);
    (p / (1.0 - p)).ln()
}

/// Numerically stable sigmoid.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

pub fn apply_platt(raw_prob: f64, model: PlattCalibration) -> f64 {
    let x = logit(raw_prob);
    sigmoid(model.a * x + model.b).clamp(0.0, 1.0)
}

/// Fit a Platt map on `(raw_prob, outcome)` samples.
///
/// Returns `None` when the sample is too small or single-class — callers
/// fall back to raw scores, never to a failed run.
pub fn fit_platt(samples: &[(f64, f64)], max_iters: usize, learning_rate: f64, l2: f64) -> Option<PlattCalibration> {
    if samples.len() < MIN_CALIBRATION_SAMPLES {
        return None;
    }
    let positives = samples.iter().filter(|(_, y)| *y > 0.5).count();
    if positives == 0 || positives == samples.len() {
        return None;
    }

    let n = samples.len() as f64;
    let mut a = 1.0f64;
    let mut b = 0.0f64;

    for i in 0..max_iters.max(1) {
        let lr = learning_rate / (1.0 + 0.01 * i as f64);
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (raw_p, y) in samples {
            let x = logit(*raw_p);
            let p = sigmoid(a * x + b);
            let err = p - *y;
            grad_a += err * x;
            grad_b += err;
        }
        grad_a = grad_a / n + l2 * a;
        grad_b /= n;
        a -= lr * grad_a;
        b -= lr * grad_b;
        if !a.is_finite() || !b.is_finite() {
            return None;
        }
    }

    let model = PlattCalibration { a, b };
    let (mut brier_before, mut brier_after) = (0.0, 0.0);
    for (raw_p, y) in samples {
        brier_before += (clamp_prob(*raw_p) - *y).powi(2);
        brier_after += (apply_platt(*raw_p, model) - *y).powi(2);
    }
    debug!(
        samples = samples.len(),
        a, b,
        brier_before = brier_before / n,
        brier_after = brier_after / n,
        "Fitted Platt calibration"
    );
    Some(model)
}
