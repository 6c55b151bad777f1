use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::calibration::{self, apply_platt, fit_platt, PlattCalibration};
use super::WinProbModel;
use crate::error::{BacktestError, Result};
use crate::features::{FeatureVector, TrainingSet};

/// Fitting below this many rows is a hard error, never a degraded fit.
const MIN_FIT_ROWS: usize = 10;

const PLATT_ITERS: usize = 500;
const PLATT_LR: f64 = 0.2;
const PLATT_L2: f64 = 1e-3;

/// Calibrated logistic win-probability model.
///
/// The base learner is a logistic regression over standardized features,
/// trained by rounds of batch gradient descent; `boost_rounds` controls the
/// round count and `update` continues from the current weights. A Platt map
/// fitted on a chronological holdout calibrates the raw scores.
#[derive(Debug, Clone)]
pub struct BoostedLogit {
    learning_rate: f64,
    l2: f64,
    state: Option<FittedState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedState {
    /// Training-time column order; prediction inputs are reordered to this.
    feature_names: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
    /// Standardization statistics from the base-training rows.
    means: Vec<f64>,
    stds: Vec<f64>,
    calibration: Option<PlattCalibration>,
}

impl Default for BoostedLogit {
    fn default() -> Self {
        Self::new()
    }
}

impl BoostedLogit {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 1e-4,
            state: None,
        }
    }

    /// Whether a calibration map is active (test hook and report detail).
    pub fn is_calibrated(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.calibration.is_some())
    }

    fn standardize(state: &FittedState, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(state.means.iter().zip(state.stds.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    fn raw_score(state: &FittedState, row: &[f64]) -> f64 {
        let z: f64 = Self::standardize(state, row)
            .iter()
            .zip(state.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + state.bias;
        calibration::sigmoid(z)
    }

    fn train_rounds(&self, state: &mut FittedState, rows: &[Vec<f64>], targets: &[f64], rounds: usize) {
        let n = rows.len() as f64;
        let dim = state.weights.len();
        for i in 0..rounds.max(1) {
            let lr = self.learning_rate / (1.0 + 0.01 * i as f64);
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;
            for (row, y) in rows.iter().zip(targets.iter()) {
                let std_row = Self::standardize(state, row);
                let p = Self::raw_score(state, row);
                let err = p - y;
                for (g, x) in grad_w.iter_mut().zip(std_row.iter()) {
                    *g += err * x;
                }
                grad_b += err;
            }
            for (w, g) in state.weights.iter_mut().zip(grad_w.iter()) {
                *w -= lr * (g / n + self.l2 * *w);
            }
            state.bias -= lr * grad_b / n;
        }
    }
}

impl WinProbModel for BoostedLogit {
    fn fit(&mut self, data: &TrainingSet, boost_rounds: usize, calibration_fraction: f64) -> Result<()> {
        let n = data.len();
        if n < MIN_FIT_ROWS {
            return Err(BacktestError::InsufficientData {
                needed: MIN_FIT_ROWS,
                got: n,
            });
        }

        let names = data.feature_names.clone();
        let rows: Vec<Vec<f64>> = data.rows.iter().map(|fv| fv.to_row(&names)).collect();
        let dim = names.len();

        // Chronological split: base learner on the older rows, calibration
        // on the most recent ones. Never shuffled.
        let holdout = (n as f64 * calibration_fraction.clamp(0.0, 0.5)).round() as usize;
        let holdout = if holdout < calibration::MIN_CALIBRATION_SAMPLES {
            0
        } else {
            holdout
        };
        let base_n = n - holdout;

        let mut means = vec![0.0; dim];
        let mut stds = vec![0.0; dim];
        for row in &rows[..base_n] {
            for (m, x) in means.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        for m in means.iter_mut() {
            *m /= base_n as f64;
        }
        for row in &rows[..base_n] {
            for (s, (x, m)) in stds.iter_mut().zip(row.iter().zip(means.iter())) {
                *s += (x - m).powi(2);
            }
        }
        for s in stds.iter_mut() {
            *s = (*s / base_n as f64).sqrt().max(1e-9);
        }

        let mut state = FittedState {
            feature_names: names,
            weights: vec![0.0; dim],
            bias: 0.0,
            means,
            stds,
            calibration: None,
        };
        self.train_rounds(&mut state, &rows[..base_n], &data.targets[..base_n], boost_rounds);

        if holdout > 0 {
            let samples: Vec<(f64, f64)> = rows[base_n..]
                .iter()
                .zip(data.targets[base_n..].iter())
                .map(|(row, y)| (Self::raw_score(&state, row), *y))
                .collect();
            // A degenerate holdout (single class) skips calibration rather
            // than failing the fit.
            state.calibration = fit_platt(&samples, PLATT_ITERS, PLATT_LR, PLATT_L2);
        }

        info!(
            rows = n,
            base_rows = base_n,
            holdout,
            calibrated = state.calibration.is_some(),
            "Fitted win-probability model"
        );
        self.state = Some(state);
        Ok(())
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        let state = self.state.as_ref().ok_or(BacktestError::ModelNotFitted)?;
        let row = features.to_row(&state.feature_names);
        let raw = Self::raw_score(state, &row);
        Ok(match state.calibration {
            Some(model) => apply_platt(raw, model),
            None => raw,
        })
    }

    fn update(&mut self, data: &TrainingSet, rounds: usize) -> Result<()> {
        let mut state = self.state.take().ok_or(BacktestError::ModelNotFitted)?;
        let rows: Vec<Vec<f64>> = data
            .rows
            .iter()
            .map(|fv| fv.to_row(&state.feature_names))
            .collect();
        if !rows.is_empty() {
            self.train_rounds(&mut state, &rows, &data.targets, rounds);
            debug!(rows = rows.len(), rounds, "Continued base-learner training");
        }
        self.state = Some(state);
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.as_ref().ok_or(BacktestError::ModelNotFitted)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, state)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let state: FittedState = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self {
            state: Some(state),
            ..Self::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    /// Two-feature dataset where feature "edge" separates the classes.
    fn separable_set(n: usize) -> TrainingSet {
        let mut set = TrainingSet::default();
        for i in 0..n {
            let y = if i % 2 == 0 { 1.0 } else { 0.0 };
            let mut fv = FeatureVector::default();
            fv.insert("edge", if y > 0.5 { 1.0 } else { -1.0 } + (i as f64 * 0.001));
            fv.insert("noise", (i % 7) as f64);
            if set.feature_names.is_empty() {
                set.feature_names = fv.names();
            }
            set.rows.push(fv);
            set.targets.push(y);
            set.dates
                .push(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64));
            set.seasons.push(2023);
        }
        set
    }

    fn winner_features() -> FeatureVector {
        let mut fv = FeatureVector::default();
        fv.insert("edge", 1.0);
        fv.insert("noise", 3.0);
        fv
    }

    fn loser_features() -> FeatureVector {
        let mut fv = FeatureVector::default();
        fv.insert("edge", -1.0);
        fv.insert("noise", 3.0);
        fv
    }

    #[test]
    fn predict_before_fit_is_fatal() {
        let model = BoostedLogit::new();
        let err = model.predict_proba(&winner_features()).unwrap_err();
        assert!(matches!(err, BacktestError::ModelNotFitted));
    }

    #[test]
    fn fit_with_too_few_rows_is_fatal() {
        let mut model = BoostedLogit::new();
        let err = model.fit(&separable_set(9), 50, 0.2).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InsufficientData { needed: 10, got: 9 }
        ));
    }

    #[test]
    fn fit_learns_a_separable_signal() {
        let mut model = BoostedLogit::new();
        model.fit(&separable_set(200), 300, 0.2).unwrap();
        assert!(model.is_fitted());
        let p_win = model.predict_proba(&winner_features()).unwrap();
        let p_lose = model.predict_proba(&loser_features()).unwrap();
        assert!(p_win > 0.7, "p_win={p_win}");
        assert!(p_lose < 0.3, "p_lose={p_lose}");
    }

    #[test]
    fn small_holdout_skips_calibration() {
        let mut model = BoostedLogit::new();
        // 5% of 20 rows rounds to 1 < minimum viable -> raw scores.
        model.fit(&separable_set(20), 50, 0.05).unwrap();
        assert!(!model.is_calibrated());
    }

    #[test]
    fn large_holdout_fits_calibration() {
        let mut model = BoostedLogit::new();
        model.fit(&separable_set(200), 300, 0.2).unwrap();
        assert!(model.is_calibrated());
    }

    #[test]
    fn update_requires_a_fitted_model() {
        let mut model = BoostedLogit::new();
        let err = model.update(&separable_set(20), 10).unwrap_err();
        assert!(matches!(err, BacktestError::ModelNotFitted));
    }

    #[test]
    fn update_moves_weights_but_not_calibration() {
        let mut model = BoostedLogit::new();
        model.fit(&separable_set(200), 100, 0.2).unwrap();
        let calibrated_before = model.is_calibrated();
        let before = model.predict_proba(&winner_features()).unwrap();
        model.update(&separable_set(50), 100).unwrap();
        let after = model.predict_proba(&winner_features()).unwrap();
        assert_ne!(before, after);
        assert_eq!(model.is_calibrated(), calibrated_before);
    }

    #[test]
    fn save_load_roundtrip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut model = BoostedLogit::new();
        model.fit(&separable_set(100), 200, 0.2).unwrap();
        let expected = model.predict_proba(&winner_features()).unwrap();
        model.save(&path).unwrap();

        let loaded = BoostedLogit::load(&path).unwrap();
        let got = loaded.predict_proba(&winner_features()).unwrap();
        assert_relative_eq!(expected, got, epsilon = 1e-12);
    }

    #[test]
    fn save_before_fit_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let model = BoostedLogit::new();
        let err = model.save(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, BacktestError::ModelNotFitted));
    }
}
