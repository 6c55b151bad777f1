//! Win-probability models.
//!
//! The engine is decoupled from any specific learner through the
//! [`WinProbModel`] trait; the shipped implementation is [`BoostedLogit`],
//! a calibrated logistic model trained by rounds of batch gradient descent.

use std::path::Path;

use crate::error::Result;
use crate::features::{FeatureVector, TrainingSet};

pub mod calibration;
mod logistic;

pub use calibration::{apply_platt, fit_platt, PlattCalibration};
pub use logistic::BoostedLogit;

/// Strategy seam between the walk-forward engine and the learner.
///
/// Implementations must hold the recorded feature-name ordering from
/// training time and reorder prediction inputs to match it.
pub trait WinProbModel {
    /// Fit from scratch, replacing any previous state.
    ///
    /// The last `calibration_fraction` of rows (chronologically the most
    /// recent — rows are never shuffled) are held out for the calibration
    /// map. A holdout below the minimum viable size skips calibration.
    ///
    /// Fails with `InsufficientData` below 10 rows; never silently degrades.
    fn fit(&mut self, data: &TrainingSet, boost_rounds: usize, calibration_fraction: f64) -> Result<()>;

    /// P(home win) for one feature vector. Fails with `ModelNotFitted`
    /// before the first successful `fit` — never returns a default.
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64>;

    /// Continue training the base learner on new rows *without* refitting
    /// the calibration map. Recalibration requires a full `fit`.
    fn update(&mut self, data: &TrainingSet, rounds: usize) -> Result<()>;

    fn is_fitted(&self) -> bool;

    /// Persist base-learner state, calibration map, and the ordered
    /// feature-name list.
    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized;
}
