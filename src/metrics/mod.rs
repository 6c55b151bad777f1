//! Performance metrics for a completed run.
//!
//! Betting metrics (ROI, drawdown, CLV) are computed over placed bets only;
//! probability metrics (Brier, calibration error) score the full prediction
//! series, bet or not. A run that placed no bets reports all zeros.

use serde::{Deserialize, Serialize};

use crate::backtest::BetRecord;

pub mod report;

pub use report::{build_report, BacktestReport, MonthlyBreakdown};

const CALIBRATION_BINS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_wagered: f64,
    /// Gross returns: sum of payouts.
    pub total_returned: f64,
    pub net_profit: f64,
    /// Profit over turnover, in percent.
    pub roi_pct: f64,
    /// Mean expected value of placed bets.
    pub avg_edge: f64,
    pub brier_score: f64,
    /// Expected calibration error over ten probability bins.
    pub calibration_error: f64,
    /// Mean closing line value of bets with a recorded closing price.
    pub avg_clv_pct: f64,
    /// Share of those bets priced better than the close.
    pub clv_beat_rate: f64,
    /// Deepest peak-to-trough fall of the cumulative profit curve, in
    /// currency units.
    pub max_drawdown: f64,
    /// Gross wins over gross losses; 0.0 when nothing was lost.
    pub profit_factor: f64,
}

/// Closing line value of one bet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosingLineValue {
    /// Implied-probability move from bet price to close, in percent.
    /// Positive means the bet got a better price than the close.
    pub clv_percentage: f64,
    pub beat_closing: bool,
}

/// CLV from decimal prices: relative change in implied probability,
/// ((1/closing − 1/bet) / (1/bet)) × 100.
pub fn calculate_clv(bet_odds: f64, closing_odds: f64) -> ClosingLineValue {
    let implied_bet = 1.0 / bet_odds;
    let implied_close = 1.0 / closing_odds;
    let clv_percentage = (implied_close - implied_bet) / implied_bet * 100.0;
    ClosingLineValue {
        clv_percentage,
        beat_closing: clv_percentage > 0.0,
    }
}

/// Mean squared error of probabilities against 0/1 outcomes.
pub fn brier_score(predictions: &[f64], outcomes: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(outcomes.iter())
        .map(|(p, y)| (p - y).powi(2))
        .sum::<f64>()
        / predictions.len() as f64
}

/// One non-empty probability bin of the calibration histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub count: usize,
    pub mean_predicted: f64,
    pub win_rate: f64,
}

/// Bucket predictions into ten equal-width bins. Empty bins are dropped;
/// the counts of the returned bins always sum to the sample size.
pub fn calibration_bins(predictions: &[f64], outcomes: &[f64]) -> Vec<CalibrationBin> {
    let mut bin_pred = [0.0; CALIBRATION_BINS];
    let mut bin_outcome = [0.0; CALIBRATION_BINS];
    let mut bin_count = [0usize; CALIBRATION_BINS];

    for (p, y) in predictions.iter().zip(outcomes.iter()) {
        let bin = ((p * CALIBRATION_BINS as f64) as usize).min(CALIBRATION_BINS - 1);
        bin_pred[bin] += p;
        bin_outcome[bin] += y;
        bin_count[bin] += 1;
    }

    (0..CALIBRATION_BINS)
        .filter(|&bin| bin_count[bin] > 0)
        .map(|bin| {
            let count = bin_count[bin] as f64;
            CalibrationBin {
                count: bin_count[bin],
                mean_predicted: bin_pred[bin] / count,
                win_rate: bin_outcome[bin] / count,
            }
        })
        .collect()
}

/// Calibration error: the unweighted mean, across non-empty bins, of the
/// gap between each bin's mean predicted probability and its observed win
/// rate. A sparse bin counts the same as a full one.
pub fn calibration_error(predictions: &[f64], outcomes: &[f64]) -> f64 {
    let bins = calibration_bins(predictions, outcomes);
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter()
        .map(|b| (b.mean_predicted - b.win_rate).abs())
        .sum::<f64>()
        / bins.len() as f64
}

fn max_drawdown(bets: &[BetRecord]) -> f64 {
    let mut equity = 0.0f64;
    let mut peak = 0.0f64;
    let mut worst = 0.0f64;
    for bet in bets {
        equity += bet.profit();
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }
    worst
}

/// Aggregate a run's bets and prediction series into [`BacktestMetrics`].
pub fn compute_metrics(
    bets: &[BetRecord],
    predictions: &[f64],
    outcomes: &[f64],
) -> BacktestMetrics {
    if bets.is_empty() {
        return BacktestMetrics::default();
    }

    let total_bets = bets.len();
    let wins = bets.iter().filter(|b| b.won).count();
    let losses = total_bets - wins;
    let total_wagered: f64 = bets.iter().map(|b| b.wager).sum();
    let total_returned: f64 = bets.iter().map(|b| b.payout).sum();
    let net_profit = total_returned - total_wagered;
    let roi_pct = if total_wagered > 0.0 {
        net_profit / total_wagered * 100.0
    } else {
        0.0
    };
    let avg_edge = bets.iter().map(|b| b.expected_value).sum::<f64>() / total_bets as f64;

    let clvs: Vec<ClosingLineValue> = bets
        .iter()
        .filter_map(|b| b.closing_odds.map(|c| calculate_clv(b.market_odds, c)))
        .collect();
    let (avg_clv_pct, clv_beat_rate) = if clvs.is_empty() {
        (0.0, 0.0)
    } else {
        let n = clvs.len() as f64;
        (
            clvs.iter().map(|c| c.clv_percentage).sum::<f64>() / n,
            clvs.iter().filter(|c| c.beat_closing).count() as f64 / n,
        )
    };

    let gross_wins: f64 = bets.iter().filter(|b| b.won).map(|b| b.profit()).sum();
    let gross_losses: f64 = bets
        .iter()
        .filter(|b| !b.won)
        .map(|b| b.wager)
        .sum();
    let profit_factor = if gross_losses > 0.0 {
        gross_wins / gross_losses
    } else {
        0.0
    };

    BacktestMetrics {
        total_bets,
        wins,
        losses,
        win_rate: wins as f64 / total_bets as f64,
        total_wagered,
        total_returned,
        net_profit,
        roi_pct,
        avg_edge,
        brier_score: brier_score(predictions, outcomes),
        calibration_error: calibration_error(predictions, outcomes),
        avg_clv_pct,
        clv_beat_rate,
        max_drawdown: max_drawdown(bets),
        profit_factor,
    }
}
