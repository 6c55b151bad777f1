//! Human-oriented run report: monthly breakdown, standout bets, and
//! rule-based tuning recommendations.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestResult, BetRecord};

use super::BacktestMetrics;

const STANDOUT_BETS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyBreakdown {
    /// Calendar month, `YYYY-MM`.
    pub month: String,
    pub bets: usize,
    pub wagered: f64,
    pub profit: f64,
    pub roi_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub train_seasons: Vec<i32>,
    pub test_seasons: Vec<i32>,
    pub final_bankroll: f64,
    pub metrics: BacktestMetrics,
    pub monthly: Vec<MonthlyBreakdown>,
    /// Most profitable bets, best first.
    pub best_bets: Vec<BetRecord>,
    /// Costliest bets, worst first.
    pub worst_bets: Vec<BetRecord>,
    pub recommendations: Vec<String>,
}

fn monthly_breakdown(bets: &[BetRecord]) -> Vec<MonthlyBreakdown> {
    let mut months: BTreeMap<(i32, u32), Vec<&BetRecord>> = BTreeMap::new();
    for bet in bets {
        months
            .entry((bet.date.year(), bet.date.month()))
            .or_default()
            .push(bet);
    }
    months
        .into_iter()
        .map(|((year, month), bets)| {
            let wagered: f64 = bets.iter().map(|b| b.wager).sum();
            let profit: f64 = bets.iter().map(|b| b.profit()).sum();
            MonthlyBreakdown {
                month: format!("{year}-{month:02}"),
                bets: bets.len(),
                wagered,
                profit,
                roi_pct: if wagered > 0.0 {
                    profit / wagered * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

fn recommendations(metrics: &BacktestMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.total_bets == 0 {
        out.push(
            "No bets cleared the EV threshold; lower min_ev_threshold or review the odds archive coverage."
                .to_string(),
        );
        return out;
    }
    if metrics.roi_pct < -5.0 {
        out.push(format!(
            "ROI of {:.1}% is strongly negative; raise min_ev_threshold to bet more selectively.",
            metrics.roi_pct
        ));
    }
    if metrics.brier_score >= 0.25 {
        out.push(format!(
            "Brier score of {:.3} is no better than chance; recalibrate or retrain the model.",
            metrics.brier_score
        ));
    }
    if metrics.avg_clv_pct < 0.0 {
        out.push(format!(
            "Average CLV of {:.2}% means bets are priced worse than the close; the model is behind the market.",
            metrics.avg_clv_pct
        ));
    }
    out
}

/// Build the report for a finished run.
pub fn build_report(result: &BacktestResult) -> BacktestReport {
    let mut ranked: Vec<BetRecord> = result.bets.clone();
    ranked.sort_by(|a, b| {
        b.profit()
            .partial_cmp(&a.profit())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let best_bets: Vec<BetRecord> = ranked.iter().take(STANDOUT_BETS).cloned().collect();
    let worst_bets: Vec<BetRecord> = ranked
        .iter()
        .rev()
        .take(STANDOUT_BETS)
        .cloned()
        .collect();

    BacktestReport {
        train_seasons: result.train_seasons.clone(),
        test_seasons: result.test_seasons.clone(),
        final_bankroll: result.final_bankroll,
        metrics: result.metrics.clone(),
        monthly: monthly_breakdown(&result.bets),
        best_bets,
        worst_bets,
        recommendations: recommendations(&result.metrics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bet(day: (i32, u32, u32), wager: f64, won: bool) -> BetRecord {
        BetRecord {
            game_id: format!("g-{}-{}-{}", day.0, day.1, day.2),
            date: NaiveDate::from_ymd_opt(day.0, day.1, day.2).unwrap(),
            predicted_prob: 0.6,
            market_odds: 2.0,
            expected_value: 0.2,
            wager,
            payout: if won { wager * 2.0 } else { 0.0 },
            won,
            closing_odds: None,
        }
    }

    fn result_with(bets: Vec<BetRecord>) -> BacktestResult {
        let predictions = vec![0.6; bets.len()];
        let outcomes: Vec<f64> = bets.iter().map(|b| if b.won { 1.0 } else { 0.0 }).collect();
        let metrics = crate::metrics::compute_metrics(&bets, &predictions, &outcomes);
        BacktestResult {
            bets,
            metrics,
            train_seasons: vec![2022],
            test_seasons: vec![2023],
            final_bankroll: 10_000.0,
            predictions,
            outcomes,
        }
    }

    #[test]
    fn months_are_grouped_and_ordered() {
        let result = result_with(vec![
            bet((2023, 11, 5), 100.0, true),
            bet((2023, 11, 20), 100.0, false),
            bet((2024, 1, 3), 100.0, true),
            bet((2023, 12, 10), 100.0, true),
        ]);
        let report = build_report(&result);
        let months: Vec<&str> = report.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01"]);
        assert_eq!(report.monthly[0].bets, 2);
        assert!((report.monthly[0].roi_pct - 0.0).abs() < 1e-9);
    }

    #[test]
    fn standout_bets_are_ranked_by_profit() {
        let mut bets = Vec::new();
        for day in 1..=10 {
            bets.push(bet((2023, 11, day), day as f64 * 10.0, day % 2 == 0));
        }
        let report = build_report(&result_with(bets));
        assert_eq!(report.best_bets.len(), 5);
        assert_eq!(report.worst_bets.len(), 5);
        assert!(report.best_bets[0].profit() >= report.best_bets[4].profit());
        assert!(report.worst_bets[0].profit() <= report.worst_bets[4].profit());
        assert!(report.best_bets[0].won);
        assert!(!report.worst_bets[0].won);
    }

    #[test]
    fn losing_run_recommends_tighter_threshold() {
        let bets: Vec<BetRecord> = (1..=20)
            .map(|day| bet((2023, 11, day), 100.0, false))
            .collect();
        let report = build_report(&result_with(bets));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("min_ev_threshold")));
    }

    #[test]
    fn empty_run_recommends_reviewing_threshold() {
        let report = build_report(&result_with(Vec::new()));
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.monthly.is_empty());
        assert!(report.best_bets.is_empty());
    }
}
