//! Walk-forward betting simulation.
//!
//! The engine replays a held-out period one game at a time: every prediction
//! sees only games dated strictly before the game being decided, while the
//! model's worldview advances with simulated time through periodic retrains.
//! Retraining is deliberately decoupled from the decision loop — a cadence
//! boundary refits on everything before the current game, bounded to the
//! most recent `retrain_window_rows` rows.
//!
//! A single run is strictly sequential: each step observes bankroll and
//! model state mutated by the previous one. Independent runs share nothing
//! and can execute concurrently.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BacktestConfig, RetrainFrequency};
use crate::error::{BacktestError, Result};
use crate::features::FeatureBuilder;
use crate::metrics::{compute_metrics, BacktestMetrics};
use crate::model::WinProbModel;
use crate::store::{HistoricalGame, OddsIndex};

pub mod kelly;
pub mod splitter;
pub mod synthetic;

pub use splitter::{walk_forward_splits, WalkForwardFold};

/// Minimum raw games in the seed training seasons.
const MIN_SEED_GAMES: usize = 50;
/// Minimum feature rows after the sparsity guard.
const MIN_SEED_ROWS: usize = 30;
/// Minimum rows for any single (re)fit.
const MIN_FIT_ROWS: usize = 10;
/// Minimum games strictly before a test game for it to be evaluated.
const MIN_PRIOR_GAMES: usize = 10;

/// One simulated bet. Created once per qualifying game, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub game_id: String,
    pub date: NaiveDate,
    pub predicted_prob: f64,
    pub market_odds: f64,
    pub expected_value: f64,
    pub wager: f64,
    /// Gross return: wager × odds when won, 0 when lost.
    pub payout: f64,
    pub won: bool,
    /// Closing price for the bet outcome, when the archive recorded one.
    pub closing_odds: Option<f64>,
}

impl BetRecord {
    pub fn profit(&self) -> f64 {
        self.payout - self.wager
    }
}

/// Output of one walk-forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub bets: Vec<BetRecord>,
    pub metrics: BacktestMetrics,
    pub train_seasons: Vec<i32>,
    pub test_seasons: Vec<i32>,
    pub final_bankroll: f64,
    /// Model probabilities for every evaluated test game, bet or not —
    /// calibration is scored on the full series.
    pub predictions: Vec<f64>,
    /// 1.0 = home win, aligned with `predictions`.
    pub outcomes: Vec<f64>,
}

/// Mutable per-run state threaded through the decision loop. Owned by the
/// run, never global: independent runs are independently instantiable.
struct SimState {
    bankroll: f64,
    last_mark: Option<(i32, u32)>,
}

/// Cadence bucket for a date: calendar month, ISO week, or none.
fn cadence_mark(frequency: RetrainFrequency, date: NaiveDate) -> Option<(i32, u32)> {
    match frequency {
        RetrainFrequency::Monthly => Some((date.year(), date.month())),
        RetrainFrequency::Weekly => {
            let week = date.iso_week();
            Some((week.year(), week.week()))
        }
        RetrainFrequency::Never => None,
    }
}

/// Walk-forward simulation engine, generic over the injected model.
pub struct WalkForwardEngine<M: WinProbModel> {
    config: BacktestConfig,
    features: FeatureBuilder,
    model: M,
}

impl<M: WinProbModel> WalkForwardEngine<M> {
    pub fn new(config: BacktestConfig, model: M) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BacktestError::InvalidConfig(e.to_string()))?;
        let features = FeatureBuilder::new(config.lookback_games);
        Ok(Self {
            config,
            features,
            model,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Run the simulation: seed fit on `train_seasons`, then sequential
    /// decisions over `test_seasons`.
    ///
    /// Insufficient seed data is fatal; a test game without usable odds or
    /// without enough history is skipped and counted nowhere.
    pub fn run(
        &mut self,
        games: &[HistoricalGame],
        odds: &OddsIndex,
        train_seasons: &[i32],
        test_seasons: &[i32],
    ) -> Result<BacktestResult> {
        let mut all: Vec<HistoricalGame> = games.to_vec();
        all.sort_by(|a, b| (a.date, &a.game_id).cmp(&(b.date, &b.game_id)));

        // Seed fit on the training seasons.
        let train_pool: Vec<HistoricalGame> = all
            .iter()
            .filter(|g| train_seasons.contains(&g.season))
            .cloned()
            .collect();
        if train_pool.len() < MIN_SEED_GAMES {
            return Err(BacktestError::InsufficientData {
                needed: MIN_SEED_GAMES,
                got: train_pool.len(),
            });
        }
        let seed_set = self
            .features
            .training_dataset(&train_pool, self.config.min_games_required);
        if seed_set.len() < MIN_SEED_ROWS {
            return Err(BacktestError::InsufficientData {
                needed: MIN_SEED_ROWS,
                got: seed_set.len(),
            });
        }
        self.model.fit(
            &seed_set,
            self.config.boost_rounds,
            self.config.calibration_fraction,
        )?;
        info!(
            train_games = train_pool.len(),
            train_rows = seed_set.len(),
            ?train_seasons,
            ?test_seasons,
            "Seed model fitted, starting walk-forward run"
        );

        let test_idx: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, g)| test_seasons.contains(&g.season))
            .map(|(i, _)| i)
            .collect();

        let mut state = SimState {
            bankroll: self.config.bankroll,
            last_mark: None,
        };
        let mut bets: Vec<BetRecord> = Vec::new();
        let mut predictions = Vec::new();
        let mut outcomes = Vec::new();
        let mut skipped_history = 0usize;
        let mut skipped_odds = 0usize;

        for &i in &test_idx {
            let game = &all[i];
            // `all[..i]` can contain same-date games; the strict cutoff is
            // everything dated before this game.
            let cutoff = all[..i].partition_point(|g| g.date < game.date);
            if cutoff < MIN_PRIOR_GAMES {
                skipped_history += 1;
                continue;
            }

            let fv = self.features.compute(&all[..cutoff], game);
            let prob = self.model.predict_proba(&fv)?;

            let Some(quote) = odds.h2h_quote(&game.game_id, &game.home_team) else {
                debug!(game_id = %game.game_id, "No h2h odds, skipping game");
                skipped_odds += 1;
                continue;
            };

            predictions.push(prob);
            outcomes.push(if game.home_win() { 1.0 } else { 0.0 });

            let ev = kelly::expected_value(prob, quote.bet_odds);
            if ev >= self.config.min_ev_threshold {
                let fraction =
                    kelly::kelly_fraction(prob, quote.bet_odds, self.config.kelly_fraction);
                let stake = (fraction * state.bankroll)
                    .min(self.config.max_stake_fraction * state.bankroll);
                if stake > 0.0 && stake <= state.bankroll {
                    // The simulated bet backs the home side at the quoted
                    // price (the fallback quote prices the game, not a
                    // different pick).
                    let won = game.home_win();
                    let payout = if won { stake * quote.bet_odds } else { 0.0 };
                    state.bankroll += payout - stake;
                    debug!(
                        game_id = %game.game_id,
                        prob,
                        odds = quote.bet_odds,
                        ev,
                        stake,
                        won,
                        bankroll = state.bankroll,
                        "Placed simulated bet"
                    );
                    bets.push(BetRecord {
                        game_id: game.game_id.clone(),
                        date: game.date,
                        predicted_prob: prob,
                        market_odds: quote.bet_odds,
                        expected_value: ev,
                        wager: stake,
                        payout,
                        won,
                        closing_odds: quote.closing_odds,
                    });
                }
            }

            // Retrain when the cadence bucket changes. The first test game
            // only seeds the marker — the model was just fitted.
            if let Some(mark) = cadence_mark(self.config.retrain_frequency, game.date) {
                match state.last_mark {
                    None => state.last_mark = Some(mark),
                    Some(prev) if prev != mark => {
                        self.retrain(&all[..cutoff], game.date)?;
                        state.last_mark = Some(mark);
                    }
                    Some(_) => {}
                }
            }
        }

        let metrics = compute_metrics(&bets, &predictions, &outcomes);
        info!(
            evaluated = predictions.len(),
            bets = bets.len(),
            skipped_history,
            skipped_odds,
            final_bankroll = state.bankroll,
            roi_pct = metrics.roi_pct,
            "Walk-forward run complete"
        );

        Ok(BacktestResult {
            bets,
            metrics,
            train_seasons: train_seasons.to_vec(),
            test_seasons: test_seasons.to_vec(),
            final_bankroll: state.bankroll,
            predictions,
            outcomes,
        })
    }

    /// Refit on everything before `as_of`, bounded to the most recent
    /// `retrain_window_rows` feature rows.
    fn retrain(&mut self, prior: &[HistoricalGame], as_of: NaiveDate) -> Result<()> {
        let mut set = self
            .features
            .training_dataset(prior, self.config.min_games_required);
        set.truncate_to_recent(self.config.retrain_window_rows);
        if set.len() < MIN_FIT_ROWS {
            warn!(%as_of, rows = set.len(), "Too few rows at cadence boundary, keeping current model");
            return Ok(());
        }
        info!(%as_of, rows = set.len(), "Retraining at cadence boundary");
        self.model.fit(
            &set,
            self.config.boost_rounds,
            self.config.calibration_fraction,
        )
    }
}
