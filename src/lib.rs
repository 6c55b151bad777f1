//! Walk-forward backtesting for win-probability betting models.
//!
//! Given an archive of historical games and bookmaker odds snapshots, this
//! crate replays past seasons one game at a time: temporal features are
//! computed strictly from earlier games, a calibrated win-probability model
//! prices each game, positive-EV home bets are staked with fractional Kelly,
//! and the model is periodically refitted as simulated time advances. The
//! hard rule throughout is that nothing dated on or after a game's date can
//! influence the decision on that game.
//!
//! Entry points:
//! - [`store::Store`] loads the archival SQLite file; [`store::OddsIndex`]
//!   serves h2h quotes.
//! - [`backtest::WalkForwardEngine`] runs the simulation for any
//!   [`model::WinProbModel`]; [`model::BoostedLogit`] is the shipped learner.
//! - [`backtest::walk_forward_splits`] builds rolling-origin CV folds.
//! - [`metrics::build_report`] turns a run into a tuning report.

pub mod backtest;
pub mod config;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod store;

pub use backtest::{BacktestResult, BetRecord, WalkForwardEngine};
pub use config::{BacktestConfig, RetrainFrequency};
pub use error::{BacktestError, Result};
pub use metrics::{BacktestMetrics, BacktestReport};
pub use model::{BoostedLogit, WinProbModel};
pub use store::{HistoricalGame, HistoricalOdds, OddsIndex, Store};
