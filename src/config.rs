use clap::{Parser, ValueEnum};

/// How often the model is refit during a walk-forward run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrainFrequency {
    /// Refit when the test loop crosses into a new calendar month.
    Monthly,
    /// Refit when the test loop crosses into a new ISO week.
    Weekly,
    /// Keep the initial fit for the entire test period.
    Never,
}

/// Walk-forward backtest configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "closingline", version, about)]
pub struct BacktestConfig {
    /// Minimum expected value (p × odds − 1) required to place a bet
    #[arg(long, env = "MIN_EV_THRESHOLD", default_value = "0.05")]
    pub min_ev_threshold: f64,

    /// Starting bankroll (units of currency)
    #[arg(long, env = "BANKROLL", default_value = "10000.0")]
    pub bankroll: f64,

    /// Fractional Kelly multiplier (0.0–1.0)
    #[arg(long, env = "KELLY_FRACTION", default_value = "0.25")]
    pub kelly_fraction: f64,

    /// Hard cap on a single stake as a fraction of current bankroll
    #[arg(long, env = "MAX_STAKE_FRACTION", default_value = "0.05")]
    pub max_stake_fraction: f64,

    /// Retrain cadence during the test period
    #[arg(long, env = "RETRAIN_FREQUENCY", value_enum, default_value = "monthly")]
    pub retrain_frequency: RetrainFrequency,

    /// Rolling-window size for per-team form features
    #[arg(long, env = "LOOKBACK_GAMES", default_value = "10")]
    pub lookback_games: usize,

    /// Minimum prior appearances per team before a game enters training data
    #[arg(long, env = "MIN_GAMES_REQUIRED", default_value = "5")]
    pub min_games_required: usize,

    /// Most-recent-rows bound applied to each retrain's training set
    #[arg(long, env = "RETRAIN_WINDOW_ROWS", default_value = "3000")]
    pub retrain_window_rows: usize,

    /// Training rounds for the base learner
    #[arg(long, env = "BOOST_ROUNDS", default_value = "200")]
    pub boost_rounds: usize,

    /// Fraction of the most recent training rows held out for calibration
    #[arg(long, env = "CALIBRATION_FRACTION", default_value = "0.2")]
    pub calibration_fraction: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_ev_threshold: 0.05,
            bankroll: 10_000.0,
            kelly_fraction: 0.25,
            max_stake_fraction: 0.05,
            retrain_frequency: RetrainFrequency::Monthly,
            lookback_games: 10,
            min_games_required: 5,
            retrain_window_rows: 3000,
            boost_rounds: 200,
            calibration_fraction: 0.2,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bankroll <= 0.0 {
            anyhow::bail!("bankroll must be positive");
        }
        if !(0.0..=1.0).contains(&self.kelly_fraction) || self.kelly_fraction == 0.0 {
            anyhow::bail!("kelly_fraction must be in (0.0, 1.0]");
        }
        if !(0.0..=1.0).contains(&self.max_stake_fraction) || self.max_stake_fraction == 0.0 {
            anyhow::bail!("max_stake_fraction must be in (0.0, 1.0]");
        }
        if self.min_ev_threshold < -1.0 {
            anyhow::bail!("min_ev_threshold below -1.0 can never be met");
        }
        if self.lookback_games == 0 {
            anyhow::bail!("lookback_games must be at least 1");
        }
        if !(0.0..=0.5).contains(&self.calibration_fraction) {
            anyhow::bail!("calibration_fraction must be in [0.0, 0.5]");
        }
        if self.retrain_window_rows == 0 {
            anyhow::bail!("retrain_window_rows must be at least 1");
        }
        Ok(())
    }
}
