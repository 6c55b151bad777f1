use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A completed game from the archival store. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalGame {
    /// Stable external game ID
    pub game_id: String,
    /// Tip-off date (no intraday resolution in the archive)
    pub date: NaiveDate,
    /// Season start year (e.g. 2023 for the 2023–24 season)
    pub season: i32,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
}

impl HistoricalGame {
    pub fn home_win(&self) -> bool {
        self.home_score > self.away_score
    }

    /// Final margin from the home side's perspective
    pub fn spread(&self) -> f64 {
        (self.home_score - self.away_score) as f64
    }

    pub fn total(&self) -> f64 {
        (self.home_score + self.away_score) as f64
    }
}

/// One bookmaker price snapshot. A game/outcome pair typically carries many
/// of these between the opening line and the close.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalOdds {
    pub game_id: String,
    /// Game date (matches the game record, not the snapshot time)
    pub date: NaiveDate,
    pub bookmaker: String,
    /// "h2h" | "spreads" | "totals"
    pub market: String,
    /// Team name for h2h, "Over"/"Under" for totals
    pub outcome: String,
    /// Decimal price (payout per unit staked)
    pub price: f64,
    /// Line for spreads/totals; None for h2h
    pub point: Option<f64>,
    /// When the bookmaker published this price
    pub timestamp: DateTime<Utc>,
}

impl HistoricalOdds {
    /// Implied probability of the outcome at this price (1 / price).
    pub fn implied_prob(&self) -> f64 {
        if self.price > 0.0 {
            1.0 / self.price
        } else {
            0.0
        }
    }

    pub fn is_h2h(&self) -> bool {
        self.market == "h2h"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn game(home_score: i32, away_score: i32) -> HistoricalGame {
        HistoricalGame {
            game_id: "g1".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            season: 2023,
            home_team: "BOS".into(),
            away_team: "NYK".into(),
            home_score,
            away_score,
        }
    }

    #[test]
    fn derived_fields() {
        let g = game(112, 104);
        assert!(g.home_win());
        assert_relative_eq!(g.spread(), 8.0);
        assert_relative_eq!(g.total(), 216.0);

        let g = game(99, 101);
        assert!(!g.home_win());
        assert_relative_eq!(g.spread(), -2.0);
    }

    #[test]
    fn implied_probability() {
        let odds = HistoricalOdds {
            game_id: "g1".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            bookmaker: "pinnacle".into(),
            market: "h2h".into(),
            outcome: "BOS".into(),
            price: 2.0,
            point: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        };
        assert_relative_eq!(odds.implied_prob(), 0.5, epsilon = 1e-12);
        assert!(odds.is_h2h());
    }
}
