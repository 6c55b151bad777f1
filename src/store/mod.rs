use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

pub mod models;
pub use models::{HistoricalGame, HistoricalOdds};

use crate::backtest::splitter::season_start_year;

/// Read-only adapter over the archival SQLite file produced by the ingestion
/// side. The backtesting core never writes here.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Store { conn })
    }

    /// Load all games ordered by date. Rows with a NULL season get one
    /// inferred from the game date.
    pub fn load_games(&self) -> Result<Vec<HistoricalGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, date, season, home_team, away_team, home_score, away_score
             FROM games ORDER BY date, game_id",
        )?;
        let games = stmt
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        info!("Loaded {} games from archival store", games.len());
        Ok(games)
    }

    /// Load every odds snapshot, oldest first per game/outcome.
    pub fn load_odds(&self) -> Result<Vec<HistoricalOdds>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, date, bookmaker, market, outcome, price, point, timestamp
             FROM odds ORDER BY game_id, outcome, timestamp",
        )?;
        let odds = stmt
            .query_map([], map_odds)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        info!("Loaded {} odds snapshots from archival store", odds.len());
        Ok(odds)
    }
}

fn map_game(row: &Row) -> rusqlite::Result<HistoricalGame> {
    let date = row.get(1)?;
    let season: Option<i32> = row.get(2)?;
    Ok(HistoricalGame {
        game_id: row.get(0)?,
        date,
        season: season.unwrap_or_else(|| season_start_year(date)),
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        home_score: row.get(5)?,
        away_score: row.get(6)?,
    })
}

fn map_odds(row: &Row) -> rusqlite::Result<HistoricalOdds> {
    Ok(HistoricalOdds {
        game_id: row.get(0)?,
        date: row.get(1)?,
        bookmaker: row.get(2)?,
        market: row.get(3)?,
        outcome: row.get(4)?,
        price: row.get(5)?,
        point: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

/// The price the simulation bets at plus, when the archive has one, the
/// closing price for the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub outcome: String,
    pub bet_odds: f64,
    /// Latest snapshot strictly after the bet-time one; None when the
    /// archive only carries a single price for the outcome.
    pub closing_odds: Option<f64>,
}

/// Pre-indexed h2h snapshots with O(1) per-game lookups.
///
/// Bet-time odds are the earliest snapshot (the opening line — the price a
/// bettor acting ahead of the market would have obtained); closing odds are
/// the latest snapshot for the same outcome.
pub struct OddsIndex {
    // game_id -> outcome -> (timestamp, price) sorted ascending by timestamp
    h2h: HashMap<String, HashMap<String, Vec<(DateTime<Utc>, f64)>>>,
}

impl OddsIndex {
    pub fn build(odds: &[HistoricalOdds]) -> Self {
        let mut h2h: HashMap<String, HashMap<String, Vec<(DateTime<Utc>, f64)>>> = HashMap::new();
        for snap in odds.iter().filter(|o| o.is_h2h() && o.price > 1.0) {
            h2h.entry(snap.game_id.clone())
                .or_default()
                .entry(snap.outcome.clone())
                .or_default()
                .push((snap.timestamp, snap.price));
        }
        for outcomes in h2h.values_mut() {
            for snaps in outcomes.values_mut() {
                snaps.sort_by_key(|(ts, _)| *ts);
            }
        }
        OddsIndex { h2h }
    }

    /// h2h quote for the preferred outcome, falling back to any h2h outcome
    /// recorded for the game. None when the game has no h2h prices at all.
    pub fn h2h_quote(&self, game_id: &str, preferred_outcome: &str) -> Option<Quote> {
        let outcomes = self.h2h.get(game_id)?;
        let (outcome, snaps) = match outcomes.get_key_value(preferred_outcome) {
            Some(kv) => kv,
            // Fallback: earliest-opening outcome among whatever the game has.
            None => outcomes
                .iter()
                .min_by_key(|(_, snaps)| snaps.first().map(|(ts, _)| *ts))?,
        };
        let (open_ts, bet_odds) = *snaps.first()?;
        let closing_odds = snaps
            .last()
            .filter(|(ts, _)| *ts > open_ts)
            .map(|(_, price)| *price);
        Some(Quote {
            outcome: outcome.clone(),
            bet_odds,
            closing_odds,
        })
    }

    pub fn games_with_odds(&self) -> usize {
        self.h2h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h2h.is_empty()
    }
}
