//! Walk-forward ("rolling origin") cross-validation splits.
//!
//! Folds slide forward one season at a time; every fold's test set strictly
//! follows its train set in calendar time. This estimates model quality
//! independently of the betting simulation.

use chrono::{Datelike, NaiveDate};

use crate::error::{BacktestError, Result};
use crate::store::HistoricalGame;

/// Season start year for a date: seasons tip off in October, so
/// October–December belong to the current calendar year and
/// January–September to the previous one.
pub fn season_start_year(date: NaiveDate) -> i32 {
    if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// One temporally ordered (train, test) partition. Indices point into the
/// game slice the split was derived from.
#[derive(Debug, Clone)]
pub struct WalkForwardFold {
    pub train_seasons: Vec<i32>,
    pub test_seasons: Vec<i32>,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Build rolling-origin folds over the seasons present in `games`.
///
/// Fails when fewer distinct seasons exist than
/// `train_seasons_count + test_seasons_count`.
pub fn walk_forward_splits(
    games: &[HistoricalGame],
    train_seasons_count: usize,
    test_seasons_count: usize,
) -> Result<Vec<WalkForwardFold>> {
    if train_seasons_count == 0 || test_seasons_count == 0 {
        return Err(BacktestError::InvalidConfig(
            "train and test season counts must both be at least 1".into(),
        ));
    }

    let mut seasons: Vec<i32> = games.iter().map(|g| g.season).collect();
    seasons.sort_unstable();
    seasons.dedup();

    let needed = train_seasons_count + test_seasons_count;
    if seasons.len() < needed {
        return Err(BacktestError::InsufficientSeasons {
            needed,
            got: seasons.len(),
        });
    }

    let mut folds = Vec::new();
    for start in 0..=(seasons.len() - needed) {
        let train_seasons = seasons[start..start + train_seasons_count].to_vec();
        let test_seasons =
            seasons[start + train_seasons_count..start + needed].to_vec();
        let train = games
            .iter()
            .enumerate()
            .filter(|(_, g)| train_seasons.contains(&g.season))
            .map(|(i, _)| i)
            .collect();
        let test = games
            .iter()
            .enumerate()
            .filter(|(_, g)| test_seasons.contains(&g.season))
            .map(|(i, _)| i)
            .collect();
        folds.push(WalkForwardFold {
            train_seasons,
            test_seasons,
            train,
            test,
        });
    }
    Ok(folds)
}
