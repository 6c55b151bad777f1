//! Temporal-cutoff feature computation.
//!
//! Every feature for a target game is derived exclusively from games dated
//! strictly before the target's date. That cutoff is the load-bearing
//! correctness property of the whole backtesting core: the walk-forward
//! engine trusts this module never to look forward.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::store::HistoricalGame;

/// Regulation season length used for the season-progress fraction.
const SEASON_GAMES: f64 = 82.0;

/// Pace default for a team with no recorded history (league-average-ish
/// possessions per game).
const DEFAULT_PACE: f64 = 100.0;

/// Named feature values for one (game, as-of-date) pair.
///
/// Backed by a `BTreeMap` so iteration order is deterministic; the
/// authoritative column order for any fitted model is the feature-name list
/// the model records at training time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Project into a dense row following `order`. Names absent from this
    /// vector contribute 0.0, so prediction never panics on a column
    /// mismatch — the model reorders inputs to its training-time layout.
    pub fn to_row(&self, order: &[String]) -> Vec<f64> {
        order
            .iter()
            .map(|name| self.values.get(name).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }
}

/// Chronologically ordered training rows with a fixed column layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureVector>,
    /// 1.0 = home win, 0.0 = home loss
    pub targets: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub seasons: Vec<i32>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the most recent `n` rows (rows are chronological).
    pub fn truncate_to_recent(&mut self, n: usize) {
        if self.rows.len() > n {
            let drop = self.rows.len() - n;
            self.rows.drain(..drop);
            self.targets.drain(..drop);
            self.dates.drain(..drop);
            self.seasons.drain(..drop);
        }
    }
}

/// Builds feature vectors from prior games under a strict date cutoff.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    lookback: usize,
}

impl FeatureBuilder {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
        }
    }

    /// Compute the feature vector for `target` from `games`.
    ///
    /// Games dated on or after `target.date` are ignored regardless of what
    /// the caller passes in. Missing history never errors; documented
    /// defaults are substituted instead (season-opener assumptions).
    pub fn compute(&self, games: &[HistoricalGame], target: &HistoricalGame) -> FeatureVector {
        let prior: Vec<&HistoricalGame> =
            games.iter().filter(|g| g.date < target.date).collect();

        let mut fv = FeatureVector::default();
        self.team_features(&prior, target, &target.home_team, true, &mut fv);
        self.team_features(&prior, target, &target.away_team, false, &mut fv);
        fv
    }

    fn team_features(
        &self,
        prior: &[&HistoricalGame],
        target: &HistoricalGame,
        team: &str,
        is_home_side: bool,
        fv: &mut FeatureVector,
    ) {
        let prefix = if is_home_side { "home" } else { "away" };
        let appearances: Vec<&&HistoricalGame> = prior
            .iter()
            .filter(|g| g.home_team == team || g.away_team == team)
            .collect();

        // Rolling form over the most recent `lookback` appearances.
        let recent = &appearances[appearances.len().saturating_sub(self.lookback)..];
        let (net_rating, pace, win_rate) = if recent.is_empty() {
            (0.0, DEFAULT_PACE, 0.5)
        } else {
            let n = recent.len() as f64;
            let mut diff_sum = 0.0;
            let mut total_sum = 0.0;
            let mut wins = 0.0;
            for g in recent {
                let (scored, conceded) = if g.home_team == team {
                    (g.home_score, g.away_score)
                } else {
                    (g.away_score, g.home_score)
                };
                diff_sum += (scored - conceded) as f64;
                total_sum += (scored + conceded) as f64;
                if scored > conceded {
                    wins += 1.0;
                }
            }
            (diff_sum / n, total_sum / n / 2.0, wins / n)
        };
        fv.insert(&format!("{prefix}_net_rating"), net_rating);
        fv.insert(&format!("{prefix}_pace"), pace);
        fv.insert(&format!("{prefix}_recent_win_rate"), win_rate);

        // Season-long split on the side the team plays tonight: home record
        // at home for the home side, away record on the road for the away
        // side. Prior games in the target season only.
        let split_rate = {
            let season_side: Vec<&&&HistoricalGame> = appearances
                .iter()
                .filter(|g| {
                    g.season == target.season
                        && if is_home_side {
                            g.home_team == team
                        } else {
                            g.away_team == team
                        }
                })
                .collect();
            if season_side.is_empty() {
                0.5
            } else {
                let wins = season_side
                    .iter()
                    .filter(|g| {
                        if is_home_side {
                            g.home_win()
                        } else {
                            !g.home_win()
                        }
                    })
                    .count();
                wins as f64 / season_side.len() as f64
            }
        };
        let split_name = if is_home_side {
            "home_season_home_win_rate"
        } else {
            "away_season_away_win_rate"
        };
        fv.insert(split_name, split_rate);

        // Situational schedule features.
        let rest_days = appearances
            .last()
            .map(|g| (target.date - g.date).num_days().clamp(0, 7) as f64)
            .unwrap_or(7.0);
        fv.insert(&format!("{prefix}_rest_days"), rest_days);
        fv.insert(
            &format!("{prefix}_back_to_back"),
            if appearances.last().is_some() && rest_days <= 1.0 {
                1.0
            } else {
                0.0
            },
        );

        let week_floor = target.date - chrono::Duration::days(7);
        let games_last_week = appearances
            .iter()
            .filter(|g| g.date >= week_floor)
            .count() as f64;
        fv.insert(&format!("{prefix}_games_last_7"), games_last_week);

        let season_games = appearances
            .iter()
            .filter(|g| g.season == target.season)
            .count() as f64;
        fv.insert(
            &format!("{prefix}_season_progress"),
            (season_games / SEASON_GAMES).min(1.0),
        );
    }

    /// Build the chronological (features, home-win) dataset.
    ///
    /// Games where either team has fewer than `min_games_required` prior
    /// appearances are skipped — sparse early-season rows add more noise
    /// than signal.
    pub fn training_dataset(
        &self,
        games: &[HistoricalGame],
        min_games_required: usize,
    ) -> TrainingSet {
        let mut ordered: Vec<HistoricalGame> = games.to_vec();
        ordered.sort_by(|a, b| (a.date, &a.game_id).cmp(&(b.date, &b.game_id)));

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut set = TrainingSet::default();
        for i in 0..ordered.len() {
            let game = &ordered[i];
            let home_seen = *seen.get(&game.home_team).unwrap_or(&0);
            let away_seen = *seen.get(&game.away_team).unwrap_or(&0);
            if home_seen >= min_games_required && away_seen >= min_games_required {
                // Earlier positions in `ordered` are exactly the games dated
                // before this one (same-date ties are filtered out again by
                // compute's strict cutoff).
                let fv = self.compute(&ordered[..i], game);
                if set.feature_names.is_empty() {
                    set.feature_names = fv.names();
                }
                set.rows.push(fv);
                set.targets.push(if game.home_win() { 1.0 } else { 0.0 });
                set.dates.push(game.date);
                set.seasons.push(game.season);
            }
            *seen.entry(game.home_team.clone()).or_insert(0) += 1;
            *seen.entry(game.away_team.clone()).or_insert(0) += 1;
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn game(id: &str, date: (i32, u32, u32), home: &str, away: &str, hs: i32, aws: i32) -> HistoricalGame {
        HistoricalGame {
            game_id: id.into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            season: 2023,
            home_team: home.into(),
            away_team: away.into(),
            home_score: hs,
            away_score: aws,
        }
    }

    fn sample_history() -> Vec<HistoricalGame> {
        vec![
            game("g1", (2024, 1, 2), "BOS", "NYK", 110, 100),
            game("g2", (2024, 1, 4), "NYK", "BOS", 95, 105),
            game("g3", (2024, 1, 6), "BOS", "PHI", 100, 108),
            game("g4", (2024, 1, 8), "PHI", "NYK", 112, 110),
        ]
    }

    #[test]
    fn no_history_uses_documented_defaults() {
        let builder = FeatureBuilder::new(10);
        let target = game("t", (2024, 1, 1), "BOS", "NYK", 0, 0);
        let fv = builder.compute(&sample_history(), &target);

        assert_relative_eq!(fv.get("home_net_rating").unwrap(), 0.0);
        assert_relative_eq!(fv.get("home_pace").unwrap(), 100.0);
        assert_relative_eq!(fv.get("home_recent_win_rate").unwrap(), 0.5);
        assert_relative_eq!(fv.get("home_rest_days").unwrap(), 7.0);
        assert_relative_eq!(fv.get("home_back_to_back").unwrap(), 0.0);
        assert_relative_eq!(fv.get("away_season_away_win_rate").unwrap(), 0.5);
    }

    #[test]
    fn rolling_aggregates_only_use_prior_games() {
        let builder = FeatureBuilder::new(10);
        // Target sits between g2 and g3: only g1/g2 are visible.
        let target = game("t", (2024, 1, 5), "BOS", "NYK", 0, 0);
        let fv = builder.compute(&sample_history(), &target);

        // BOS: +10 and +10 margins over two games.
        assert_relative_eq!(fv.get("home_net_rating").unwrap(), 10.0);
        assert_relative_eq!(fv.get("home_recent_win_rate").unwrap(), 1.0);
        // Pace: ((210 + 200) / 2) / 2 = 102.5
        assert_relative_eq!(fv.get("home_pace").unwrap(), 102.5);
        // NYK lost both.
        assert_relative_eq!(fv.get("away_recent_win_rate").unwrap(), 0.0);
        assert_relative_eq!(fv.get("away_net_rating").unwrap(), -10.0);
    }

    #[test]
    fn lookback_window_limits_the_form_sample() {
        let builder = FeatureBuilder::new(1);
        let target = game("t", (2024, 1, 7), "BOS", "NYK", 0, 0);
        let fv = builder.compute(&sample_history(), &target);
        // Only g3 (BOS -8 loss) is in the 1-game window.
        assert_relative_eq!(fv.get("home_net_rating").unwrap(), -8.0);
        assert_relative_eq!(fv.get("home_recent_win_rate").unwrap(), 0.0);
    }

    #[test]
    fn rest_and_schedule_density() {
        let builder = FeatureBuilder::new(10);
        let target = game("t", (2024, 1, 7), "BOS", "NYK", 0, 0);
        let fv = builder.compute(&sample_history(), &target);
        // BOS last played Jan 6 -> 1 rest day -> back-to-back.
        assert_relative_eq!(fv.get("home_rest_days").unwrap(), 1.0);
        assert_relative_eq!(fv.get("home_back_to_back").unwrap(), 1.0);
        // NYK last played Jan 4 -> 3 days.
        assert_relative_eq!(fv.get("away_rest_days").unwrap(), 3.0);
        assert_relative_eq!(fv.get("away_back_to_back").unwrap(), 0.0);
        // BOS played Jan 2/4/6, NYK only Jan 2/4, all inside the window.
        assert_relative_eq!(fv.get("home_games_last_7").unwrap(), 3.0);
        assert_relative_eq!(fv.get("away_games_last_7").unwrap(), 2.0);
    }

    #[test]
    fn season_progress_counts_prior_season_games() {
        let builder = FeatureBuilder::new(10);
        let target = game("t", (2024, 1, 9), "BOS", "NYK", 0, 0);
        let fv = builder.compute(&sample_history(), &target);
        assert_relative_eq!(fv.get("home_season_progress").unwrap(), 3.0 / 82.0);
    }

    #[test]
    fn moving_a_game_past_the_cutoff_removes_its_influence() {
        // The no-leakage property: shift one input game's date to the target
        // date and the recomputed features must no longer reflect it.
        let builder = FeatureBuilder::new(10);
        let target = game("t", (2024, 1, 7), "BOS", "NYK", 0, 0);
        let mut history = sample_history();
        let before = builder.compute(&history, &target);

        history[2].date = target.date; // g3 jumps onto the target date
        let after = builder.compute(&history, &target);

        assert_ne!(before, after);
        // Without g3, BOS is 2-0 with +10 net rating again.
        assert_relative_eq!(after.get("home_recent_win_rate").unwrap(), 1.0);
        assert_relative_eq!(after.get("home_net_rating").unwrap(), 10.0);
    }

    #[test]
    fn training_dataset_applies_sparsity_guard_and_ordering() {
        let builder = FeatureBuilder::new(10);
        let set = builder.training_dataset(&sample_history(), 1);
        // g1 is skipped (nobody has history); g2 qualifies (both teams have
        // 1 appearance); g3 needs PHI history and is skipped; g4 qualifies.
        assert_eq!(set.len(), 2);
        assert_eq!(set.dates[0], NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(set.dates[1], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert!(set.dates.windows(2).all(|w| w[0] <= w[1]));
        // g2: NYK hosted and lost 95-105.
        assert_relative_eq!(set.targets[0], 0.0);
        // g4: PHI hosted and won 112-110.
        assert_relative_eq!(set.targets[1], 1.0);
    }

    #[test]
    fn truncate_to_recent_keeps_the_tail() {
        let builder = FeatureBuilder::new(10);
        let mut set = builder.training_dataset(&sample_history(), 0);
        assert_eq!(set.len(), 4);
        set.truncate_to_recent(2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.dates[0], NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
    }

    #[test]
    fn row_projection_follows_recorded_order() {
        let mut fv = FeatureVector::default();
        fv.insert("b", 2.0);
        fv.insert("a", 1.0);
        let order = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        assert_eq!(fv.to_row(&order), vec![1.0, 0.0, 2.0]);
    }
}
