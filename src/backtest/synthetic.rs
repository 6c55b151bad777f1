//! Synthetic league generator.
//!
//! Deterministic, seeded seasons with strength-driven scores and vig-bearing
//! opening/closing odds. Integration tests and smoke runs use this instead
//! of shipping archival fixtures.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::calibration::sigmoid;
use crate::store::{HistoricalGame, HistoricalOdds};

/// Home advantage in expected margin (points).
const HOME_ADVANTAGE: f64 = 2.5;

/// Bookmaker overround applied to the fair prices.
const VIG: f64 = 0.045;

#[derive(Debug, Clone, Default)]
pub struct SyntheticLeague {
    pub games: Vec<HistoricalGame>,
    pub odds: Vec<HistoricalOdds>,
}

/// Approximate standard normal draw (Irwin–Hall with 12 uniforms).
fn gauss(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

fn season_start(season: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(season, 10, 20).expect("valid season start")
}

/// Generate `n_seasons` of double round-robin play between `n_teams` teams
/// with persistent strength ratings, plus opening and closing h2h snapshots
/// for every game. Same seed, same league.
pub fn generate_league(n_teams: usize, n_seasons: usize, first_season: i32, seed: u64) -> SyntheticLeague {
    let n_teams = n_teams.max(2);
    let mut rng = StdRng::seed_from_u64(seed);

    let teams: Vec<String> = (0..n_teams).map(|i| format!("T{:02}", i + 1)).collect();
    let strengths: Vec<f64> = (0..n_teams).map(|_| (rng.gen::<f64>() - 0.5) * 8.0).collect();

    let mut league = SyntheticLeague::default();
    let games_per_day = (n_teams / 2).max(1) as i64;
    let mut game_no = 0usize;

    for s in 0..n_seasons {
        let season = first_season + s as i32;
        let start = season_start(season);

        let mut pairings = Vec::new();
        for home in 0..n_teams {
            for away in 0..n_teams {
                if home != away {
                    pairings.push((home, away));
                }
            }
        }
        // Light shuffle so the calendar is not sorted by team index.
        for i in (1..pairings.len()).rev() {
            let j = rng.gen_range(0..=i);
            pairings.swap(i, j);
        }

        for (k, (home, away)) in pairings.into_iter().enumerate() {
            let date = start + Duration::days(k as i64 / games_per_day);
            let margin_mean = HOME_ADVANTAGE + (strengths[home] - strengths[away]) * 1.2;
            let margin = margin_mean + gauss(&mut rng) * 12.0;
            let total = 220.0 + gauss(&mut rng) * 15.0;
            let mut home_score = ((total + margin) / 2.0).round() as i32;
            let away_score = (total - (total + margin) / 2.0).round() as i32;
            if home_score == away_score {
                // No draws in this league; nudge along the expected margin.
                home_score += if margin_mean >= 0.0 { 1 } else { -1 };
            }

            game_no += 1;
            let game_id = format!("syn-{game_no:05}");
            league.games.push(HistoricalGame {
                game_id: game_id.clone(),
                date,
                season,
                home_team: teams[home].clone(),
                away_team: teams[away].clone(),
                home_score,
                away_score,
            });

            // Fair probability from the margin model; the opening line is a
            // noisy version, the close converges on fair.
            let p_home = sigmoid(margin_mean / 7.5).clamp(0.03, 0.97);
            let p_open = (p_home + (rng.gen::<f64>() - 0.5) * 0.06).clamp(0.03, 0.97);
            let open_ts = Utc
                .from_utc_datetime(&(date - Duration::days(1)).and_hms_opt(12, 0, 0).unwrap());
            let close_ts = Utc.from_utc_datetime(&date.and_hms_opt(16, 0, 0).unwrap());

            for (outcome, open_p, close_p) in [
                (&teams[home], p_open, p_home),
                (&teams[away], 1.0 - p_open, 1.0 - p_home),
            ] {
                for (ts, p) in [(open_ts, open_p), (close_ts, close_p)] {
                    league.odds.push(HistoricalOdds {
                        game_id: game_id.clone(),
                        date,
                        bookmaker: "synthetic".into(),
                        market: "h2h".into(),
                        outcome: outcome.clone(),
                        price: 1.0 / (p * (1.0 + VIG)),
                        point: None,
                        timestamp: ts,
                    });
                }
            }
        }
    }
    league
}

/// Generate seasons where every home side wins with probability
/// `home_win_prob` and every h2h price is pinned at `decimal_odds`
/// (single snapshot, no closing line). Used by the fixed-edge scenarios.
pub fn generate_fixed_odds_league(
    n_seasons: usize,
    games_per_season: usize,
    first_season: i32,
    home_win_prob: f64,
    decimal_odds: f64,
    seed: u64,
) -> SyntheticLeague {
    let mut rng = StdRng::seed_from_u64(seed);
    let teams: Vec<String> = (0..8).map(|i| format!("T{:02}", i + 1)).collect();
    let away_odds = 1.0 / (1.0 - 1.0 / decimal_odds).max(1e-9);

    let mut league = SyntheticLeague::default();
    let mut game_no = 0usize;
    for s in 0..n_seasons {
        let season = first_season + s as i32;
        let start = season_start(season);
        for k in 0..games_per_season {
            let home = k % teams.len();
            let away = (k + 1 + k / teams.len()) % teams.len();
            let away = if away == home { (away + 1) % teams.len() } else { away };
            let date = start + Duration::days((k as i64 * 170) / games_per_season.max(1) as i64);

            let home_wins = rng.gen::<f64>() < home_win_prob;
            game_no += 1;
            let game_id = format!("fix-{game_no:05}");
            league.games.push(HistoricalGame {
                game_id: game_id.clone(),
                date,
                season,
                home_team: teams[home].clone(),
                away_team: teams[away].clone(),
                home_score: if home_wins { 104 } else { 98 },
                away_score: if home_wins { 98 } else { 104 },
            });

            let ts = Utc.from_utc_datetime(&(date - Duration::days(1)).and_hms_opt(12, 0, 0).unwrap());
            for (outcome, price) in [(&teams[home], decimal_odds), (&teams[away], away_odds)] {
                league.odds.push(HistoricalOdds {
                    game_id: game_id.clone(),
                    date,
                    bookmaker: "synthetic".into(),
                    market: "h2h".into(),
                    outcome: outcome.clone(),
                    price,
                    point: None,
                    timestamp: ts,
                });
            }
        }
    }
    league
}
