use crate::data_fetcher::coordinator::GameLogSource;
use crate::data_fetcher::models::{GameLogRow, GameType, PlayerCategory, RosterRow, Season};
use crate::error::AppError;
use crate::table::Value;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Test utilities for creating mock data and testing scenarios

/// Builds a skater game-log row with a handful of stats.
///
/// Panics if `date` is not `YYYY-MM-DD`.
pub fn game_log_row(player_id: i64, game_id: i64, date: &str) -> GameLogRow {
    let mut stats = BTreeMap::new();
    stats.insert("goals".to_string(), Value::Int(1));
    stats.insert("assists".to_string(), Value::Int(2));
    stats.insert("points".to_string(), Value::Int(3));
    stats.insert("plus_minus".to_string(), Value::Int(-1));
    stats.insert("shots".to_string(), Value::Int(4));

    GameLogRow {
        player_id,
        season_id: 20242025,
        game_type_id: 2,
        game_id,
        game_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid test date"),
        team_abbrev: Some("TOR".to_string()),
        opponent_abbrev: Some("MTL".to_string()),
        home_road_flag: Some("H".to_string()),
        toi_seconds: Some(1234),
        stats,
    }
}

/// Builds a roster row for `player_id`.
pub fn roster_row(player_id: i64, first: &str, last: &str, category: PlayerCategory) -> RosterRow {
    let position_code = match category {
        PlayerCategory::Goalies => "G",
        PlayerCategory::Skaters => "C",
    };
    RosterRow {
        player_id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        sweater_number: Some(34),
        position_code: position_code.to_string(),
        category,
        shoots_catches: Some("L".to_string()),
        height_in_centimeters: Some(191),
        weight_in_kilograms: Some(98),
        birth_date: Some("1997-09-17".to_string()),
        birth_country: Some("USA".to_string()),
        current_team_abbrev: "TOR".to_string(),
    }
}

/// A [`GameLogSource`] with canned answers, for exercising the coordinator
/// without a network.
///
/// Every player gets `rows_per_player` rows unless listed with
/// [`failing_for`](Self::failing_for). Tracks the highest number of calls in
/// flight at once.
#[derive(Debug, Default)]
pub struct ScriptedGameLogSource {
    rows_per_player: usize,
    failing: HashSet<i64>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedGameLogSource {
    pub fn new(rows_per_player: usize) -> Self {
        ScriptedGameLogSource {
            rows_per_player,
            ..Default::default()
        }
    }

    pub fn failing_for(mut self, player_id: i64) -> Self {
        self.failing.insert(player_id);
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GameLogSource for ScriptedGameLogSource {
    async fn game_log(
        &self,
        player_id: i64,
        season: Season,
        game_type: GameType,
    ) -> Result<Vec<GameLogRow>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&player_id) {
            return Err(AppError::api_server_error(
                500,
                "scripted failure",
                format!("scripted://player/{player_id}"),
            ));
        }

        Ok((0..self.rows_per_player)
            .map(|i| {
                let day = 1 + (i % 28) as u32;
                let mut row = game_log_row(
                    player_id,
                    2024020000 + i as i64,
                    &format!("2024-11-{day:02}"),
                );
                row.season_id = season.id();
                row.game_type_id = game_type.id();
                row
            })
            .collect())
    }
}
