use super::common::{GameType, Season, to_snake_case};
use crate::data_fetcher::processors::parse_duration_seconds;
use crate::error::AppError;
use crate::table::Value;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of `/player/{id}/game-log/{season}/{game_type}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GameLogResponse {
    #[serde(rename = "seasonId", default)]
    pub season_id: Option<u32>,
    #[serde(rename = "gameTypeId", default)]
    pub game_type_id: Option<u8>,
    #[serde(rename = "gameLog", default)]
    pub game_log: Vec<GameLogEntry>,
}

/// One game of a player's log. Fields that differ between skaters and goalies
/// are captured in `stats`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameLogEntry {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "gameDate")]
    pub game_date: String,
    #[serde(rename = "teamAbbrev", default)]
    pub team_abbrev: Option<String>,
    #[serde(rename = "opponentAbbrev", default)]
    pub opponent_abbrev: Option<String>,
    #[serde(rename = "homeRoadFlag", default)]
    pub home_road_flag: Option<String>,
    #[serde(default)]
    pub toi: Option<String>,
    #[serde(flatten)]
    pub stats: BTreeMap<String, serde_json::Value>,
}

/// Per-game statistics for one player, with time on ice already in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct GameLogRow {
    pub player_id: i64,
    pub season_id: u32,
    pub game_type_id: u8,
    pub game_id: i64,
    pub game_date: NaiveDate,
    pub team_abbrev: Option<String>,
    pub opponent_abbrev: Option<String>,
    pub home_road_flag: Option<String>,
    pub toi_seconds: Option<i64>,
    /// Remaining counting stats keyed by snake_case column name
    pub stats: BTreeMap<String, Value>,
}

impl GameLogRow {
    pub fn from_entry(
        player_id: i64,
        season: Season,
        game_type: GameType,
        entry: GameLogEntry,
    ) -> Result<Self, AppError> {
        let game_date = NaiveDate::parse_from_str(&entry.game_date, "%Y-%m-%d").map_err(|e| {
            AppError::datetime_parse_error(format!(
                "game {} has invalid gameDate '{}': {e}",
                entry.game_id, entry.game_date
            ))
        })?;

        let toi_seconds = match entry.toi.as_deref() {
            Some(toi) if !toi.trim().is_empty() => Some(parse_duration_seconds(toi)?),
            _ => None,
        };

        let stats = entry
            .stats
            .iter()
            .filter_map(|(key, value)| Value::from_json(value).map(|v| (to_snake_case(key), v)))
            .collect();

        Ok(GameLogRow {
            player_id,
            season_id: season.id(),
            game_type_id: game_type.id(),
            game_id: entry.game_id,
            game_date,
            team_abbrev: entry.team_abbrev,
            opponent_abbrev: entry.opponent_abbrev,
            home_road_flag: entry.home_road_flag,
            toi_seconds,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season() -> Season {
        Season::new(20242025).unwrap()
    }

    const SKATER_LOG: &str = r#"{
        "seasonId": 20242025,
        "gameTypeId": 2,
        "gameLog": [{
            "gameId": 2024020001,
            "teamAbbrev": "TOR",
            "homeRoadFlag": "H",
            "gameDate": "2024-10-09",
            "goals": 1,
            "assists": 1,
            "commonName": {"default": "Maple Leafs"},
            "opponentCommonName": {"default": "Canadiens", "fr": "Canadiens"},
            "points": 2,
            "plusMinus": -1,
            "powerPlayGoals": 0,
            "shots": 3,
            "shifts": 22,
            "opponentAbbrev": "MTL",
            "pim": 0,
            "toi": "19:34"
        }]
    }"#;

    #[test]
    fn test_entry_converts_toi_and_drops_text_field() {
        let response: GameLogResponse = serde_json::from_str(SKATER_LOG).unwrap();
        let entry = response.game_log.into_iter().next().unwrap();
        let row =
            GameLogRow::from_entry(8478483, season(), GameType::RegularSeason, entry).unwrap();

        assert_eq!(row.toi_seconds, Some(19 * 60 + 34));
        assert!(!row.stats.contains_key("toi"));
        assert_eq!(row.stats.get("power_play_goals"), Some(&Value::Int(0)));
        assert_eq!(row.stats.get("plus_minus"), Some(&Value::Int(-1)));
        assert_eq!(
            row.stats.get("opponent_common_name"),
            Some(&Value::Text("Canadiens".to_string()))
        );
        assert_eq!(row.game_date, NaiveDate::from_ymd_opt(2024, 10, 9).unwrap());
        assert_eq!(row.season_id, 20242025);
        assert_eq!(row.opponent_abbrev.as_deref(), Some("MTL"));
    }

    #[test]
    fn test_malformed_toi_is_an_error() {
        let mut response: GameLogResponse = serde_json::from_str(SKATER_LOG).unwrap();
        response.game_log[0].toi = Some("19:3a".to_string());
        let entry = response.game_log.into_iter().next().unwrap();
        let result = GameLogRow::from_entry(1, season(), GameType::RegularSeason, entry);
        assert!(matches!(result, Err(AppError::DurationParse { .. })));
    }

    #[test]
    fn test_missing_toi_is_null() {
        let mut response: GameLogResponse = serde_json::from_str(SKATER_LOG).unwrap();
        response.game_log[0].toi = None;
        let entry = response.game_log.into_iter().next().unwrap();
        let row = GameLogRow::from_entry(1, season(), GameType::RegularSeason, entry).unwrap();
        assert_eq!(row.toi_seconds, None);
    }

    #[test]
    fn test_goalie_entry_keeps_goalie_stats() {
        let json = r#"{"gameLog": [{
            "gameId": 2024020005,
            "gameDate": "2024-10-12",
            "teamAbbrev": "TOR",
            "gamesStarted": 1,
            "decision": "W",
            "shotsAgainst": 31,
            "goalsAgainst": 2,
            "savePctg": 0.935484,
            "shutouts": 0,
            "toi": "60:00"
        }]}"#;
        let response: GameLogResponse = serde_json::from_str(json).unwrap();
        let entry = response.game_log.into_iter().next().unwrap();
        let row = GameLogRow::from_entry(8479361, season(), GameType::RegularSeason, entry).unwrap();

        assert_eq!(row.toi_seconds, Some(3600));
        assert_eq!(row.stats.get("decision"), Some(&Value::Text("W".to_string())));
        assert_eq!(row.stats.get("save_pctg"), Some(&Value::Float(0.935484)));
        assert_eq!(row.stats.get("shots_against"), Some(&Value::Int(31)));
    }

    #[test]
    fn test_missing_game_log_is_empty() {
        let response: GameLogResponse = serde_json::from_str(r#"{"seasonId": 20242025}"#).unwrap();
        assert!(response.game_log.is_empty());
    }
}
