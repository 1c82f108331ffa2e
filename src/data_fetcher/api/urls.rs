//! URL building utilities for the stats API endpoints

use crate::data_fetcher::models::{GameType, Season};

/// Builds the current-roster URL of one team.
///
/// # Example
/// ```
/// use nhl_etl::data_fetcher::api::build_roster_url;
///
/// let url = build_roster_url("https://api-web.nhle.com/v1", "TOR");
/// assert_eq!(url, "https://api-web.nhle.com/v1/roster/TOR/current");
/// ```
pub fn build_roster_url(api_base_url: &str, team_abbrev: &str) -> String {
    format!(
        "{}/roster/{}/current",
        api_base_url.trim_end_matches('/'),
        team_abbrev
    )
}

/// Builds the game-log URL of one player for a season and game type.
///
/// # Example
/// ```
/// use nhl_etl::data_fetcher::api::build_game_log_url;
/// use nhl_etl::data_fetcher::models::{GameType, Season};
///
/// let season = Season::new(20242025).unwrap();
/// let url = build_game_log_url("https://api-web.nhle.com/v1", 8478402, season, GameType::RegularSeason);
/// assert_eq!(url, "https://api-web.nhle.com/v1/player/8478402/game-log/20242025/2");
/// ```
pub fn build_game_log_url(
    api_base_url: &str,
    player_id: i64,
    season: Season,
    game_type: GameType,
) -> String {
    format!(
        "{}/player/{}/game-log/{}/{}",
        api_base_url.trim_end_matches('/'),
        player_id,
        season,
        game_type
    )
}
