use crate::data_fetcher::coordinator::GameLogSource;
use crate::data_fetcher::models::{
    GameLogResponse, GameLogRow, GameType, RosterResponse, RosterRow, Season,
};
use crate::error::AppError;
use reqwest::Client;
use tracing::{debug, instrument};

use super::fetch_utils::fetch;
use super::urls::{build_game_log_url, build_roster_url};

/// Client for the two stats API endpoints the pipeline reads.
#[derive(Debug, Clone)]
pub struct NhlClient {
    client: Client,
    api_base_url: String,
}

impl NhlClient {
    pub fn new(client: Client, api_base_url: impl Into<String>) -> Self {
        NhlClient {
            client,
            api_base_url: api_base_url.into(),
        }
    }

    /// Fetches the current roster of one team, one row per player.
    #[instrument(skip(self))]
    pub async fn fetch_roster(&self, team_abbrev: &str) -> Result<Vec<RosterRow>, AppError> {
        let url = build_roster_url(&self.api_base_url, team_abbrev);
        let response: RosterResponse = fetch(&self.client, &url).await?;
        let rows: Vec<RosterRow> = response
            .players()
            .map(|p| RosterRow::from_player(p, team_abbrev))
            .collect();
        debug!("Roster for {team_abbrev} has {} players", rows.len());
        Ok(rows)
    }

    /// Fetches one player's game log and converts every entry.
    ///
    /// A malformed entry (for example an unparseable time on ice) fails the
    /// whole player rather than silently producing a partial log.
    #[instrument(skip(self))]
    pub async fn fetch_game_log(
        &self,
        player_id: i64,
        season: Season,
        game_type: GameType,
    ) -> Result<Vec<GameLogRow>, AppError> {
        let url = build_game_log_url(&self.api_base_url, player_id, season, game_type);
        let response: GameLogResponse = fetch(&self.client, &url).await?;
        let rows = response
            .game_log
            .into_iter()
            .map(|entry| GameLogRow::from_entry(player_id, season, game_type, entry))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Player {player_id} has {} games", rows.len());
        Ok(rows)
    }
}

impl GameLogSource for NhlClient {
    async fn game_log(
        &self,
        player_id: i64,
        season: Season,
        game_type: GameType,
    ) -> Result<Vec<GameLogRow>, AppError> {
        self.fetch_game_log(player_id, season, game_type).await
    }
}
