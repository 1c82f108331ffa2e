//! Fan-out / fan-in of per-player fetches over a bounded pool.

use crate::data_fetcher::api::NhlClient;
use crate::data_fetcher::models::{GameLogRow, GameType, RosterRow, Season};
use crate::data_fetcher::throttle::Throttle;
use crate::error::AppError;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Anything that can produce one player's game log.
#[allow(async_fn_in_trait)]
pub trait GameLogSource {
    async fn game_log(
        &self,
        player_id: i64,
        season: Season,
        game_type: GameType,
    ) -> Result<Vec<GameLogRow>, AppError>;
}

/// Result of a coordinated fetch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Rows of every successful fetch, in completion order
    pub rows: Vec<GameLogRow>,
    /// Players whose fetch failed
    pub failed: Vec<i64>,
    /// Players fetched successfully (including those with no games)
    pub succeeded: usize,
}

/// Fetches the game logs of `player_ids` with at most `workers` requests in
/// flight, each one gated by `throttle`.
///
/// A failed player is logged and left out; it never cancels the others.
pub async fn fetch_game_logs<S: GameLogSource>(
    source: &S,
    throttle: &Throttle,
    player_ids: &[i64],
    season: Season,
    game_type: GameType,
    workers: usize,
) -> FetchReport {
    let workers = workers.max(1);
    info!(
        "Fetching game logs for {} players (season {season}, game type {game_type}, {workers} workers)",
        player_ids.len()
    );

    let mut results = stream::iter(player_ids.iter().copied())
        .map(|player_id| async move {
            throttle.acquire().await;
            (player_id, source.game_log(player_id, season, game_type).await)
        })
        .buffer_unordered(workers);

    let mut report = FetchReport::default();
    while let Some((player_id, result)) = results.next().await {
        match result {
            Ok(rows) => {
                report.succeeded += 1;
                report.rows.extend(rows);
            }
            Err(e) => {
                error!("Failed to fetch game log for player {player_id}: {e}");
                report.failed.push(player_id);
            }
        }
    }

    info!(
        "Fetched {} game-log rows from {} players, {} failed",
        report.rows.len(),
        report.succeeded,
        report.failed.len()
    );
    report
}

/// Fetches every team's current roster, one team at a time.
///
/// Teams that fail are logged and skipped. A player listed by more than one
/// team keeps the first row seen.
pub async fn fetch_rosters(
    client: &NhlClient,
    throttle: &Throttle,
    teams: &[String],
) -> Vec<RosterRow> {
    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for team in teams {
        throttle.acquire().await;
        match client.fetch_roster(team).await {
            Ok(team_rows) => {
                info!("Fetched {} players for {team}", team_rows.len());
                for row in team_rows {
                    if seen.insert(row.player_id) {
                        rows.push(row);
                    } else {
                        warn!(
                            "Player {} appears on more than one roster, keeping the first",
                            row.player_id
                        );
                    }
                }
            }
            Err(e) => error!("Failed to fetch roster for {team}: {e}"),
        }
    }

    info!("Fetched {} rostered players from {} teams", rows.len(), teams.len());
    rows
}
