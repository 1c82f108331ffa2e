use super::{Table, Value};
use crate::data_fetcher::models::{GameLogRow, RosterRow};
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info, warn};

/// Columns every game-log table starts with, in order.
pub const GAME_LOG_COLUMNS: [&str; 9] = [
    "player_id",
    "season_id",
    "game_type_id",
    "game_id",
    "game_date",
    "team_abbrev",
    "opponent_abbrev",
    "home_road_flag",
    "toi_seconds",
];

/// Roster attributes appended by the join, in order.
pub const ROSTER_COLUMNS: [&str; 10] = [
    "first_name",
    "last_name",
    "sweater_number",
    "position_code",
    "shoots_catches",
    "height_in_centimeters",
    "weight_in_kilograms",
    "birth_date",
    "birth_country",
    "current_team_abbrev",
];

/// Builds the game-log side of the join: fixed leading columns, then the
/// union of every stat key seen, sorted.
pub fn game_log_table(rows: &[GameLogRow]) -> Table {
    let stat_columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.stats.keys().map(String::as_str))
        .filter(|k| !GAME_LOG_COLUMNS.contains(k) && !ROSTER_COLUMNS.contains(k))
        .collect();

    let columns: Vec<String> = GAME_LOG_COLUMNS
        .iter()
        .copied()
        .chain(stat_columns.iter().copied())
        .map(String::from)
        .collect();
    let mut table = Table::new(columns);

    for row in rows {
        let mut cells = vec![
            Value::Int(row.player_id),
            Value::Int(i64::from(row.season_id)),
            Value::Int(i64::from(row.game_type_id)),
            Value::Int(row.game_id),
            Value::Date(row.game_date),
            row.team_abbrev.clone().into(),
            row.opponent_abbrev.clone().into(),
            row.home_road_flag.clone().into(),
            row.toi_seconds.into(),
        ];
        cells.extend(
            stat_columns
                .iter()
                .map(|name| row.stats.get(*name).cloned().unwrap_or(Value::Null)),
        );
        // Width always matches the header built above
        table.rows.push(cells);
    }
    table
}

fn roster_cells(roster: Option<&RosterRow>) -> Vec<Value> {
    match roster {
        Some(r) => vec![
            r.first_name.clone().into(),
            r.last_name.clone().into(),
            r.sweater_number.into(),
            r.position_code.clone().into(),
            r.shoots_catches.clone().into(),
            r.height_in_centimeters.into(),
            r.weight_in_kilograms.into(),
            r.birth_date.clone().into(),
            r.birth_country.clone().into(),
            r.current_team_abbrev.clone().into(),
        ],
        None => vec![Value::Null; ROSTER_COLUMNS.len()],
    }
}

/// Left-joins game-log rows to roster rows on player id.
///
/// Every game-log row yields exactly one output row; players missing from the
/// roster get NULL roster attributes. Exact duplicate game-log rows are
/// dropped before the join.
pub fn assemble_performance_table(game_logs: &[GameLogRow], roster: &[RosterRow]) -> Table {
    let mut left = game_log_table(game_logs);
    let duplicates = left.drop_duplicates();
    if duplicates > 0 {
        warn!("Game-log rows contained {duplicates} exact duplicates, dropped them");
    }

    let mut by_player: HashMap<i64, &RosterRow> = HashMap::with_capacity(roster.len());
    for r in roster {
        by_player.entry(r.player_id).or_insert(r);
    }

    let rows_before = left.len();
    info!("Number of rows before the join: {rows_before}");

    let player_idx = 0;
    let mut columns = left.columns.clone();
    columns.extend(ROSTER_COLUMNS.iter().map(|c| c.to_string()));
    let mut joined = Table::new(columns);
    let mut unmatched = 0usize;

    for mut row in left.rows {
        let matched = match &row[player_idx] {
            Value::Int(id) => by_player.get(id).copied(),
            _ => None,
        };
        if matched.is_none() {
            unmatched += 1;
        }
        row.extend(roster_cells(matched));
        joined.rows.push(row);
    }

    let rows_after = joined.len();
    info!("Number of rows after the join: {rows_after}");
    if unmatched > 0 {
        warn!("{unmatched} game-log rows had no matching roster entry");
    }
    if rows_before == rows_after {
        info!("Row count unchanged by the roster join");
    } else {
        error!("Row count changed by the roster join: {rows_before} -> {rows_after}");
    }

    joined
}
