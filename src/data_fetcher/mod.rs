pub mod api;
pub mod coordinator;
pub mod models;
pub mod processors;
pub mod throttle;

pub use api::NhlClient;
pub use coordinator::{FetchReport, GameLogSource, fetch_game_logs, fetch_rosters};
pub use models::{GameLogRow, GameType, PlayerCategory, RosterRow, Season};
pub use throttle::Throttle;
