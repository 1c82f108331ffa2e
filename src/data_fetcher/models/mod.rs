pub mod common;
pub mod game_log;
pub mod roster;

pub use common::{GameType, LocalizedString, PlayerCategory, Season, to_snake_case};
pub use game_log::{GameLogEntry, GameLogResponse, GameLogRow};
pub use roster::{RosterPlayer, RosterResponse, RosterRow};
