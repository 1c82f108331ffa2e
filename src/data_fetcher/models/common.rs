use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A name field the API returns per locale, e.g. `{"default": "Montréal", "fr": "Montréal"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedString {
    #[serde(default)]
    pub default: String,
    #[serde(flatten)]
    pub translations: BTreeMap<String, String>,
}

impl LocalizedString {
    /// Normalises the localized field down to the `default` entry.
    pub fn normalized(&self) -> String {
        self.default.trim().to_string()
    }
}

/// Season id in the API's `YYYYYYYY` form, e.g. `20242025`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Season(u32);

impl Season {
    pub fn new(id: u32) -> Result<Self, AppError> {
        let start = id / 10_000;
        let end = id % 10_000;
        if !(1917..=2999).contains(&start) || end != start + 1 {
            return Err(AppError::InvalidSeason(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Season {
    type Error = AppError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Season::new(value)
    }
}

impl From<Season> for u32 {
    fn from(season: Season) -> Self {
        season.0
    }
}

impl FromStr for Season {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u32>()
            .map_err(|_| AppError::InvalidSeason(s.to_string()))?;
        Season::new(id)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameType {
    Preseason,
    RegularSeason,
    Playoffs,
}

impl GameType {
    pub fn id(&self) -> u8 {
        match self {
            GameType::Preseason => 1,
            GameType::RegularSeason => 2,
            GameType::Playoffs => 3,
        }
    }
}

impl TryFrom<u8> for GameType {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GameType::Preseason),
            2 => Ok(GameType::RegularSeason),
            3 => Ok(GameType::Playoffs),
            other => Err(AppError::config_error(format!(
                "Unknown game type {other}, expected 1 (preseason), 2 (regular season) or 3 (playoffs)"
            ))),
        }
    }
}

impl From<GameType> for u8 {
    fn from(game_type: GameType) -> Self {
        game_type.id()
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Player category; each one is assembled and loaded as its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerCategory {
    Skaters,
    Goalies,
}

impl PlayerCategory {
    pub const ALL: [PlayerCategory; 2] = [PlayerCategory::Skaters, PlayerCategory::Goalies];

    /// Table and object-path name of the category
    pub fn table_name(&self) -> &'static str {
        match self {
            PlayerCategory::Skaters => "skaters",
            PlayerCategory::Goalies => "goalies",
        }
    }

    pub fn from_position_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("G") {
            PlayerCategory::Goalies
        } else {
            PlayerCategory::Skaters
        }
    }
}

impl fmt::Display for PlayerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for PlayerCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skaters" | "skater" => Ok(PlayerCategory::Skaters),
            "goalies" | "goalie" => Ok(PlayerCategory::Goalies),
            other => Err(AppError::config_error(format!(
                "Unknown player category '{other}'"
            ))),
        }
    }
}

/// Converts an API field name such as `powerPlayGoals` to `power_play_goals`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if ch == '-' || ch == ' ' || ch == '.' {
            out.push('_');
            prev_lower_or_digit = false;
        } else {
            out.push(ch);
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
