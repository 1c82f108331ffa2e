use super::common::{LocalizedString, PlayerCategory};
use serde::{Deserialize, Serialize};

/// Response of `/roster/{team}/current`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RosterResponse {
    #[serde(default)]
    pub forwards: Vec<RosterPlayer>,
    #[serde(default)]
    pub defensemen: Vec<RosterPlayer>,
    #[serde(default)]
    pub goalies: Vec<RosterPlayer>,
}

impl RosterResponse {
    pub fn players(&self) -> impl Iterator<Item = &RosterPlayer> {
        self.forwards
            .iter()
            .chain(self.defensemen.iter())
            .chain(self.goalies.iter())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RosterPlayer {
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: LocalizedString,
    #[serde(rename = "lastName")]
    pub last_name: LocalizedString,
    #[serde(rename = "sweaterNumber", default)]
    pub sweater_number: Option<i64>,
    #[serde(rename = "positionCode", default)]
    pub position_code: String,
    #[serde(rename = "shootsCatches", default)]
    pub shoots_catches: Option<String>,
    #[serde(rename = "heightInCentimeters", default)]
    pub height_in_centimeters: Option<i64>,
    #[serde(rename = "weightInKilograms", default)]
    pub weight_in_kilograms: Option<i64>,
    #[serde(rename = "birthDate", default)]
    pub birth_date: Option<String>,
    #[serde(rename = "birthCountry", default)]
    pub birth_country: Option<String>,
}

/// One rostered player as of the current fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub sweater_number: Option<i64>,
    pub position_code: String,
    pub category: PlayerCategory,
    pub shoots_catches: Option<String>,
    pub height_in_centimeters: Option<i64>,
    pub weight_in_kilograms: Option<i64>,
    pub birth_date: Option<String>,
    pub birth_country: Option<String>,
    pub current_team_abbrev: String,
}

impl RosterRow {
    pub fn from_player(player: &RosterPlayer, team_abbrev: &str) -> Self {
        RosterRow {
            player_id: player.id,
            first_name: player.first_name.normalized(),
            last_name: player.last_name.normalized(),
            sweater_number: player.sweater_number,
            position_code: player.position_code.clone(),
            category: PlayerCategory::from_position_code(&player.position_code),
            shoots_catches: player.shoots_catches.clone(),
            height_in_centimeters: player.height_in_centimeters,
            weight_in_kilograms: player.weight_in_kilograms,
            birth_date: player.birth_date.clone(),
            birth_country: player.birth_country.clone(),
            current_team_abbrev: team_abbrev.to_string(),
        }
    }
}
