use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Country membership of a player. Kept as a list so that players ranked in
/// several countries can be represented later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRank {
    pub country: Option<String>,
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub avatar: Option<String>,
    pub banned: bool,
    pub inactive: bool,
    pub rank_history: Vec<i64>,
    pub external_profile_url: Option<String>,
    pub countries: Vec<CountryRank>,
    /// Upstream fields passed through untouched (`pp`, `rank`, ...).
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Normalized player profile as produced by the player-info provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub name: Option<String>,
    pub player_info: PlayerInfo,
    pub score_stats: Option<Map<String, Value>>,
}

impl PlayerRecord {
    /// Live numeric value of a statistics field, looked up in the score
    /// stats first and in the remaining profile fields second.
    pub fn current_value(&self, field: &str) -> Option<f64> {
        self.score_stats
            .as_ref()
            .and_then(|stats| stats.get(field))
            .and_then(Value::as_f64)
            .or_else(|| self.player_info.other.get(field).and_then(Value::as_f64))
    }

    pub fn country_rank(&self) -> Option<i64> {
        self.player_info
            .countries
            .first()
            .and_then(|country| country.rank)
    }
}
