use domain::models::{CountryRank, FetchParams, PlayerId, PlayerInfo, PlayerRecord};
use domain::providers::{DataProvider, Priority, ProviderError};
use domain::types::CancellationToken;
use serde_json::Value;

use crate::{required_player_id, UpstreamClient};

/// Profile fields that are either reshaped or dropped during normalization.
const CONSUMED_FIELDS: [&str; 12] = [
    "playerId",
    "playerName",
    "country",
    "countryRank",
    "avatar",
    "permissions",
    "banned",
    "inactive",
    "history",
    "rankHistory",
    "externalProfileUrl",
    "countries",
];

/// Profile of a single player from the player API.
#[derive(Debug, Clone)]
pub struct PlayerInfoProvider {
    client: UpstreamClient,
    api_host: String,
}

impl PlayerInfoProvider {
    pub fn new(client: UpstreamClient, api_host: impl Into<String>) -> Self {
        Self {
            client,
            api_host: api_host.into(),
        }
    }

    pub(crate) fn player_url(&self, player_id: &str) -> String {
        format!(
            "{}/api/player/{player_id}/full",
            self.api_host.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl DataProvider for PlayerInfoProvider {
    type Record = PlayerRecord;

    fn provider_type(&self) -> &'static str {
        "player-info"
    }

    async fn get(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
        priority: Priority,
    ) -> Result<Value, ProviderError> {
        let url = self.player_url(required_player_id(params)?);
        self.client.get_json(&url, cancellation, priority).await
    }

    fn process(&self, response: Value) -> Option<PlayerRecord> {
        normalize_player(&self.api_host, response)
    }
}

/// Shapes a raw player response into a [`PlayerRecord`].
///
/// Answers `None` when the response carries no `playerInfo` object or the
/// profile has no player id. Relative avatar paths are resolved against
/// `api_host`; `banned` and `inactive` become booleans by truthiness; the
/// comma separated `history` becomes `rank_history`; `permissions` is dropped.
pub fn normalize_player(api_host: &str, response: Value) -> Option<PlayerRecord> {
    let Value::Object(mut response) = response else {
        return None;
    };
    let Some(Value::Object(mut info)) = response.remove("playerInfo") else {
        return None;
    };

    let player_id = info.get("playerId").and_then(id_string)?;
    let name = info.get("playerName").and_then(Value::as_str).map(str::to_owned);

    let avatar = info
        .get("avatar")
        .and_then(Value::as_str)
        .filter(|avatar| !avatar.is_empty())
        .map(|avatar| resolve_avatar(api_host, avatar));

    let banned = info.get("banned").is_some_and(is_truthy);
    let inactive = info.get("inactive").is_some_and(is_truthy);

    let rank_history = info
        .get("history")
        .and_then(Value::as_str)
        .map(parse_rank_history)
        .unwrap_or_default();

    let countries = vec![CountryRank {
        country: info.get("country").and_then(Value::as_str).map(str::to_owned),
        rank: info.get("countryRank").and_then(Value::as_i64),
    }];

    for field in CONSUMED_FIELDS {
        info.remove(field);
    }

    let score_stats = match response.remove("scoreStats") {
        Some(Value::Object(stats)) => Some(stats),
        _ => None,
    };

    Some(PlayerRecord {
        player_id: PlayerId::from(player_id),
        name,
        player_info: PlayerInfo {
            avatar,
            banned,
            inactive,
            rank_history,
            external_profile_url: None,
            countries,
            other: info,
        },
        score_stats,
    })
}

/// Absolute avatar URLs are kept; anything else is a path on `api_host`.
pub fn resolve_avatar(api_host: &str, avatar: &str) -> String {
    if avatar.starts_with("http") {
        avatar.to_owned()
    } else {
        format!(
            "{}/{}",
            api_host.trim_end_matches('/'),
            avatar.trim_start_matches('/')
        )
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_rank_history(history: &str) -> Vec<i64> {
    history.split(',').filter_map(leading_integer).collect()
}

/// Integer at the start of `token`, ignoring leading whitespace and any
/// trailing garbage (`"12abc"` is 12).
fn leading_integer(token: &str) -> Option<i64> {
    let token = token.trim_start();
    let sign_len = usize::from(token.starts_with(['+', '-']));
    let digits_len = token[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();

    if digits_len == 0 {
        return None;
    }

    token[..sign_len + digits_len].parse().ok()
}
