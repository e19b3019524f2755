use domain::models::{FetchParams, PlayerRecord};
use domain::providers::{DataProvider, Priority, ProviderError};
use domain::types::CancellationToken;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{required_player_id, PlayerInfoProvider, UpstreamClient};

const SCORES_TYPE_PARAM: &str = "scoresType";
const SCORES_PAGE_PARAM: &str = "scoresPage";
const DEFAULT_SCORES_TYPE: &str = "recent";
const DEFAULT_SCORES_PAGE: u64 = 1;

/// A player profile together with one page of their scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerWithScores {
    pub player: PlayerRecord,
    pub scores: Vec<Value>,
    pub scores_type: String,
    pub scores_page: u64,
}

#[derive(Debug, Clone)]
pub struct PlayerWithScoresProvider {
    player_info: PlayerInfoProvider,
    client: UpstreamClient,
    api_host: String,
}

impl PlayerWithScoresProvider {
    pub fn new(client: UpstreamClient, api_host: impl Into<String>) -> Self {
        let api_host = api_host.into();
        Self {
            player_info: PlayerInfoProvider::new(client.clone(), api_host.clone()),
            client,
            api_host,
        }
    }

    fn scores_url(&self, player_id: &str, scores_type: &str, scores_page: u64) -> String {
        format!(
            "{}/api/player/{player_id}/scores?sort={scores_type}&page={scores_page}",
            self.api_host.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl DataProvider for PlayerWithScoresProvider {
    type Record = PlayerWithScores;

    fn provider_type(&self) -> &'static str {
        "player-with-scores"
    }

    /// Fetches the profile and the requested score page concurrently.
    async fn get(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
        priority: Priority,
    ) -> Result<Value, ProviderError> {
        let player_id = required_player_id(params)?;
        let scores_type = params
            .get_str(SCORES_TYPE_PARAM)
            .unwrap_or(DEFAULT_SCORES_TYPE);
        let scores_page = params
            .get_u64(SCORES_PAGE_PARAM)
            .unwrap_or(DEFAULT_SCORES_PAGE);

        let player_url = self.player_info.player_url(player_id);
        let scores_url = self.scores_url(player_id, scores_type, scores_page);

        let (player, scores) = tokio::try_join!(
            self.client.get_json(&player_url, cancellation, priority),
            self.client.get_json(&scores_url, cancellation, priority),
        )?;

        Ok(json!({
            "player": player,
            "scores": scores,
            "scoresType": scores_type,
            "scoresPage": scores_page,
        }))
    }

    fn process(&self, response: Value) -> Option<PlayerWithScores> {
        let Value::Object(mut response) = response else {
            return None;
        };

        let player = self.player_info.process(response.remove("player")?)?;

        // the scores endpoint wraps its list, older deployments answer a bare array
        let scores = match response.remove("scores") {
            Some(Value::Array(scores)) => scores,
            Some(Value::Object(mut page)) => match page.remove("playerScores") {
                Some(Value::Array(scores)) => scores,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        Some(PlayerWithScores {
            player,
            scores,
            scores_type: response
                .get("scoresType")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SCORES_TYPE)
                .to_owned(),
            scores_page: response
                .get("scoresPage")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_SCORES_PAGE),
        })
    }
}
