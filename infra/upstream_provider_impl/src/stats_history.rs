use domain::models::{FetchParams, TimeSeriesRecord};
use domain::providers::{DataProvider, Priority, ProviderError};
use domain::types::CancellationToken;
use serde_json::Value;

use crate::{required_player_id, UpstreamClient};

/// Per-player statistics history, one snapshot per period, newest first.
#[derive(Debug, Clone)]
pub struct StatsHistoryProvider {
    client: UpstreamClient,
    api_url: String,
}

impl StatsHistoryProvider {
    pub fn new(client: UpstreamClient, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    fn history_url(&self, player_id: &str) -> String {
        format!(
            "{}/player/{player_id}/history",
            self.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl DataProvider for StatsHistoryProvider {
    type Record = TimeSeriesRecord;

    fn provider_type(&self) -> &'static str {
        "stats-history"
    }

    async fn get(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
        priority: Priority,
    ) -> Result<Value, ProviderError> {
        let url = self.history_url(required_player_id(params)?);
        self.client.get_json(&url, cancellation, priority).await
    }

    /// `null` is an empty history; anything but an array is no data.
    fn process(&self, response: Value) -> Option<TimeSeriesRecord> {
        let snapshots = match response {
            Value::Null => Vec::new(),
            Value::Array(snapshots) => snapshots,
            _ => return None,
        };

        Some(TimeSeriesRecord::from_newest_first(
            snapshots
                .into_iter()
                .filter_map(|snapshot| match snapshot {
                    Value::Object(snapshot) => Some(snapshot),
                    _ => None,
                })
                .collect(),
        ))
    }
}
