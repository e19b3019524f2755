use std::collections::HashMap;
use std::sync::Arc;

use domain::aggregation::aggregate;
use domain::models::{FetchParams, PlayerId, PlayerRecord, TimeSeriesRecord};
use domain::providers::ProviderError;
use domain::types::{CancellationToken, TimeStamped};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::player_with_scores::PLAYER_ID_PARAM;
use crate::registry::RegisteredStore;
use crate::store::FetchOutcome;
use crate::SharedProvider;

pub type StatsHistoryByPlayer = HashMap<PlayerId, TimeSeriesRecord>;

struct InFlight {
    id: u64,
    cancellation: CancellationToken,
}

/// Removes a request's entry once it settles or its future is dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<PlayerId, InFlight>>,
    player_id: &'a PlayerId,
    request_id: u64,
    cancellation: &'a CancellationToken,
    settled: bool,
}

impl InFlightGuard<'_> {
    /// Whether the request was still current; if so its entry is removed.
    fn release(&self) -> bool {
        let mut in_flight = self.in_flight.lock();
        let current = in_flight
            .get(self.player_id)
            .is_some_and(|entry| entry.id == self.request_id);
        if current {
            in_flight.remove(self.player_id);
        }
        current
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cancellation.cancel();
            self.release();
        }
    }
}

/// Processed statistics histories of every player fetched so far.
///
/// One request per player is current; asking again for the same player
/// cancels the previous request. Clones share the same store.
#[derive(Clone)]
pub struct StatsHistoryStore {
    provider: SharedProvider<TimeSeriesRecord>,
    histories: Arc<watch::Sender<Arc<StatsHistoryByPlayer>>>,
    in_flight: Arc<Mutex<HashMap<PlayerId, InFlight>>>,
    next_request_id: Arc<Mutex<u64>>,
}

impl StatsHistoryStore {
    pub fn new(provider: SharedProvider<TimeSeriesRecord>) -> Self {
        Self {
            provider,
            histories: Arc::new(watch::channel(Arc::default()).0),
            in_flight: Arc::default(),
            next_request_id: Arc::default(),
        }
    }

    pub fn get(&self) -> Arc<StatsHistoryByPlayer> {
        Arc::clone(&self.histories.borrow())
    }

    pub fn history_of(&self, player_id: &PlayerId) -> Option<TimeSeriesRecord> {
        self.histories.borrow().get(player_id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatsHistoryByPlayer>> {
        self.histories.subscribe()
    }

    /// Fetches the history of `player`, completes it with the player's live
    /// values and publishes it under the player's id.
    #[tracing::instrument(skip_all, fields(player_id = %player.player_id))]
    pub async fn fetch_stats(&self, player: &PlayerRecord) -> FetchOutcome {
        let player_id = player.player_id.clone();
        let cancellation = CancellationToken::new();
        let request_id = {
            let mut next_request_id = self.next_request_id.lock();
            *next_request_id += 1;
            *next_request_id
        };

        if let Some(superseded) = self.in_flight.lock().insert(
            player_id.clone(),
            InFlight {
                id: request_id,
                cancellation: cancellation.clone(),
            },
        ) {
            tracing::debug!(request_id = superseded.id, "cancelling superseded history request");
            superseded.cancellation.cancel();
        }
        let mut guard = InFlightGuard {
            in_flight: &self.in_flight,
            player_id: &player_id,
            request_id,
            cancellation: &cancellation,
            settled: false,
        };

        let params = FetchParams::new().with(PLAYER_ID_PARAM, player_id.as_str());
        let result = cancellation
            .run_until_cancelled(self.provider.get_processed(&params, &cancellation))
            .await
            .unwrap_or(Err(ProviderError::Cancelled));

        guard.settled = true;
        let still_current = guard.release();
        drop(guard);

        match result {
            Ok(_) if !still_current => FetchOutcome::Superseded,
            Ok(history) => {
                let processed = aggregate(
                    history.unwrap_or_default(),
                    &TimeStamped::now(player.clone()),
                );
                self.histories.send_modify(|histories| {
                    Arc::make_mut(histories).insert(player_id, processed);
                });
                FetchOutcome::Performed
            }
            Err(error) if error.is_cancellation() => {
                cancellation.cancel();
                FetchOutcome::Cancelled
            }
            Err(error) => {
                tracing::warn!(%error, "fetching stats history failed");
                FetchOutcome::Failed
            }
        }
    }
}

impl RegisteredStore for StatsHistoryStore {
    fn teardown(&self) {
        for (_, in_flight) in self.in_flight.lock().drain() {
            in_flight.cancellation.cancel();
        }
        self.provider.destroy();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use domain::aggregation::UNRANKED_PLAY_COUNT_DAILY_FIELD;
    use domain::models::{CountryRank, PlayerInfo};
    use domain::providers::{DataProvider, Priority};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedHistoryProvider {
        response: Result<Value, ProviderError>,
        never_answers: bool,
        destroyed: AtomicUsize,
    }

    impl FixedHistoryProvider {
        fn new(response: Result<Value, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                never_answers: false,
                destroyed: AtomicUsize::new(0),
            })
        }

        fn stalled() -> Arc<Self> {
            Arc::new(Self {
                response: Ok(Value::Null),
                never_answers: true,
                destroyed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl DataProvider for FixedHistoryProvider {
        type Record = TimeSeriesRecord;

        fn provider_type(&self) -> &'static str {
            "fixed-history"
        }

        async fn get(
            &self,
            _params: &FetchParams,
            _cancellation: &CancellationToken,
            _priority: Priority,
        ) -> Result<Value, ProviderError> {
            if self.never_answers {
                std::future::pending::<()>().await;
            }
            self.response.clone()
        }

        fn process(&self, response: Value) -> Option<TimeSeriesRecord> {
            let snapshots = response
                .as_array()?
                .iter()
                .filter_map(|snapshot| snapshot.as_object().cloned())
                .collect();
            Some(TimeSeriesRecord::from_newest_first(snapshots))
        }

        fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn player(id: &str) -> PlayerRecord {
        PlayerRecord {
            player_id: PlayerId::from(id),
            name: None,
            player_info: PlayerInfo {
                avatar: None,
                banned: false,
                inactive: false,
                rank_history: vec![],
                external_profile_url: None,
                countries: vec![CountryRank {
                    country: Some("JP".into()),
                    rank: Some(4),
                }],
                other: serde_json::Map::new(),
            },
            score_stats: json!({"totalPlayCount": 30, "rankedPlayCount": 10})
                .as_object()
                .cloned(),
        }
    }

    #[tokio::test]
    async fn publishes_processed_history_per_player() {
        let provider = FixedHistoryProvider::new(Ok(json!([
            {"timestamp": 200, "countryRank": 5, "totalPlayCount": 20, "rankedPlayCount": 8},
            {"timestamp": 100, "countryRank": 6, "totalPlayCount": 12, "rankedPlayCount": 5},
        ])));
        let store = StatsHistoryStore::new(provider.clone());
        let mut updates = store.subscribe();

        assert_eq!(store.fetch_stats(&player("1")).await, FetchOutcome::Performed);
        assert!(updates.has_changed().unwrap());

        let history = store.history_of(&PlayerId::from("1")).unwrap();
        assert_eq!(
            history.field("totalPlayCountDaily"),
            Some(&[Some(0.0), Some(8.0), Some(10.0)][..])
        );
        assert_eq!(
            history.field(UNRANKED_PLAY_COUNT_DAILY_FIELD),
            Some(&[Some(0.0), Some(5.0), Some(8.0)][..])
        );
        assert_eq!(
            history.field("countryRank"),
            Some(&[Some(6.0), Some(5.0), Some(4.0)][..])
        );

        assert_eq!(store.fetch_stats(&player("2")).await, FetchOutcome::Performed);
        assert_eq!(store.get().len(), 2);
    }

    #[tokio::test]
    async fn failure_leaves_histories_untouched() {
        let provider = FixedHistoryProvider::new(Err(ProviderError::Status(404)));
        let store = StatsHistoryStore::new(provider.clone());
        let mut updates = store.subscribe();

        assert_eq!(store.fetch_stats(&player("1")).await, FetchOutcome::Failed);
        assert!(!updates.has_changed().unwrap());
        assert!(store.get().is_empty());
    }

    #[tokio::test]
    async fn empty_history_is_stored_empty() {
        let provider = FixedHistoryProvider::new(Ok(json!([])));
        let store = StatsHistoryStore::new(provider.clone());

        assert!(store.fetch_stats(&player("1")).await.performed());
        assert!(store.history_of(&PlayerId::from("1")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_fetch_forgets_its_request() {
        let store = StatsHistoryStore::new(FixedHistoryProvider::stalled());
        let mut updates = store.subscribe();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            store.fetch_stats(&player("1")),
        )
        .await;

        assert!(timed_out.is_err());
        assert!(store.in_flight.lock().is_empty());
        assert!(!updates.has_changed().unwrap());
        assert!(store.get().is_empty());
    }

    #[tokio::test]
    async fn teardown_releases_provider() {
        let provider = FixedHistoryProvider::new(Ok(json!([])));
        let store = StatsHistoryStore::new(provider.clone());

        store.teardown();
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 1);
    }
}
