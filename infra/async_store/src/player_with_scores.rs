use std::ops::Deref;
use std::sync::Arc;

use domain::models::{FetchParams, PlayerId};
use parking_lot::Mutex;

use crate::hooks::{HookContext, StoreHooks};
use crate::registry::RegisteredStore;
use crate::store::{AsyncStore, FetchOutcome, StoreOptions};
use crate::SharedProvider;

pub const PLAYER_ID_PARAM: &str = "playerId";
pub const SCORES_TYPE_PARAM: &str = "scoresType";
pub const SCORES_PAGE_PARAM: &str = "scoresPage";

/// Which player, score list and page the store currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoresCursor {
    pub player_id: Option<PlayerId>,
    pub scores_type: Option<String>,
    pub scores_page: Option<u64>,
}

impl ScoresCursor {
    fn from_params(params: &FetchParams) -> Self {
        Self {
            player_id: params.get_str(PLAYER_ID_PARAM).map(PlayerId::from),
            scores_type: params.get_str(SCORES_TYPE_PARAM).map(str::to_owned),
            scores_page: params.get_u64(SCORES_PAGE_PARAM),
        }
    }

    fn to_params(&self) -> FetchParams {
        let mut params = FetchParams::new();
        if let Some(player_id) = &self.player_id {
            params.insert(PLAYER_ID_PARAM, player_id.as_str());
        }
        if let Some(scores_type) = &self.scores_type {
            params.insert(SCORES_TYPE_PARAM, scores_type.as_str());
        }
        if let Some(scores_page) = self.scores_page {
            params.insert(SCORES_PAGE_PARAM, scores_page);
        }
        params
    }

    /// Whether every supplied value equals the tracked one; `None` matches anything.
    fn covers(
        &self,
        player_id: Option<&PlayerId>,
        scores_type: Option<&str>,
        scores_page: Option<u64>,
    ) -> bool {
        player_id.map_or(true, |id| self.player_id.as_ref() == Some(id))
            && scores_type.map_or(true, |kind| self.scores_type.as_deref() == Some(kind))
            && scores_page.map_or(true, |page| self.scores_page == Some(page))
    }
}

/// Player profile store that remembers the player, scores type and page of
/// the last applied fetch, so callers can change one of them at a time.
pub struct PlayerWithScoresStore<R: Send + Sync + 'static> {
    store: AsyncStore<R>,
    provider: SharedProvider<R>,
    cursor: Arc<Mutex<ScoresCursor>>,
}

impl<R: Send + Sync + 'static> Clone for PlayerWithScoresStore<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            provider: Arc::clone(&self.provider),
            cursor: Arc::clone(&self.cursor),
        }
    }
}

impl<R: Send + Sync + 'static> PlayerWithScoresStore<R> {
    /// With a player id and no initial state, the profile is fetched right away.
    pub fn new(
        provider: SharedProvider<R>,
        player_id: Option<PlayerId>,
        scores_type: &str,
        scores_page: u64,
        initial_state: Option<R>,
    ) -> Self {
        let cursor = Arc::new(Mutex::new(ScoresCursor {
            player_id: None,
            scores_type: Some(scores_type.to_owned()),
            scores_page: Some(scores_page),
        }));

        let fetch_params = player_id.map(|player_id| {
            ScoresCursor {
                player_id: Some(player_id),
                scores_type: Some(scores_type.to_owned()),
                scores_page: Some(scores_page),
            }
            .to_params()
        });

        let hooks = StoreHooks::default()
            .with_on_initialized(track_cursor(&cursor))
            .with_on_after_state_change(track_cursor(&cursor));

        let store = AsyncStore::new(
            Arc::clone(&provider),
            StoreOptions {
                fetch_params,
                initial_state,
                hooks,
                ..StoreOptions::default()
            },
        );

        Self {
            store,
            provider,
            cursor,
        }
    }

    /// Fetches with each missing argument taken from the cursor. Without
    /// `force`, nothing happens when every given argument matches the cursor.
    pub async fn fetch(
        &self,
        player_id: Option<PlayerId>,
        scores_type: Option<String>,
        scores_page: Option<u64>,
        force: bool,
    ) -> FetchOutcome {
        let cursor = self.cursor.lock().clone();

        if !force && cursor.covers(player_id.as_ref(), scores_type.as_deref(), scores_page) {
            return FetchOutcome::Unchanged;
        }

        let target = ScoresCursor {
            player_id: player_id.or(cursor.player_id),
            scores_type: scores_type.or(cursor.scores_type),
            scores_page: scores_page.or(cursor.scores_page),
        };

        self.store
            .fetch_with_provider(target.to_params(), force, Some(Arc::clone(&self.provider)))
            .await
    }

    pub fn cursor(&self) -> ScoresCursor {
        self.cursor.lock().clone()
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.cursor.lock().player_id.clone()
    }

    pub fn scores_type(&self) -> Option<String> {
        self.cursor.lock().scores_type.clone()
    }

    pub fn set_scores_type(&self, scores_type: impl Into<String>) {
        self.cursor.lock().scores_type = Some(scores_type.into());
    }

    pub fn scores_page(&self) -> Option<u64> {
        self.cursor.lock().scores_page
    }

    pub fn set_scores_page(&self, scores_page: u64) {
        self.cursor.lock().scores_page = Some(scores_page);
    }
}

fn track_cursor<R: 'static>(
    cursor: &Arc<Mutex<ScoresCursor>>,
) -> impl Fn(HookContext<'_, R>) + Send + Sync + 'static {
    let cursor = Arc::clone(cursor);
    move |context: HookContext<'_, R>| {
        if let Some(params) = context.fetch_params {
            *cursor.lock() = ScoresCursor::from_params(params);
        }
    }
}

impl<R: Send + Sync + 'static> Deref for PlayerWithScoresStore<R> {
    type Target = AsyncStore<R>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<R: Send + Sync + 'static> RegisteredStore for PlayerWithScoresStore<R> {
    fn teardown(&self) {
        self.store.teardown();
    }
}
