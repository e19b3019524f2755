#![deny(clippy::all)]
#![warn(clippy::nursery, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use domain::providers::DataProvider;

mod hooks;
mod player_with_scores;
mod registry;
mod stats_history;
mod store;

#[cfg(test)]
mod test_support;

pub use hooks::{HookContext, StateSetter, StoreHooks};
pub use player_with_scores::{
    PlayerWithScoresStore, ScoresCursor, PLAYER_ID_PARAM, SCORES_PAGE_PARAM, SCORES_TYPE_PARAM,
};
pub use registry::{RegisteredStore, StoreRegistry, StoreSubscription};
pub use stats_history::{StatsHistoryByPlayer, StatsHistoryStore};
pub use store::{AsyncStore, FetchOutcome, StoreOptions};

/// Providers are shared between the fetches of a store, never cloned.
pub type SharedProvider<R> = Arc<dyn DataProvider<Record = R>>;

/// The last resolved record; `None` until something resolved, or when the
/// provider found no data.
pub type StoreState<R> = Option<Arc<R>>;
