mod http;
mod player_info;
mod player_with_scores;
mod stats_history;

pub use http::UpstreamClient;
pub use player_info::{normalize_player, resolve_avatar, PlayerInfoProvider};
pub use player_with_scores::{PlayerWithScores, PlayerWithScoresProvider};
pub use stats_history::StatsHistoryProvider;

use domain::models::FetchParams;
use domain::providers::ProviderError;

pub(crate) const PLAYER_ID_PARAM: &str = "playerId";

fn required_player_id(params: &FetchParams) -> Result<&str, ProviderError> {
    params
        .get_str(PLAYER_ID_PARAM)
        .ok_or(ProviderError::MissingParam(PLAYER_ID_PARAM))
}
