mod fetch_params;
mod player;
mod time_series;

pub use fetch_params::{FetchParams, Fingerprint};
pub use player::{CountryRank, PlayerId, PlayerInfo, PlayerRecord};
pub use time_series::TimeSeriesRecord;
