use anyhow::Result;
use envy::Error;
use serde::Deserialize;
use std::time::Duration;

pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, Error>;
}

pub trait FromEnvLikeKeyValuePairs: Sized {
    fn from_iter(iter: impl Iterator<Item = (String, String)> + Clone) -> Result<Self, Error>;
}

impl<T: FromEnvLikeKeyValuePairs> FromEnv for T {
    fn from_env() -> Result<Self, Error> {
        // std::env::Vars is not Clone
        Self::from_iter(std::env::vars().collect::<Vec<_>>().into_iter())
    }
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    pub upstream_config: UpstreamConfig,
    pub viewer_config: ViewerConfig,
}

impl FromEnvLikeKeyValuePairs for AppConfig {
    fn from_iter(iter: impl Iterator<Item = (String, String)> + Clone) -> Result<Self, Error> {
        Ok(Self {
            upstream_config: UpstreamConfig::from_iter(iter.clone())?,
            viewer_config: ViewerConfig::from_iter(iter)?,
        })
    }
}

const fn default_request_timeout_millis() -> u64 {
    10_000
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpstreamConfig {
    /// Host serving player profiles; relative avatar paths are resolved against it.
    pub player_api_host: String,
    /// Base URL of the per-player statistics history endpoint.
    pub stats_history_api_url: String,
    #[serde(default = "default_request_timeout_millis")]
    pub request_timeout_millis: u64,
}

impl UpstreamConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_millis)
    }
}

fn default_scores_type() -> String {
    "recent".to_owned()
}

const fn default_scores_page() -> u64 {
    1
}

#[derive(Deserialize, Debug, Clone)]
pub struct ViewerConfig {
    pub player_id: String,
    #[serde(default = "default_scores_type")]
    pub scores_type: String,
    #[serde(default = "default_scores_page")]
    pub scores_page: u64,
}

impl FromEnvLikeKeyValuePairs for UpstreamConfig {
    fn from_iter(iter: impl Iterator<Item = (String, String)>) -> Result<Self, Error> {
        envy::prefixed("UPSTREAM_").from_iter(iter)
    }
}

impl FromEnvLikeKeyValuePairs for ViewerConfig {
    fn from_iter(iter: impl Iterator<Item = (String, String)>) -> Result<Self, Error> {
        envy::prefixed("VIEWER_").from_iter(iter)
    }
}
