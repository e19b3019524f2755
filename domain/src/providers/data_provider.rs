use serde_json::Value;

use crate::models::FetchParams;
use crate::providers::ProviderError;
use crate::types::CancellationToken;

/// Scheduling hint passed along with a raw fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    #[default]
    ForegroundHigh,
    ForegroundLow,
    BackgroundHigh,
    BackgroundNormal,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForegroundHigh => "fg-high",
            Self::ForegroundLow => "fg-low",
            Self::BackgroundHigh => "bg-high",
            Self::BackgroundNormal => "bg-normal",
        }
    }
}

/// Source of records for a store.
///
/// `get` performs the remote call, `process` shapes its response and
/// `get_processed` chains the two. `process` answers `None` when the response
/// lacks the fields a record needs, which is "no data" rather than an error.
#[async_trait::async_trait]
pub trait DataProvider: Send + Sync {
    type Record: Send + Sync + 'static;

    /// Identity tag of the provider, used in logs.
    fn provider_type(&self) -> &'static str;

    async fn get(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
        priority: Priority,
    ) -> Result<Value, ProviderError>;

    fn process(&self, response: Value) -> Option<Self::Record>;

    async fn get_processed(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
    ) -> Result<Option<Self::Record>, ProviderError> {
        let response = self.get(params, cancellation, Priority::default()).await?;
        Ok(self.process(response))
    }

    /// Releases resources held by the provider. Called by the owning store
    /// when it is torn down.
    fn destroy(&self) {}
}
