use thiserror::Error;

/// Closed set of reasons a provider can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request was superseded or aborted through its cancellation token.
    #[error("request was cancelled")]
    Cancelled,
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("fetch params lack `{0}`")]
    MissingParam(&'static str),
}

impl ProviderError {
    /// Cancellation-class failures are routine outcomes of superseding a
    /// request and never surface as errors.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }
}
