use config::UpstreamConfig;
use domain::providers::{Priority, ProviderError};
use domain::types::CancellationToken;
use serde_json::Value;

const PRIORITY_HEADER: &str = "x-request-priority";

/// JSON-over-HTTP access shared by every upstream provider.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn try_new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client })
    }

    /// GETs `url` and decodes the body as JSON. Cancelling the token drops the
    /// request and resolves to [`ProviderError::Cancelled`].
    pub(crate) async fn get_json(
        &self,
        url: &str,
        cancellation: &CancellationToken,
        priority: Priority,
    ) -> Result<Value, ProviderError> {
        tracing::debug!(url, priority = priority.as_str(), "requesting upstream");

        let request = async {
            let response = self
                .client
                .get(url)
                .header(PRIORITY_HEADER, priority.as_str())
                .send()
                .await
                .map_err(classify)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Status(status.as_u16()));
            }

            response.json::<Value>().await.map_err(classify)
        };

        cancellation
            .run_until_cancelled(request)
            .await
            .unwrap_or(Err(ProviderError::Cancelled))
    }
}

fn classify(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else if let Some(status) = error.status() {
        ProviderError::Status(status.as_u16())
    } else if error.is_decode() {
        ProviderError::InvalidResponse(error.to_string())
    } else {
        ProviderError::Transport(error.to_string())
    }
}
