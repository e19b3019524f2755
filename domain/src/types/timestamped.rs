use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct TimeStamped<T> {
    pub data: T,
    pub utc_timestamp: DateTime<Utc>,
}

impl<T> TimeStamped<T> {
    pub fn now(data: T) -> Self {
        Self {
            data,
            utc_timestamp: Utc::now(),
        }
    }

    /// Seconds since the unix epoch, keeping the sub-second part.
    #[allow(clippy::cast_precision_loss)]
    pub fn epoch_seconds(&self) -> f64 {
        self.utc_timestamp.timestamp_millis() as f64 / 1000.0
    }
}
