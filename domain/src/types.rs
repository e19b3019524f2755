mod cancellation;
mod timestamped;

pub use cancellation::CancellationToken;
pub use timestamped::TimeStamped;
