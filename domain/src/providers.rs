mod data_provider;
mod provider_error;

pub use data_provider::{DataProvider, Priority};
pub use provider_error::ProviderError;
