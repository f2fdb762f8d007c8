use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::WeatherLog;

pub mod openmeteo;

pub use openmeteo::OpenMeteoFetcher;

/// Failure of a single fetch attempt. Fetch errors are never retried here;
/// the scheduler logs them and moves on to the next iteration.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connect failure, timeout, TLS error, or body read error.
    #[error("weather request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("weather API returned status {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Upstream answered 2xx with a body that does not decode.
    #[error("failed to decode weather API response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    /// Fetch one current-weather observation, stamped at fetch time.
    async fn fetch_current(&self) -> Result<WeatherLog, FetchError>;
}
