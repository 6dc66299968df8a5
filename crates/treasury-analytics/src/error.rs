//! Error types for the external-service client layer
//!
//! Every client (RPC, price index, explorer, subgraph) returns
//! [`ClientError`]; the aggregator/CLI layer works in `anyhow` and
//! converts via `?`.

use thiserror::Error;

/// Failure classes for calls that leave the process.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested block/coin/contract does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote call itself failed (network, rate limit, bad response).
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A required constant or setting is missing or produces
    /// non-convergent behavior.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Upstream(err.to_string())
    }
}

impl From<alloy::transports::TransportError> for ClientError {
    fn from(err: alloy::transports::TransportError) -> Self {
        ClientError::Upstream(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
