//! Supplementary lookups via the Etherscan API
//!
//! Etherscan annotates reports (total supply, ether balances); it is never
//! load-bearing for the core queries. Callers treat failures here as
//! warnings, not aborts.

use alloy::primitives::{Address, U256};
use serde::Deserialize;
use std::time::Duration;

use crate::constants;
use crate::error::{ClientError, ClientResult};

/// Etherscan response envelope: status "1" is success, "0" carries an
/// error message in `message`/`result`
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    result: String,
}

/// Etherscan API client
pub struct EtherscanClient {
    client: reqwest::Client,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(api_key: String) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_key })
    }

    /// ERC-20 total supply in raw token units
    pub async fn token_total_supply(&self, token: Address) -> ClientResult<U256> {
        let url = format!(
            "{}?module=stats&action=tokensupply&contractaddress={}&apikey={}",
            constants::ETHERSCAN_API_BASE,
            token,
            self.api_key
        );
        let result = self.call(&url).await?;
        parse_u256(&result)
    }

    /// Ether balance of an address in wei
    pub async fn ether_balance(&self, address: Address) -> ClientResult<U256> {
        let url = format!(
            "{}?module=account&action=balance&address={}&tag=latest&apikey={}",
            constants::ETHERSCAN_API_BASE,
            address,
            self.api_key
        );
        let result = self.call(&url).await?;
        parse_u256(&result)
    }

    /// Single-attempt GET; Etherscan is supplementary, so no retry here
    async fn call(&self, url: &str) -> ClientResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Upstream(format!(
                "Etherscan returned status {status}"
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| ClientError::Upstream(format!("parse error: {e}")))?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope(envelope: Envelope) -> ClientResult<String> {
    if envelope.status == "1" {
        Ok(envelope.result)
    } else if envelope.message.contains("No") || envelope.result.contains("not found") {
        Err(ClientError::NotFound(envelope.result))
    } else {
        Err(ClientError::Upstream(format!(
            "{}: {}",
            envelope.message, envelope.result
        )))
    }
}

fn parse_u256(decimal: &str) -> ClientResult<U256> {
    U256::from_str_radix(decimal.trim(), 10)
        .map_err(|e| ClientError::Upstream(format!("invalid integer '{decimal}': {e}")))
}
