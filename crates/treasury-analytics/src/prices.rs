//! Token price lookups via the CoinGecko API
//!
//! Historical prices are day-granular and keyed by CoinGecko's DD-MM-YYYY
//! date format. Coin-id resolutions from contract addresses are kept in an
//! explicit per-client cache; dated prices are immutable and belong in the
//! sqlite cache instead.

use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

use crate::constants;
use crate::error::{ClientError, ClientResult};

/// CoinGecko coin history response (trimmed to what we read)
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: HashMap<String, f64>,
}

/// CoinGecko contract lookup response
#[derive(Debug, Deserialize)]
struct ContractResponse {
    id: String,
}

/// CoinGecko price client
pub struct PriceClient {
    client: reqwest::Client,
    /// Demo API key; the public API works without one at a lower rate limit
    api_key: Option<String>,
    /// Resolved contract address -> coin id, explicit and process-local
    coin_ids: Mutex<HashMap<Address, String>>,
    /// (coin id, date) -> USD price for completed days; preloadable from
    /// the sqlite cache
    dated_prices: Mutex<HashMap<(String, String), f64>>,
}

impl PriceClient {
    pub fn new(api_key: Option<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            coin_ids: Mutex::new(HashMap::new()),
            dated_prices: Mutex::new(HashMap::new()),
        })
    }

    /// Seed the dated-price map (from the sqlite cache) before a run
    pub fn preload_dated(&self, entries: impl IntoIterator<Item = (String, String, f64)>) {
        let mut prices = self.dated_prices.lock().unwrap();
        for (coin_id, date, price) in entries {
            prices.insert((coin_id, date), price);
        }
    }

    /// Dated prices looked up or preloaded so far, for persisting
    pub fn dated_snapshot(&self) -> Vec<(String, String, f64)> {
        self.dated_prices
            .lock()
            .unwrap()
            .iter()
            .map(|((coin_id, date), price)| (coin_id.clone(), date.clone(), *price))
            .collect()
    }

    /// USD price of a coin on a given day (DD-MM-YYYY); NotFound if the
    /// coin id is unknown upstream. Completed days are remembered in the
    /// dated-price map; today's price is still moving and never is.
    pub async fn price_on_date(&self, coin_id: &str, date: &str) -> ClientResult<f64> {
        let key = (coin_id.to_string(), date.to_string());
        if let Some(price) = self.dated_prices.lock().unwrap().get(&key) {
            return Ok(*price);
        }

        let url = format!(
            "{}/coins/{}/history?date={}",
            constants::COINGECKO_API_BASE,
            coin_id,
            date
        );

        let response: HistoryResponse = self.get_with_retry(&url).await?;
        let price = response
            .market_data
            .and_then(|m| m.current_price.get("usd").copied())
            .ok_or_else(|| {
                ClientError::NotFound(format!("no USD price for {coin_id} on {date}"))
            })?;

        if date != crate::dates::coingecko_date_today() {
            self.dated_prices.lock().unwrap().insert(key, price);
        }
        Ok(price)
    }

    /// Current USD price of a coin
    pub async fn current_price(&self, coin_id: &str) -> ClientResult<f64> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            constants::COINGECKO_API_BASE,
            coin_id
        );

        let response: HashMap<String, HashMap<String, f64>> = self.get_with_retry(&url).await?;
        response
            .get(coin_id)
            .and_then(|prices| prices.get("usd").copied())
            .ok_or_else(|| ClientError::NotFound(format!("no current USD price for {coin_id}")))
    }

    /// Resolve a mainnet contract address to a CoinGecko coin id; cached
    /// per client since the mapping never changes
    pub async fn coin_id_of_address(&self, address: Address) -> ClientResult<String> {
        if let Some(id) = self.coin_ids.lock().unwrap().get(&address) {
            return Ok(id.clone());
        }

        let url = format!(
            "{}/coins/{}/contract/{}",
            constants::COINGECKO_API_BASE,
            constants::COINGECKO_PLATFORM,
            address.to_string().to_lowercase()
        );

        let response: ContractResponse = self.get_with_retry(&url).await?;
        self.coin_ids
            .lock()
            .unwrap()
            .insert(address, response.id.clone());
        Ok(response.id)
    }

    /// Price of a token by contract address, at a day or current
    pub async fn price_of_address(
        &self,
        address: Address,
        date: Option<&str>,
    ) -> ClientResult<f64> {
        let coin_id = self.coin_id_of_address(address).await?;
        match date {
            Some(date) => self.price_on_date(&coin_id, date).await,
            None => self.current_price(&coin_id).await,
        }
    }

    /// GET with bounded exponential-backoff retry; 429 is always retried,
    /// 404 maps to NotFound without retrying
    async fn get_with_retry<T: serde::de::DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        let mut last_error = None;

        for attempt in 0..constants::MAX_HTTP_RETRIES {
            if attempt > 0 {
                sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }

            let mut request = self.client.get(url).header("Accept", "application/json");
            if let Some(key) = &self.api_key {
                request = request.header("x-cg-demo-api-key", key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.json::<T>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => {
                                last_error =
                                    Some(ClientError::Upstream(format!("parse error: {e}")));
                            }
                        }
                    } else if status.as_u16() == 404 {
                        return Err(ClientError::NotFound(format!("CoinGecko 404 for {url}")));
                    } else if status.as_u16() == 429 {
                        last_error = Some(ClientError::Upstream("rate limited (429)".to_string()));
                        continue;
                    } else {
                        last_error = Some(ClientError::Upstream(format!(
                            "CoinGecko returned status {status}"
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(ClientError::Upstream(format!("request failed: {e}")));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ClientError::Upstream(format!(
                "failed after {} attempts",
                constants::MAX_HTTP_RETRIES
            ))
        }))
    }
}
