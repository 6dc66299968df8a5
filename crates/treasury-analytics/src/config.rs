//! Configuration for the treasury analytics tool

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::constants;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub treasury: TreasuryConfig,
    pub api_keys: ApiKeys,
}

/// Treasury-specific configuration
#[derive(Debug, Deserialize)]
pub struct TreasuryConfig {
    /// Treasury wallet addresses (LP deposit scans, transfer labeling)
    pub wallets: Vec<String>,
}

/// API keys section
#[derive(Debug, Deserialize)]
pub struct ApiKeys {
    pub alchemy: String,
    pub etherscan: String,
    /// CoinGecko demo key; the public API works without one at a lower
    /// rate limit
    #[serde(default)]
    pub coingecko: Option<String>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Missing required fields (treasury.wallets, api_keys.alchemy, etc.)\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (strings vs numbers)\n\n\
             See config.toml.example for the expected format."
        })
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Main configuration struct with parsed values
pub struct Config {
    /// Treasury wallet addresses
    pub treasury_wallets: Vec<Address>,
    /// RPC URL
    pub rpc_url: String,
    /// Etherscan API key
    pub etherscan_api_key: String,
    /// CoinGecko API key (optional)
    pub coingecko_api_key: Option<String>,
}

impl Config {
    /// Create config from file config and optional RPC URL override
    pub fn from_file(file_config: &FileConfig, rpc_url: Option<String>) -> Result<Self> {
        let treasury_wallets = file_config
            .treasury
            .wallets
            .iter()
            .map(|w| {
                Address::from_str(w).with_context(|| format!("Invalid treasury wallet address: {}", w))
            })
            .collect::<Result<Vec<_>>>()?;

        if treasury_wallets.is_empty() {
            anyhow::bail!("config.toml must list at least one treasury wallet");
        }

        Ok(Self {
            treasury_wallets,

            // Alchemy RPC endpoint (has full archive data)
            rpc_url: rpc_url.unwrap_or_else(|| {
                format!("{}{}", constants::ALCHEMY_RPC_BASE, &file_config.api_keys.alchemy)
            }),

            etherscan_api_key: file_config.api_keys.etherscan.clone(),

            coingecko_api_key: file_config.api_keys.coingecko.clone(),
        })
    }
}
