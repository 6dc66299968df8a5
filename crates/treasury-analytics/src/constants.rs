//! Centralized constants for the treasury analytics tool
//!
//! This module contains universal constants for Ethereum mainnet and the
//! external APIs. Treasury-specific configuration (wallets, API keys) is
//! loaded from config.toml.

// =============================================================================
// API Endpoints
// =============================================================================

/// Alchemy mainnet RPC base URL (append API key)
pub const ALCHEMY_RPC_BASE: &str = "https://eth-mainnet.g.alchemy.com/v2/";

/// Etherscan API base URL
pub const ETHERSCAN_API_BASE: &str = "https://api.etherscan.io/api";

/// CoinGecko API base URL
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko platform name for Ethereum mainnet contract lookups
pub const COINGECKO_PLATFORM: &str = "ethereum";

/// Uniswap V2 subgraph
pub const UNISWAP_V2_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v2";

/// Uniswap V3 subgraph
pub const UNISWAP_V3_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v3";

/// Sushiswap exchange subgraph
pub const SUSHISWAP_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/sushiswap/exchange";

/// Balancer V2 subgraph
pub const BALANCER_V2_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/balancer-labs/balancer-v2";

// =============================================================================
// Ethereum Network Constants
// =============================================================================

/// Assumed average block time in seconds, used by the block/timestamp search.
/// The search tolerates this being off by a second or two; it is a damping
/// constant, not a chain parameter.
pub const AVERAGE_BLOCK_TIME_SECS: u64 = 15;

/// Maximum block span per eth_getLogs query (provider-side limit)
pub const LOG_WINDOW_BLOCKS: u64 = 2000;

/// Step budget for the block/timestamp search before declaring divergence
pub const MAX_SEARCH_STEPS: u32 = 100;

/// Blocks subtracted from a pinned block that is ahead of the subgraph's
/// indexed head (graph-node indexing delay)
pub const GRAPH_HEAD_LAG_BLOCKS: u64 = 5;

// =============================================================================
// File Names
// =============================================================================

/// Cache database filename
pub const CACHE_FILENAME: &str = "cache.sqlite";

/// Liquidity month-over-month report filename
pub const LIQUIDITY_MOM_FILENAME: &str = "liquidity_mom.csv";

/// Volume month-over-month report filename
pub const VOLUME_MOM_FILENAME: &str = "volume_mom.csv";

/// LP deposit history report filename
pub const DEPOSITS_FILENAME: &str = "lp_deposits.csv";

// =============================================================================
// HTTP Behavior
// =============================================================================

/// Retry attempts for the price and graph APIs
pub const MAX_HTTP_RETRIES: u32 = 3;

/// Request timeout for all HTTP clients (seconds)
pub const HTTP_TIMEOUT_SECS: u64 = 30;
