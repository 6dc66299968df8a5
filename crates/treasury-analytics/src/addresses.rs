//! Known mainnet addresses for the Olympus treasury
//!
//! Token descriptors and labels for the treasury's allocator contracts.
//! These are reference data compiled into the binary; the treasury's own
//! wallets come from config.toml.

use alloy::primitives::{Address, address};
use std::collections::HashMap;
use std::sync::LazyLock;

// =============================================================================
// Token Registry
// =============================================================================

/// Read-only descriptor for a token the tool knows about
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
    /// Block the contract was deployed at; default start for transfer scans
    pub deploy_block: u64,
    /// CoinGecko coin id, where the token has a listing
    pub coingecko_id: Option<&'static str>,
}

/// Tokens tracked by the treasury reports
pub static TOKENS: &[TokenInfo] = &[
    TokenInfo {
        symbol: "OHM",
        address: address!("0x64aa3364F17a4D01c6f1751Fd97C2BD3D7e7f1D5"),
        decimals: 9,
        deploy_block: 13782589,
        coingecko_id: Some("olympus"),
    },
    TokenInfo {
        symbol: "sOHM",
        address: address!("0x04906695D6D12CF5459975d7C3C03356E4Ccd460"),
        decimals: 9,
        deploy_block: 12622596,
        coingecko_id: None,
    },
    TokenInfo {
        symbol: "gOHM",
        address: address!("0x0ab87046fBb341D058F17CBC4c1133F25a20a52f"),
        decimals: 18,
        deploy_block: 13674957,
        coingecko_id: Some("governance-ohm"),
    },
    TokenInfo {
        symbol: "DAI",
        address: address!("0x6B175474E89094C44Da98b954EedeAC495271d0F"),
        decimals: 18,
        deploy_block: 8928158,
        coingecko_id: Some("dai"),
    },
    TokenInfo {
        symbol: "aDAI",
        address: address!("0x028171bCA77440897B824Ca71D1c56caC55b68A3"),
        decimals: 18,
        deploy_block: 11360000,
        coingecko_id: Some("aave-dai"),
    },
    TokenInfo {
        symbol: "LUSD",
        address: address!("0x5f98805A4E8be255a32880FDeC7F6728C6568bA0"),
        decimals: 18,
        deploy_block: 12178000,
        coingecko_id: Some("liquity-usd"),
    },
];

/// Look up a token by symbol (case-insensitive)
pub fn token_by_symbol(symbol: &str) -> Option<&'static TokenInfo> {
    TOKENS
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// Look up a token by contract address
pub fn token_by_address(address: Address) -> Option<&'static TokenInfo> {
    TOKENS.iter().find(|t| t.address == address)
}

// =============================================================================
// Treasury Contract Addresses
// =============================================================================

pub const AAVE_ALLOCATOR_V1: Address = address!("0x0e1177e47151Be72e5992E0975000E73Ab5fd9D4");
pub const AAVE_ALLOCATOR_V2: Address = address!("0x0D33c811D0fcC711BcB388DFB3a152DE445bE66F");
pub const CVX_ALLOCATOR_V1: Address = address!("0xdFC95aaf0a107DaAe2b350458DED4b7906E7f728");
pub const CVX_ALLOCATOR_V2: Address = address!("0x2d643Df5De4e9Ba063760d475BEAa62821c71681");
pub const FRAX_ALLOCATOR_V1: Address = address!("0xde7b85f52577B113181921A7aa8Fc0C22e309475");
pub const LIQUITY_ALLOCATOR_V1: Address = address!("0x97b3Ef4C558Ec456D59Cb95c65BFB79046E31fCA");
pub const RARI_ALLOCATOR_V1: Address = address!("0x061C8610A784b8A1599De5B1157631e35180d818");

/// Liquity stability pool (LUSD deposits plus ETH/LQTY gains)
pub const LIQUITY_STABILITY_POOL: Address = address!("0x66017D22b0f8556afDd19FC67041899Eb65a21bb");

/// Rari Fuse "Pool Party" fDAI market
pub const RARI_POOL_PARTY_DAI: Address = address!("0x8E4E0257A4759559B4B1AC087fe8d80c63f20D19");

/// Rari Fuse fTRIBE market
pub const RARI_FTRIBE: Address = address!("0xFd3300A9a74b3250F1b2AbC12B47611171910b07");

/// All allocator contracts, for transfer allow-list filtering
pub static ALLOCATORS: &[Address] = &[
    AAVE_ALLOCATOR_V1,
    AAVE_ALLOCATOR_V2,
    CVX_ALLOCATOR_V1,
    CVX_ALLOCATOR_V2,
    FRAX_ALLOCATOR_V1,
    LIQUITY_ALLOCATOR_V1,
    RARI_ALLOCATOR_V1,
];

/// The allocators holding aDAI, for the balance sweep
pub fn aave_allocators() -> Vec<Address> {
    vec![AAVE_ALLOCATOR_V1, AAVE_ALLOCATOR_V2]
}

// =============================================================================
// Address Labels
// =============================================================================

/// Address category for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum AddressCategory {
    /// Treasury allocator contract (deploys reserves into a protocol)
    Allocator,
    /// Liquity stability pool
    StabilityPool,
    /// Lending market (Fuse/Compound-style)
    LendingMarket,
    /// Token tracked by the registry above
    Token,
    /// Unknown address
    Unknown,
}

/// Label information for an address
#[derive(Debug, Clone)]
pub struct AddressLabel {
    pub category: AddressCategory,
    pub name: String,
}

/// Static map of known addresses
/// Sources: Etherscan labels and the Olympus allocator registry
pub static KNOWN_ADDRESSES: LazyLock<HashMap<Address, AddressLabel>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    add_address(&mut map, AAVE_ALLOCATOR_V1, AddressCategory::Allocator, "Aave Allocator V1");
    add_address(&mut map, AAVE_ALLOCATOR_V2, AddressCategory::Allocator, "Aave Allocator V2");
    add_address(&mut map, CVX_ALLOCATOR_V1, AddressCategory::Allocator, "Convex Allocator V1");
    add_address(&mut map, CVX_ALLOCATOR_V2, AddressCategory::Allocator, "Convex Allocator V2");
    add_address(&mut map, FRAX_ALLOCATOR_V1, AddressCategory::Allocator, "Frax Allocator V1");
    add_address(&mut map, LIQUITY_ALLOCATOR_V1, AddressCategory::Allocator, "Liquity Allocator V1");
    add_address(&mut map, RARI_ALLOCATOR_V1, AddressCategory::Allocator, "Rari Allocator V1");
    add_address(
        &mut map,
        LIQUITY_STABILITY_POOL,
        AddressCategory::StabilityPool,
        "Liquity Stability Pool",
    );
    add_address(
        &mut map,
        RARI_POOL_PARTY_DAI,
        AddressCategory::LendingMarket,
        "Rari Pool Party fDAI",
    );
    add_address(&mut map, RARI_FTRIBE, AddressCategory::LendingMarket, "Rari fTRIBE");

    for token in TOKENS {
        add_address(&mut map, token.address, AddressCategory::Token, token.symbol);
    }

    map
});

/// Helper to add an address to the map
fn add_address(
    map: &mut HashMap<Address, AddressLabel>,
    address: Address,
    category: AddressCategory,
    name: &str,
) {
    map.insert(
        address,
        AddressLabel {
            category,
            name: name.to_string(),
        },
    );
}

/// Get label for an address, or a shortened form of the address itself
pub fn get_label(address: &Address) -> AddressLabel {
    KNOWN_ADDRESSES
        .get(address)
        .cloned()
        .unwrap_or_else(|| AddressLabel {
            category: AddressCategory::Unknown,
            name: shorten(address),
        })
}

/// Render an address as "0x1234...abcd"
pub fn shorten(address: &Address) -> String {
    let s = address.to_string();
    format!("{}...{}", &s[..6], &s[38..])
}
