//! Point-in-time balance sampling at a fixed block stride
//!
//! Each sample is one read-only contract call pinned to a historical block;
//! the calls are independent and issued sequentially. Raw integer results
//! are scaled by the token's decimals once fetched.

use alloy::primitives::{Address, U256, utils::format_units};

use crate::addresses;
use crate::chain::{BlockRange, ChainReader};
use crate::error::{ClientError, ClientResult};

/// Exchange rate mantissas on Compound-style markets are scaled by 1e18
const EXCHANGE_RATE_DECIMALS: u8 = 18;

/// One point-in-time balance sample
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub block_number: u64,
    /// Decimal-scaled amount
    pub amount: f64,
    pub holder: Address,
}

/// One point-in-time Liquity stability-pool position, 18-decimal scaled
#[derive(Debug, Clone, PartialEq)]
pub struct StabilitySample {
    pub block_number: u64,
    pub lusd_deposit: f64,
    pub eth_gain: f64,
    pub lqty_gain: f64,
}

/// Scale a raw integer amount by 10^decimals
pub fn scale_amount(raw: U256, decimals: u8) -> f64 {
    format_units(raw, decimals)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

/// Token decimals for a series: registry first, one on-chain read for
/// unknown tokens
pub async fn resolve_decimals<C: ChainReader + ?Sized>(
    chain: &C,
    token: Address,
) -> ClientResult<u8> {
    match addresses::token_by_address(token) {
        Some(info) => Ok(info.decimals),
        None => chain.erc20_decimals(token).await,
    }
}

fn sample_points(range: BlockRange, interval: u64) -> ClientResult<Vec<u64>> {
    if interval == 0 {
        return Err(ClientError::Config(
            "balance sampling interval must be at least one block".to_string(),
        ));
    }
    Ok(range.stride(interval))
}

// =============================================================================
// Samplers
// =============================================================================

/// ERC-20 `balanceOf` time series for one holder.
///
/// Samples run from `range.start` to `range.end` at `interval` blocks;
/// the sample at exactly `range.end` is included when the stride lands on
/// it. Decimals are resolved once before the series, never per sample.
pub async fn fetch_erc20_balances<C: ChainReader + ?Sized>(
    chain: &C,
    token: Address,
    holder: Address,
    interval: u64,
    range: BlockRange,
) -> ClientResult<Vec<Balance>> {
    let decimals = resolve_decimals(chain, token).await?;
    let mut series = Vec::new();

    for block in sample_points(range, interval)? {
        let raw = chain.erc20_balance(token, holder, block).await?;
        series.push(Balance {
            block_number: block,
            amount: scale_amount(raw, decimals),
            holder,
        });
    }

    Ok(series)
}

/// Underlying-asset balance series on a Fuse/Compound-style lending market.
///
/// Underlying balance = cToken balance x exchange rate mantissa / 1e18,
/// then scaled by the underlying token's decimals.
pub async fn fetch_lending_balances<C: ChainReader + ?Sized>(
    chain: &C,
    market: Address,
    holder: Address,
    interval: u64,
    range: BlockRange,
    underlying_decimals: u8,
) -> ClientResult<Vec<Balance>> {
    let mut series = Vec::new();

    for block in sample_points(range, interval)? {
        let snapshot = chain.lending_snapshot(market, holder, block).await?;
        let underlying_raw = snapshot.ctoken_balance * snapshot.exchange_rate
            / U256::from(10u64).pow(U256::from(EXCHANGE_RATE_DECIMALS));

        series.push(Balance {
            block_number: block,
            amount: scale_amount(underlying_raw, underlying_decimals),
            holder,
        });
    }

    Ok(series)
}

/// Liquity stability-pool position series: compounded LUSD deposit plus
/// accrued ETH and LQTY gains, each 18-decimal scaled
pub async fn fetch_stability_samples<C: ChainReader + ?Sized>(
    chain: &C,
    pool: Address,
    holder: Address,
    interval: u64,
    range: BlockRange,
) -> ClientResult<Vec<StabilitySample>> {
    let mut series = Vec::new();

    for block in sample_points(range, interval)? {
        let position = chain.stability_position(pool, holder, block).await?;
        series.push(StabilitySample {
            block_number: block,
            lusd_deposit: scale_amount(position.lusd_deposit, 18),
            eth_gain: scale_amount(position.eth_gain, 18),
            lqty_gain: scale_amount(position.lqty_gain, 18),
        });
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{LendingSnapshot, StabilityPosition};
    use alloy::primitives::address;
    use alloy::rpc::types::Log;
    use async_trait::async_trait;

    const HOLDER: Address = address!("0x0e1177e47151Be72e5992E0975000E73Ab5fd9D4");
    const UNKNOWN_TOKEN: Address = address!("0x9999999999999999999999999999999999999999");

    /// Balance grows by one whole token (18 decimals) per block
    struct LinearChain;

    #[async_trait]
    impl ChainReader for LinearChain {
        async fn latest_block(&self) -> ClientResult<u64> {
            Ok(1_000_000)
        }

        async fn timestamp_of_block(&self, _: u64) -> ClientResult<u64> {
            Ok(0)
        }

        async fn transfer_logs(
            &self,
            _: Address,
            _: BlockRange,
        ) -> ClientResult<Vec<Log>> {
            Ok(Vec::new())
        }

        async fn erc20_decimals(&self, _: Address) -> ClientResult<u8> {
            Ok(18)
        }

        async fn erc20_balance(&self, _: Address, _: Address, block: u64) -> ClientResult<U256> {
            Ok(U256::from(block) * U256::from(10u64).pow(U256::from(18u64)))
        }

        async fn lending_snapshot(
            &self,
            _: Address,
            _: Address,
            block: u64,
        ) -> ClientResult<LendingSnapshot> {
            // 2 cTokens at a 1.5e18 exchange rate = 3 underlying
            let _ = block;
            Ok(LendingSnapshot {
                ctoken_balance: U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64)),
                borrow_balance: U256::ZERO,
                exchange_rate: U256::from(15u64) * U256::from(10u64).pow(U256::from(17u64)),
            })
        }

        async fn stability_position(
            &self,
            _: Address,
            _: Address,
            _: u64,
        ) -> ClientResult<StabilityPosition> {
            Ok(StabilityPosition {
                lusd_deposit: U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)),
                eth_gain: U256::from(5u64) * U256::from(10u64).pow(U256::from(17u64)),
                lqty_gain: U256::from(25u64) * U256::from(10u64).pow(U256::from(17u64)),
            })
        }
    }

    #[tokio::test]
    async fn test_stride_samples_expected_blocks() {
        let range = BlockRange::new(100, 130).unwrap();
        let series = fetch_erc20_balances(&LinearChain, UNKNOWN_TOKEN, HOLDER, 10, range)
            .await
            .unwrap();

        let blocks: Vec<u64> = series.iter().map(|b| b.block_number).collect();
        assert_eq!(blocks, vec![100, 110, 120, 130]);
    }

    #[tokio::test]
    async fn test_balances_are_decimal_scaled() {
        let range = BlockRange::new(100, 120).unwrap();
        let series = fetch_erc20_balances(&LinearChain, UNKNOWN_TOKEN, HOLDER, 10, range)
            .await
            .unwrap();

        // Raw balance is block * 1e18, so the scaled amount equals the block
        assert_eq!(series[0].amount, 100.0);
        assert_eq!(series[1].amount, 110.0);
        assert_eq!(series[2].amount, 120.0);
        assert!(series.iter().all(|b| b.holder == HOLDER));
    }

    #[tokio::test]
    async fn test_zero_interval_is_config_error() {
        let range = BlockRange::new(100, 130).unwrap();
        let result = fetch_erc20_balances(&LinearChain, UNKNOWN_TOKEN, HOLDER, 0, range).await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_registry_decimals_skip_the_chain_read() {
        // OHM is registered with 9 decimals; LinearChain would report 18
        let ohm = crate::addresses::token_by_symbol("OHM").unwrap();
        let decimals = resolve_decimals(&LinearChain, ohm.address).await.unwrap();
        assert_eq!(decimals, 9);

        let unknown = resolve_decimals(&LinearChain, UNKNOWN_TOKEN).await.unwrap();
        assert_eq!(unknown, 18);
    }

    #[tokio::test]
    async fn test_lending_underlying_conversion() {
        let range = BlockRange::new(500, 500).unwrap();
        let series = fetch_lending_balances(&LinearChain, UNKNOWN_TOKEN, HOLDER, 100, range, 18)
            .await
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].amount, 3.0);
    }

    #[tokio::test]
    async fn test_stability_sample_scaling() {
        let range = BlockRange::new(0, 0).unwrap();
        let series = fetch_stability_samples(&LinearChain, UNKNOWN_TOKEN, HOLDER, 1, range)
            .await
            .unwrap();

        assert_eq!(
            series,
            vec![StabilitySample {
                block_number: 0,
                lusd_deposit: 100.0,
                eth_gain: 0.5,
                lqty_gain: 2.5,
            }]
        );
    }

    #[test]
    fn test_scale_amount() {
        assert_eq!(scale_amount(U256::from(1_500_000_000u64), 9), 1.5);
        assert_eq!(scale_amount(U256::ZERO, 18), 0.0);
    }
}
