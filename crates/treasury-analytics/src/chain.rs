//! Ethereum chain access
//!
//! The [`ChainReader`] trait is the seam between the analytics code and the
//! RPC node: production uses the alloy-backed [`EthClient`], tests substitute
//! in-memory fakes. The block/timestamp search lives here too since it is
//! pure chain arithmetic.

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;

use crate::constants;
use crate::error::{ClientError, ClientResult};

// =============================================================================
// Contract Interfaces
// =============================================================================

sol! {
    #[sol(rpc)]
    interface Erc20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    interface FuseToken {
        function getAccountSnapshot(address account)
            external
            view
            returns (uint256, uint256, uint256, uint256);
    }

    #[sol(rpc)]
    interface StabilityPool {
        function getCompoundedLUSDDeposit(address depositor) external view returns (uint256);
        function getDepositorETHGain(address depositor) external view returns (uint256);
        function getDepositorLQTYGain(address depositor) external view returns (uint256);
    }
}

// =============================================================================
// Block Ranges
// =============================================================================

/// Inclusive interval of block numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

// A range always holds at least one block (`new` rejects inverted
// bounds), so there is no `is_empty`.
#[allow(clippy::len_without_is_empty)]
impl BlockRange {
    pub fn new(start: u64, end: u64) -> ClientResult<Self> {
        if start > end {
            return Err(ClientError::Config(format!(
                "invalid block range: start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Split into consecutive non-overlapping windows of at most `size`
    /// blocks. The windows cover the range exactly: the final window is
    /// clamped to `end`, and each window starts one past the previous
    /// window's end.
    pub fn windows(self, size: u64) -> Vec<BlockRange> {
        if size == 0 {
            return vec![self];
        }

        let mut windows = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let window_end = (cursor + size - 1).min(self.end);
            windows.push(BlockRange {
                start: cursor,
                end: window_end,
            });
            cursor = window_end + 1;
        }
        windows
    }

    /// Block numbers at a fixed stride from `start`, inclusive of `end`
    /// when the stride lands on it exactly
    pub fn stride(self, interval: u64) -> Vec<u64> {
        if interval == 0 {
            return Vec::new();
        }

        let mut points = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            points.push(cursor);
            match cursor.checked_add(interval) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        points
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

// =============================================================================
// Chain Reader
// =============================================================================

/// Raw account state of a Fuse/Compound-style lending market
#[derive(Debug, Clone, Copy)]
pub struct LendingSnapshot {
    /// cToken balance held by the account
    pub ctoken_balance: U256,
    /// Outstanding borrow balance (underlying units)
    pub borrow_balance: U256,
    /// Exchange rate mantissa, scaled by 1e18
    pub exchange_rate: U256,
}

/// Raw depositor state of the Liquity stability pool
#[derive(Debug, Clone, Copy)]
pub struct StabilityPosition {
    pub lusd_deposit: U256,
    pub eth_gain: U256,
    pub lqty_gain: U256,
}

/// Read-only chain access used by the paginator, samplers and time index
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current head block number
    async fn latest_block(&self) -> ClientResult<u64>;

    /// Timestamp recorded in a block's header; NotFound if the provider
    /// does not know the block
    async fn timestamp_of_block(&self, block_number: u64) -> ClientResult<u64>;

    /// All ERC-20 Transfer logs emitted by `token` in `range`, in the
    /// provider's (block-ascending) order
    async fn transfer_logs(&self, token: Address, range: BlockRange) -> ClientResult<Vec<Log>>;

    /// ERC-20 decimals, read once per series
    async fn erc20_decimals(&self, token: Address) -> ClientResult<u8>;

    /// ERC-20 balance of `holder`, pinned to a historical block
    async fn erc20_balance(
        &self,
        token: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<U256>;

    /// Lending-market account snapshot, pinned to a historical block
    async fn lending_snapshot(
        &self,
        market: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<LendingSnapshot>;

    /// Stability-pool depositor state, pinned to a historical block
    async fn stability_position(
        &self,
        pool: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<StabilityPosition>;
}

// =============================================================================
// Block/Time Index
// =============================================================================

/// Approximate the highest block whose timestamp does not exceed
/// `target_timestamp`.
///
/// Damped linear-interpolation search from the current head: step backward
/// by `(candidate_timestamp - target) / AVERAGE_BLOCK_TIME_SECS` blocks
/// until the estimated step is under one block. The result is within a
/// block or two of exact. The search re-reads the head on every call, so
/// results are not cached anywhere.
pub async fn block_of_timestamp<C: ChainReader + ?Sized>(
    chain: &C,
    target_timestamp: u64,
) -> ClientResult<u64> {
    let mut block_number = chain.latest_block().await?;
    let mut timestamp = chain.timestamp_of_block(block_number).await?;
    let mut steps = 0u32;

    while timestamp > target_timestamp {
        let decrease = (timestamp - target_timestamp) / constants::AVERAGE_BLOCK_TIME_SECS;
        if decrease < 1 {
            break;
        }

        steps += 1;
        if steps > constants::MAX_SEARCH_STEPS {
            return Err(ClientError::Config(format!(
                "block search for timestamp {target_timestamp} did not converge \
                 within {} steps; check AVERAGE_BLOCK_TIME_SECS",
                constants::MAX_SEARCH_STEPS
            )));
        }

        block_number = block_number.saturating_sub(decrease);
        timestamp = chain.timestamp_of_block(block_number).await?;
    }

    Ok(block_number)
}

// =============================================================================
// Alloy-backed Client
// =============================================================================

/// HTTP provider with alloy's recommended fillers
pub type HttpProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

/// JSON-RPC chain client
pub struct EthClient {
    provider: HttpProvider,
}

impl EthClient {
    pub fn new(rpc_url: &str) -> ClientResult<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid RPC URL: {e}")))?;
        Ok(Self {
            provider: ProviderBuilder::new().connect_http(url),
        })
    }
}

#[async_trait]
impl ChainReader for EthClient {
    async fn latest_block(&self) -> ClientResult<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn timestamp_of_block(&self, block_number: u64) -> ClientResult<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("block {block_number}")))?;
        Ok(block.header.timestamp)
    }

    async fn transfer_logs(&self, token: Address, range: BlockRange) -> ClientResult<Vec<Log>> {
        let filter = Filter::new()
            .address(token)
            .event_signature(Erc20::Transfer::SIGNATURE_HASH)
            .from_block(BlockNumberOrTag::Number(range.start))
            .to_block(BlockNumberOrTag::Number(range.end));

        Ok(self.provider.get_logs(&filter).await?)
    }

    async fn erc20_decimals(&self, token: Address) -> ClientResult<u8> {
        let erc20 = Erc20::new(token, &self.provider);
        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| ClientError::Upstream(format!("decimals() on {token}: {e}")))
    }

    async fn erc20_balance(
        &self,
        token: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<U256> {
        let erc20 = Erc20::new(token, &self.provider);
        erc20
            .balanceOf(holder)
            .block(BlockId::number(block))
            .call()
            .await
            .map_err(|e| {
                ClientError::Upstream(format!("balanceOf({holder}) on {token} at {block}: {e}"))
            })
    }

    async fn lending_snapshot(
        &self,
        market: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<LendingSnapshot> {
        let ftoken = FuseToken::new(market, &self.provider);
        let snapshot = ftoken
            .getAccountSnapshot(holder)
            .block(BlockId::number(block))
            .call()
            .await
            .map_err(|e| {
                ClientError::Upstream(format!("getAccountSnapshot on {market} at {block}: {e}"))
            })?;

        // First return value is a Compound-style error code
        if snapshot._0 != U256::ZERO {
            return Err(ClientError::Upstream(format!(
                "getAccountSnapshot on {market} returned error code {}",
                snapshot._0
            )));
        }

        Ok(LendingSnapshot {
            ctoken_balance: snapshot._1,
            borrow_balance: snapshot._2,
            exchange_rate: snapshot._3,
        })
    }

    async fn stability_position(
        &self,
        pool: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<StabilityPosition> {
        let stability_pool = StabilityPool::new(pool, &self.provider);
        let at = BlockId::number(block);

        let lusd_deposit = stability_pool
            .getCompoundedLUSDDeposit(holder)
            .block(at)
            .call()
            .await
            .map_err(|e| ClientError::Upstream(format!("getCompoundedLUSDDeposit at {block}: {e}")))?;
        let eth_gain = stability_pool
            .getDepositorETHGain(holder)
            .block(at)
            .call()
            .await
            .map_err(|e| ClientError::Upstream(format!("getDepositorETHGain at {block}: {e}")))?;
        let lqty_gain = stability_pool
            .getDepositorLQTYGain(holder)
            .block(at)
            .call()
            .await
            .map_err(|e| ClientError::Upstream(format!("getDepositorLQTYGain at {block}: {e}")))?;

        Ok(StabilityPosition {
            lusd_deposit,
            eth_gain,
            lqty_gain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fake chain with blocks spaced 13 seconds apart, deliberately off
    /// from the 15-second search constant
    struct FakeChain {
        head: u64,
        genesis_timestamp: u64,
        block_time: u64,
    }

    impl FakeChain {
        fn timestamp(&self, block: u64) -> u64 {
            self.genesis_timestamp + block * self.block_time
        }
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn latest_block(&self) -> ClientResult<u64> {
            Ok(self.head)
        }

        async fn timestamp_of_block(&self, block_number: u64) -> ClientResult<u64> {
            if block_number > self.head {
                return Err(ClientError::NotFound(format!("block {block_number}")));
            }
            Ok(self.timestamp(block_number))
        }

        async fn transfer_logs(&self, _: Address, _: BlockRange) -> ClientResult<Vec<Log>> {
            Ok(Vec::new())
        }

        async fn erc20_decimals(&self, _: Address) -> ClientResult<u8> {
            Ok(18)
        }

        async fn erc20_balance(&self, _: Address, _: Address, _: u64) -> ClientResult<U256> {
            Ok(U256::ZERO)
        }

        async fn lending_snapshot(
            &self,
            _: Address,
            _: Address,
            _: u64,
        ) -> ClientResult<LendingSnapshot> {
            Err(ClientError::NotFound("no lending market".to_string()))
        }

        async fn stability_position(
            &self,
            _: Address,
            _: Address,
            _: u64,
        ) -> ClientResult<StabilityPosition> {
            Err(ClientError::NotFound("no stability pool".to_string()))
        }
    }

    /// Chain whose timestamps never descend below a floor, so the search
    /// can never reach an old-enough target
    struct StuckChain;

    #[async_trait]
    impl ChainReader for StuckChain {
        async fn latest_block(&self) -> ClientResult<u64> {
            Ok(1_000_000)
        }

        async fn timestamp_of_block(&self, _: u64) -> ClientResult<u64> {
            Ok(5_000_000)
        }

        async fn transfer_logs(&self, _: Address, _: BlockRange) -> ClientResult<Vec<Log>> {
            Ok(Vec::new())
        }

        async fn erc20_decimals(&self, _: Address) -> ClientResult<u8> {
            Ok(18)
        }

        async fn erc20_balance(&self, _: Address, _: Address, _: u64) -> ClientResult<U256> {
            Ok(U256::ZERO)
        }

        async fn lending_snapshot(
            &self,
            _: Address,
            _: Address,
            _: u64,
        ) -> ClientResult<LendingSnapshot> {
            Err(ClientError::NotFound("no lending market".to_string()))
        }

        async fn stability_position(
            &self,
            _: Address,
            _: Address,
            _: u64,
        ) -> ClientResult<StabilityPosition> {
            Err(ClientError::NotFound("no stability pool".to_string()))
        }
    }

    #[test]
    fn test_windows_cover_range_exactly() {
        let range = BlockRange::new(100, 5300).unwrap();
        let windows = range.windows(2000);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], BlockRange { start: 100, end: 2099 });
        assert_eq!(windows[1], BlockRange { start: 2100, end: 4099 });
        assert_eq!(windows[2], BlockRange { start: 4100, end: 5300 });

        // No gap and no overlap at the seams, full coverage
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        assert_eq!(windows.first().unwrap().start, range.start);
        assert_eq!(windows.last().unwrap().end, range.end);
        let covered: u64 = windows.iter().map(|w| w.len()).sum();
        assert_eq!(covered, range.len());
    }

    #[test]
    fn test_windows_exact_multiple() {
        let range = BlockRange::new(0, 3999).unwrap();
        let windows = range.windows(2000);
        assert_eq!(
            windows,
            vec![
                BlockRange { start: 0, end: 1999 },
                BlockRange { start: 2000, end: 3999 },
            ]
        );
    }

    #[test]
    fn test_small_range_is_one_window() {
        let range = BlockRange::new(500, 900).unwrap();
        assert_eq!(range.windows(2000), vec![range]);

        let single = BlockRange::new(7, 7).unwrap();
        assert_eq!(single.windows(2000), vec![single]);
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(BlockRange::new(10, 9).is_err());
        assert!(BlockRange::new(10, 10).is_ok());
    }

    #[test]
    fn test_stride_includes_inclusive_end() {
        let range = BlockRange::new(100, 130).unwrap();
        assert_eq!(range.stride(10), vec![100, 110, 120, 130]);
    }

    #[test]
    fn test_stride_skips_point_past_end() {
        let range = BlockRange::new(100, 129).unwrap();
        assert_eq!(range.stride(10), vec![100, 110, 120]);
    }

    #[tokio::test]
    async fn test_block_of_timestamp_close_to_exact() {
        let chain = FakeChain {
            head: 200_000,
            genesis_timestamp: 1_600_000_000,
            block_time: 13,
        };

        // Pick a few known blocks and ask for their exact timestamps
        for target_block in [123_456u64, 42, 199_999, 1_000] {
            let target = chain.timestamp(target_block);
            let found = block_of_timestamp(&chain, target).await.unwrap();
            let diff = found.abs_diff(target_block);
            assert!(
                diff <= 2,
                "block {target_block}: got {found} (off by {diff})"
            );
        }
    }

    #[tokio::test]
    async fn test_block_of_timestamp_future_returns_head() {
        let chain = FakeChain {
            head: 1_000,
            genesis_timestamp: 1_600_000_000,
            block_time: 13,
        };
        let far_future = chain.timestamp(1_000) + 1_000_000;
        assert_eq!(block_of_timestamp(&chain, far_future).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn test_block_of_timestamp_divergence_is_config_error() {
        let result = block_of_timestamp(&StuckChain, 1_000).await;
        match result {
            Err(ClientError::Config(_)) => {}
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_fake_chain_timestamps_monotonic() {
        // Sanity-check the fixture itself
        let chain = FakeChain {
            head: 100,
            genesis_timestamp: 1_600_000_000,
            block_time: 13,
        };
        let mut seen = HashMap::new();
        for b in 0..=100u64 {
            seen.insert(b, chain.timestamp(b));
        }
        for b in 1..=100u64 {
            assert!(seen[&b] > seen[&(b - 1)]);
        }
    }
}
