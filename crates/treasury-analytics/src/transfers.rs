//! ERC-20 transfer history: windowed log pagination and decoding
//!
//! Providers cap the block span of a single `eth_getLogs` call, so ranges
//! wider than [`constants::LOG_WINDOW_BLOCKS`] are split into consecutive
//! windows queried one at a time. A failure in any window aborts the whole
//! fetch; partial results are never returned.

use alloy::primitives::{Address, I256, U256};
use alloy::rpc::types::Log;
use std::collections::HashMap;

use crate::chain::{BlockRange, ChainReader, Erc20};
use crate::constants;
use crate::error::ClientResult;

/// One decoded ERC-20 Transfer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub block_number: u64,
    /// Position within the block, to keep ordering stable across refetches
    pub log_index: u64,
    /// Raw token units (unscaled)
    pub amount: U256,
    pub sender: Address,
    pub recipient: Address,
}

/// Net token position of one address after folding a transfer history
#[derive(Debug, Clone, PartialEq)]
pub struct HolderBalance {
    pub address: Address,
    /// Decimal-scaled balance; negative only for minting addresses
    pub balance: f64,
}

// =============================================================================
// Log Pagination
// =============================================================================

/// Fetch every Transfer emitted by `token` in `range`, block-ascending.
///
/// The range is covered by consecutive non-overlapping windows; the provider
/// returns each window in ascending block order and the windows are queried
/// in ascending order, so no sort is needed afterwards.
pub async fn fetch_token_transfers<C: ChainReader + ?Sized>(
    chain: &C,
    token: Address,
    range: BlockRange,
) -> ClientResult<Vec<Transfer>> {
    let mut transfers = Vec::new();

    for window in range.windows(constants::LOG_WINDOW_BLOCKS) {
        let logs = chain.transfer_logs(token, window).await?;
        let decoded = logs.iter().filter_map(decode_transfer);
        let before = transfers.len();
        transfers.extend(decoded);

        println!(
            "    blocks {}-{}: {} transfers",
            window.start,
            window.end,
            transfers.len() - before
        );
    }

    Ok(transfers)
}

/// Decode one log entry into a [`Transfer`].
///
/// Returns None for logs that do not match the three-topic ERC-20 Transfer
/// shape, or that lack a block number (pending logs).
pub fn decode_transfer(log: &Log) -> Option<Transfer> {
    let event = log.log_decode::<Erc20::Transfer>().ok()?;
    Some(Transfer {
        block_number: log.block_number?,
        log_index: log.log_index.unwrap_or(0),
        amount: event.inner.value,
        sender: event.inner.from,
        recipient: event.inner.to,
    })
}

/// Merge freshly fetched transfers into a cached set, dropping duplicates
/// and restoring `(block_number, log_index)` order
pub fn merge_transfers(cached: Vec<Transfer>, fresh: Vec<Transfer>) -> Vec<Transfer> {
    let mut merged = cached;
    let mut seen: std::collections::HashSet<(u64, u64)> = merged
        .iter()
        .map(|t| (t.block_number, t.log_index))
        .collect();

    for transfer in fresh {
        if seen.insert((transfer.block_number, transfer.log_index)) {
            merged.push(transfer);
        }
    }

    merged.sort_by_key(|t| (t.block_number, t.log_index));
    merged
}

// =============================================================================
// Reshaping
// =============================================================================

/// Fold a transfer history into net balances per address.
///
/// Every transfer debits the sender and credits the recipient; the zero
/// address (mints/burns) accumulates the negated total supply.
pub fn holder_balances(transfers: &[Transfer], decimals: u8) -> Vec<HolderBalance> {
    let mut net: HashMap<Address, I256> = HashMap::new();

    for transfer in transfers {
        let amount = I256::from_raw(transfer.amount);
        *net.entry(transfer.sender).or_default() -= amount;
        *net.entry(transfer.recipient).or_default() += amount;
    }

    let mut balances: Vec<HolderBalance> = net
        .into_iter()
        .map(|(address, raw)| HolderBalance {
            address,
            balance: scale_signed(raw, decimals),
        })
        .collect();

    balances.sort_by(|a, b| b.balance.total_cmp(&a.balance));
    balances
}

/// Restrict a transfer set to rows touching any address in the allow-list
pub fn filter_by_addresses(transfers: &[Transfer], allowed: &[Address]) -> Vec<Transfer> {
    transfers
        .iter()
        .filter(|t| allowed.contains(&t.sender) || allowed.contains(&t.recipient))
        .cloned()
        .collect()
}

/// Scale a signed raw amount by 10^decimals
fn scale_signed(raw: I256, decimals: u8) -> f64 {
    let negative = raw.is_negative();
    let magnitude = crate::balances::scale_amount(raw.unsigned_abs(), decimals);
    if negative { -magnitude } else { magnitude }
}
