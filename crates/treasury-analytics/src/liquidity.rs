//! Per-exchange liquidity tables and month-over-month differencing
//!
//! One generic aggregator covers the pair-style exchanges via
//! [`ExchangeDescriptor`]; Balancer V2 joins through its own queries.
//! Month-over-month rows align two snapshots on the pool address,
//! zero-filling pools present in only one month.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::addresses::TokenInfo;
use crate::chain::{ChainReader, block_of_timestamp};
use crate::dates;
use crate::prices::PriceClient;
use crate::subgraph::{
    self, ExchangeDescriptor, GraphClient, PAIR_EXCHANGES, PoolStat, clamp_block_pin,
};

/// One pool's liquidity, in token units and USD
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRow {
    pub address: String,
    pub exchange: String,
    pub symbol: String,
    pub token_amount: f64,
    pub usd_amount: f64,
}

/// Month-over-month comparison of one pool across two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct MomRow {
    pub address: String,
    pub exchange: String,
    pub symbol: String,
    pub token_previous: f64,
    pub token_current: f64,
    pub token_change: f64,
    /// None when the previous value was zero (percent change undefined)
    pub token_change_percent: Option<f64>,
    pub usd_previous: f64,
    pub usd_current: f64,
    pub usd_change: f64,
    pub usd_change_percent: Option<f64>,
}

/// Two aligned snapshots plus the month labels for report columns
#[derive(Debug)]
pub struct MomReport {
    pub previous_label: &'static str,
    pub current_label: &'static str,
    pub rows: Vec<MomRow>,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Day price of a token: the registry's coin id when listed, contract
/// lookup otherwise
pub async fn token_price(
    prices: &PriceClient,
    token: &TokenInfo,
    timestamp: Option<i64>,
) -> Result<f64> {
    let price = match (token.coingecko_id, timestamp) {
        (Some(id), Some(ts)) => prices.price_on_date(id, &dates::coingecko_date(ts)).await,
        (Some(id), None) => prices.current_price(id).await,
        (None, Some(ts)) => {
            prices
                .price_of_address(token.address, Some(&dates::coingecko_date(ts)))
                .await
        }
        (None, None) => prices.price_of_address(token.address, None).await,
    };
    price.with_context(|| format!("failed to price {}", token.symbol))
}

/// Liquidity of every pool holding `token` across all exchanges, at the
/// given timestamp (None = live data). USD column uses the price on the
/// same day.
pub async fn token_liquidity<C: ChainReader + ?Sized>(
    chain: &C,
    graph: &GraphClient,
    prices: &PriceClient,
    token: &TokenInfo,
    timestamp: Option<i64>,
) -> Result<Vec<PoolRow>> {
    let price = token_price(prices, token, timestamp).await?;

    let block = match timestamp {
        Some(ts) => Some(block_of_timestamp(chain, ts as u64).await?),
        None => None,
    };

    let mut rows = Vec::new();
    for desc in PAIR_EXCHANGES {
        let pinned = pin_for(graph, desc, block).await?;
        let pools = subgraph::fetch_pair_liquidity(graph, desc, token.address, pinned)
            .await
            .with_context(|| format!("{} liquidity query failed", desc.label))?;
        rows.extend(pools.into_iter().map(|p| with_usd(p, price)));
    }

    let balancer_pin = match block {
        Some(b) => {
            let head = graph.indexed_head(crate::constants::BALANCER_V2_SUBGRAPH).await?;
            Some(clamp_block_pin(b, head))
        }
        None => None,
    };
    let balancer =
        subgraph::fetch_balancer_liquidity(graph, token.address, token.symbol, balancer_pin)
            .await
            .context("Balancer V2 liquidity query failed")?;
    rows.extend(balancer.into_iter().map(|p| with_usd(p, price)));

    Ok(rows)
}

async fn pin_for(
    graph: &GraphClient,
    desc: &ExchangeDescriptor,
    block: Option<u64>,
) -> Result<Option<u64>> {
    match block {
        Some(b) => {
            let head = graph
                .indexed_head(desc.url)
                .await
                .with_context(|| format!("{} head query failed", desc.label))?;
            Ok(Some(clamp_block_pin(b, head)))
        }
        None => Ok(None),
    }
}

fn with_usd(pool: PoolStat, price: f64) -> PoolRow {
    PoolRow {
        address: pool.address,
        exchange: pool.exchange,
        symbol: pool.symbol,
        token_amount: pool.amount,
        usd_amount: pool.amount * price,
    }
}

// =============================================================================
// Month-over-Month
// =============================================================================

/// Percent change with an undefined (not infinite) result when the
/// previous value was zero
pub fn percent_change(previous: f64, change: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some(change / previous)
    }
}

/// Align two snapshots on the pool address and difference them. Pools
/// missing from one snapshot are treated as zero on that side.
pub fn month_over_month(previous: &[PoolRow], current: &[PoolRow]) -> Vec<MomRow> {
    // BTreeMap keyed by address for a stable row order
    let mut joined: BTreeMap<String, (Option<&PoolRow>, Option<&PoolRow>)> = BTreeMap::new();

    for row in previous {
        joined.entry(row.address.clone()).or_default().0 = Some(row);
    }
    for row in current {
        joined.entry(row.address.clone()).or_default().1 = Some(row);
    }

    joined
        .into_iter()
        .map(|(address, (prev, cur))| {
            let labeled = cur.or(prev);
            let token_previous = prev.map_or(0.0, |r| r.token_amount);
            let token_current = cur.map_or(0.0, |r| r.token_amount);
            let usd_previous = prev.map_or(0.0, |r| r.usd_amount);
            let usd_current = cur.map_or(0.0, |r| r.usd_amount);
            let token_change = token_current - token_previous;
            let usd_change = usd_current - usd_previous;

            MomRow {
                address,
                exchange: labeled.map_or_else(String::new, |r| r.exchange.clone()),
                symbol: labeled.map_or_else(String::new, |r| r.symbol.clone()),
                token_previous,
                token_current,
                token_change,
                token_change_percent: percent_change(token_previous, token_change),
                usd_previous,
                usd_current,
                usd_change,
                usd_change_percent: percent_change(usd_previous, usd_change),
            }
        })
        .collect()
}

/// Liquidity month-over-month for a target month: the snapshot at the
/// month start (= previous month's close) against the snapshot at the
/// month end, or live data when the month is still running.
pub async fn liquidity_mom<C: ChainReader + ?Sized>(
    chain: &C,
    graph: &GraphClient,
    prices: &PriceClient,
    token: &TokenInfo,
    year: i32,
    month: u32,
) -> Result<MomReport> {
    let (start, end) = dates::month_bounds(year, month)?;
    let end = if dates::is_current_month(year, month) {
        None
    } else {
        Some(end)
    };

    let previous = token_liquidity(chain, graph, prices, token, Some(start)).await?;
    let current = token_liquidity(chain, graph, prices, token, end).await?;

    let (_, prev_month) = dates::previous_month(year, month);
    Ok(MomReport {
        previous_label: dates::month_label(prev_month),
        current_label: dates::month_label(month),
        rows: month_over_month(&previous, &current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: &str, token_amount: f64, usd_amount: f64) -> PoolRow {
        PoolRow {
            address: address.to_string(),
            exchange: "UNISWAP_V2".to_string(),
            symbol: "OHM-DAI".to_string(),
            token_amount,
            usd_amount,
        }
    }

    #[test]
    fn test_mom_change_and_percent() {
        let previous = vec![row("0xaaa", 100.0, 1000.0)];
        let current = vec![row("0xaaa", 150.0, 1800.0)];

        let rows = month_over_month(&previous, &current);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].token_change, 50.0);
        assert_eq!(rows[0].token_change_percent, Some(0.5));
        assert_eq!(rows[0].usd_change, 800.0);
        assert_eq!(rows[0].usd_change_percent, Some(0.8));
    }

    #[test]
    fn test_mom_zero_previous_is_flagged_undefined() {
        let previous = vec![row("0xaaa", 0.0, 0.0)];
        let current = vec![row("0xaaa", 150.0, 1800.0)];

        let rows = month_over_month(&previous, &current);
        assert_eq!(rows[0].token_change, 150.0);
        assert_eq!(rows[0].token_change_percent, None);
        assert_eq!(rows[0].usd_change_percent, None);
    }

    #[test]
    fn test_mom_zero_fills_missing_rows() {
        let previous = vec![row("0xaaa", 100.0, 1000.0)];
        let current = vec![row("0xbbb", 40.0, 400.0)];

        let rows = month_over_month(&previous, &current);
        assert_eq!(rows.len(), 2);

        // New pool: previous side zero-filled
        let added = rows.iter().find(|r| r.address == "0xbbb").unwrap();
        assert_eq!(added.token_previous, 0.0);
        assert_eq!(added.token_change, 40.0);
        assert_eq!(added.token_change_percent, None);
        assert_eq!(added.symbol, "OHM-DAI");

        // Drained pool: current side zero-filled
        let removed = rows.iter().find(|r| r.address == "0xaaa").unwrap();
        assert_eq!(removed.token_current, 0.0);
        assert_eq!(removed.token_change, -100.0);
        assert_eq!(removed.token_change_percent, Some(-1.0));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(100.0, 50.0), Some(0.5));
        assert_eq!(percent_change(0.0, 50.0), None);
        assert_eq!(percent_change(200.0, -100.0), Some(-0.5));
    }
}
