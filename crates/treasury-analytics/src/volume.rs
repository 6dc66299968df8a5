//! Per-exchange trade volume over a period and month-over-month tables
//!
//! Volume comes from daily-aggregate entities on the pair-style exchanges
//! and from swap events on Balancer V2, summed over the report period.
//! USD conversion uses the day price at each period's close.

use anyhow::{Context, Result};

use crate::addresses::TokenInfo;
use crate::dates;
use crate::liquidity::{self, MomReport, PoolRow};
use crate::prices::PriceClient;
use crate::subgraph::{self, GraphClient, PAIR_EXCHANGES, PoolStat};

/// Volume of `token` per pool across all exchanges, summed over
/// `[start_ts, end_ts)` (None end = up to now), in token units
pub async fn token_volume(
    graph: &GraphClient,
    token: &TokenInfo,
    start_ts: i64,
    end_ts: Option<i64>,
) -> Result<Vec<PoolStat>> {
    let mut pools = Vec::new();

    for desc in PAIR_EXCHANGES {
        let stats = subgraph::fetch_pair_volume(graph, desc, token.address, start_ts, end_ts)
            .await
            .with_context(|| format!("{} volume query failed", desc.label))?;
        pools.extend(stats);
    }

    let balancer =
        subgraph::fetch_balancer_volume(graph, token.address, token.symbol, start_ts, end_ts)
            .await
            .context("Balancer V2 volume query failed")?;
    pools.extend(balancer);

    Ok(pools)
}

/// Volume month-over-month for a target month: the previous month's total
/// against the target month's total, each converted to USD at its own
/// period-close day price.
pub async fn volume_mom(
    graph: &GraphClient,
    prices: &PriceClient,
    token: &TokenInfo,
    year: i32,
    month: u32,
) -> Result<MomReport> {
    let (prev_year, prev_month) = dates::previous_month(year, month);
    let (prev_start, prev_end) = dates::month_bounds(prev_year, prev_month)?;
    let (start, end) = dates::month_bounds(year, month)?;
    let end = if dates::is_current_month(year, month) {
        None
    } else {
        Some(end)
    };

    let prev_price = liquidity::token_price(prices, token, Some(prev_end)).await?;
    let cur_price = liquidity::token_price(prices, token, end).await?;

    let previous = token_volume(graph, token, prev_start, Some(prev_end)).await?;
    let current = token_volume(graph, token, start, end).await?;

    let previous = with_usd(previous, prev_price);
    let current = with_usd(current, cur_price);

    Ok(MomReport {
        previous_label: dates::month_label(prev_month),
        current_label: dates::month_label(month),
        rows: liquidity::month_over_month(&previous, &current),
    })
}

fn with_usd(pools: Vec<PoolStat>, price: f64) -> Vec<PoolRow> {
    pools
        .into_iter()
        .map(|p| PoolRow {
            address: p.address,
            exchange: p.exchange,
            symbol: p.symbol,
            token_amount: p.amount,
            usd_amount: p.amount * price,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_conversion() {
        let pools = vec![PoolStat {
            address: "0xaaa".to_string(),
            exchange: "UNISWAP_V2".to_string(),
            symbol: "OHM-DAI".to_string(),
            amount: 1_000.0,
        }];

        let rows = with_usd(pools, 23.5);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].token_amount, 1_000.0);
        assert_eq!(rows[0].usd_amount, 23_500.0);
    }
}
