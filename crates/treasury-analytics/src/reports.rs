//! Report generation (CSV outputs and console summary)

use anyhow::Result;
use chrono::DateTime;
use csv::Writer;
use std::path::{Path, PathBuf};

use crate::addresses;
use crate::balances::{Balance, StabilitySample, scale_amount};
use crate::constants;
use crate::liquidity::MomReport;
use crate::subgraph::LpDeposit;
use crate::transfers::{HolderBalance, Transfer};

/// Generate {symbol}_transfers.csv
pub fn write_transfers_csv(
    output_dir: &Path,
    symbol: &str,
    transfers: &[Transfer],
    decimals: u8,
) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}_transfers.csv", symbol.to_lowercase()));
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Block",
        "Log_Index",
        "From",
        "From_Label",
        "To",
        "To_Label",
        "Amount",
    ])?;

    for transfer in transfers {
        wtr.write_record([
            &transfer.block_number.to_string(),
            &transfer.log_index.to_string(),
            &transfer.sender.to_string(),
            &addresses::get_label(&transfer.sender).name,
            &transfer.recipient.to_string(),
            &addresses::get_label(&transfer.recipient).name,
            &format!("{:.6}", scale_amount(transfer.amount, decimals)),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate {symbol}_holders.csv from a folded transfer history
pub fn write_holders_csv(
    output_dir: &Path,
    symbol: &str,
    holders: &[HolderBalance],
) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}_holders.csv", symbol.to_lowercase()));
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Address", "Label", "Balance"])?;

    for holder in holders {
        wtr.write_record([
            &holder.address.to_string(),
            &addresses::get_label(&holder.address).name,
            &format!("{:.6}", holder.balance),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate a balance time series CSV named after `stem`
pub fn write_balances_csv(
    output_dir: &Path,
    stem: &str,
    samples: &[Balance],
) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}_balances.csv", stem.to_lowercase()));
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Block", "Holder", "Holder_Label", "Amount"])?;

    for sample in samples {
        wtr.write_record([
            &sample.block_number.to_string(),
            &sample.holder.to_string(),
            &addresses::get_label(&sample.holder).name,
            &format!("{:.6}", sample.amount),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate liquity_stability.csv
pub fn write_stability_csv(output_dir: &Path, samples: &[StabilitySample]) -> Result<PathBuf> {
    let path = output_dir.join("liquity_stability.csv");
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Block", "LUSD_Deposit", "ETH_Gain", "LQTY_Gain"])?;

    for sample in samples {
        wtr.write_record([
            &sample.block_number.to_string(),
            &format!("{:.6}", sample.lusd_deposit),
            &format!("{:.6}", sample.eth_gain),
            &format!("{:.6}", sample.lqty_gain),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate liquidity_mom.csv
pub fn write_liquidity_mom_csv(output_dir: &Path, report: &MomReport) -> Result<PathBuf> {
    write_mom_csv(output_dir.join(constants::LIQUIDITY_MOM_FILENAME), report)
}

/// Generate volume_mom.csv
pub fn write_volume_mom_csv(output_dir: &Path, report: &MomReport) -> Result<PathBuf> {
    write_mom_csv(output_dir.join(constants::VOLUME_MOM_FILENAME), report)
}

/// Month-over-month table with month-labeled columns. Undefined percent
/// changes (previous month zero) render as empty fields, never infinity.
fn write_mom_csv(path: PathBuf, report: &MomReport) -> Result<PathBuf> {
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Pool",
        "Exchange",
        "Pair",
        &format!("{}_Token", report.previous_label),
        &format!("{}_Token", report.current_label),
        "Token_Change",
        "Token_Change_Pct",
        &format!("{}_USD", report.previous_label),
        &format!("{}_USD", report.current_label),
        "USD_Change",
        "USD_Change_Pct",
    ])?;

    for row in &report.rows {
        wtr.write_record([
            &row.address,
            &row.exchange,
            &row.symbol,
            &format!("{:.4}", row.token_previous),
            &format!("{:.4}", row.token_current),
            &format!("{:.4}", row.token_change),
            &format_percent(row.token_change_percent),
            &format!("{:.2}", row.usd_previous),
            &format!("{:.2}", row.usd_current),
            &format!("{:.2}", row.usd_change),
            &format_percent(row.usd_change_percent),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate lp_deposits.csv
pub fn write_deposits_csv(output_dir: &Path, deposits: &[LpDeposit]) -> Result<PathBuf> {
    let path = output_dir.join(constants::DEPOSITS_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Date", "Exchange", "Pair", "Amount0", "Amount1"])?;

    for deposit in deposits {
        wtr.write_record([
            &format_date(deposit.timestamp),
            &deposit.exchange,
            &format!("{}-{}", deposit.token0_symbol, deposit.token1_symbol),
            &format!("{:.6}", deposit.amount0),
            &format!("{:.6}", deposit.amount1),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Print a month-over-month table's totals to the console
pub fn print_mom_summary(title: &str, report: &MomReport) {
    let previous: f64 = report.rows.iter().map(|r| r.usd_previous).sum();
    let current: f64 = report.rows.iter().map(|r| r.usd_current).sum();

    println!(
        "  {title}: {} ${:.0} -> {} ${:.0} across {} pools",
        report.previous_label,
        previous,
        report.current_label,
        current,
        report.rows.len()
    );
}

fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v * 100.0),
        None => String::new(),
    }
}

fn format_date(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::MomRow;
    use alloy::primitives::{U256, address};

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        let mut rows = vec![headers];
        for record in rdr.records() {
            rows.push(record.unwrap().iter().map(String::from).collect());
        }
        rows
    }

    #[test]
    fn test_mom_csv_labels_and_blank_percent() {
        let dir = std::env::temp_dir().join("treasury-analytics-mom-test");
        std::fs::create_dir_all(&dir).unwrap();

        let report = MomReport {
            previous_label: "February",
            current_label: "March",
            rows: vec![MomRow {
                address: "0xaaa".to_string(),
                exchange: "UNISWAP_V2".to_string(),
                symbol: "OHM-DAI".to_string(),
                token_previous: 0.0,
                token_current: 150.0,
                token_change: 150.0,
                token_change_percent: None,
                usd_previous: 1000.0,
                usd_current: 1500.0,
                usd_change: 500.0,
                usd_change_percent: Some(0.5),
            }],
        };

        let path = write_liquidity_mom_csv(&dir, &report).unwrap();
        let rows = read_csv(&path);

        assert!(rows[0].contains(&"February_Token".to_string()));
        assert!(rows[0].contains(&"March_USD".to_string()));

        // Undefined token percent is an empty field; the USD one is 50.00
        let token_pct = rows[0].iter().position(|h| h == "Token_Change_Pct").unwrap();
        let usd_pct = rows[0].iter().position(|h| h == "USD_Change_Pct").unwrap();
        assert_eq!(rows[1][token_pct], "");
        assert_eq!(rows[1][usd_pct], "50.00");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_transfers_csv_scales_amounts() {
        let dir = std::env::temp_dir().join("treasury-analytics-transfers-test");
        std::fs::create_dir_all(&dir).unwrap();

        let transfers = vec![Transfer {
            block_number: 14_000_000,
            log_index: 3,
            amount: U256::from(1_500_000_000u64),
            sender: address!("0x1111111111111111111111111111111111111111"),
            recipient: address!("0x2222222222222222222222222222222222222222"),
        }];

        let path = write_transfers_csv(&dir, "OHM", &transfers, 9).unwrap();
        assert!(path.ends_with("ohm_transfers.csv"));

        let rows = read_csv(&path);
        let amount = rows[0].iter().position(|h| h == "Amount").unwrap();
        assert_eq!(rows[1][amount], "1.500000");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_deposit_date_rendering() {
        assert_eq!(format_date(1646092800), "2022-03-01");
    }
}
