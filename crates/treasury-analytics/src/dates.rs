//! Calendar helpers for monthly reports and price lookups

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Full month names indexed by month number (1-12)
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// UTC timestamps for [first second of the month, first second of the next
/// month)
pub fn month_bounds(year: i32, month: u32) -> Result<(i64, i64)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month: {}-{:02}", year, month))?;

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .with_context(|| format!("Invalid month: {}-{:02}", next_year, next_month))?;

    let to_ts = |d: NaiveDate| match d.and_hms_opt(0, 0, 0) {
        Some(dt) => dt.and_utc().timestamp(),
        None => 0,
    };

    Ok((to_ts(start), to_ts(end)))
}

/// The (year, month) pair immediately before the given month
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

/// English month name for column labels
pub fn month_label(month: u32) -> &'static str {
    MONTH_NAMES[(month as usize - 1).min(11)]
}

/// Render a unix timestamp in CoinGecko's DD-MM-YYYY day format
pub fn coingecko_date(timestamp: i64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(dt) => format!("{:02}-{:02}-{}", dt.day(), dt.month(), dt.year()),
        None => String::new(),
    }
}

/// Today in CoinGecko's DD-MM-YYYY day format
pub fn coingecko_date_today() -> String {
    coingecko_date(Utc::now().timestamp())
}

/// True if (year, month) is the current UTC month
pub fn is_current_month(year: i32, month: u32) -> bool {
    let now = Utc::now();
    now.year() == year && now.month() == month
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_mid_year() {
        // March 2022: [2022-03-01, 2022-04-01)
        let (start, end) = month_bounds(2022, 3).unwrap();
        assert_eq!(start, 1646092800);
        assert_eq!(end, 1648771200);
    }

    #[test]
    fn test_month_bounds_december_rolls_year() {
        let (start, end) = month_bounds(2021, 12).unwrap();
        assert_eq!(start, 1638316800); // 2021-12-01
        assert_eq!(end, 1640995200); // 2022-01-01
    }

    #[test]
    fn test_month_bounds_rejects_bad_month() {
        assert!(month_bounds(2022, 13).is_err());
        assert!(month_bounds(2022, 0).is_err());
    }

    #[test]
    fn test_previous_month() {
        assert_eq!(previous_month(2022, 3), (2022, 2));
        assert_eq!(previous_month(2022, 1), (2021, 12));
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(1), "January");
        assert_eq!(month_label(12), "December");
    }

    #[test]
    fn test_coingecko_date_format() {
        // 2022-03-01 00:00:00 UTC
        assert_eq!(coingecko_date(1646092800), "01-03-2022");
        // 2021-12-31 23:59:59 UTC
        assert_eq!(coingecko_date(1640995199), "31-12-2021");
    }
}
