//! SQLite caching for immutable on-chain facts
//!
//! Mined transfer logs, block timestamps, dated prices and historical
//! balance samples never change, so we cache them to avoid re-querying.
//! Anything tied to "now" (latest block, current prices, timestamp
//! searches) is always re-fetched.

use anyhow::{Context, Result};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use alloy::primitives::{Address, U256};

use crate::balances::Balance;
use crate::transfers::Transfer;

/// Cache database wrapper
pub struct Cache {
    pool: SqlitePool,
}

/// Row type for transfers query
#[derive(FromRow)]
struct TransferRow {
    block_number: i64,
    log_index: i64,
    sender: String,
    recipient: String,
    amount: String,
}

/// Row type for balances query
#[derive(FromRow)]
struct BalanceRow {
    block_number: i64,
    amount: f64,
    holder: String,
}

impl Cache {
    /// Open or create cache database
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SQLx requires the file to exist for SQLite
        if !path.exists() {
            std::fs::File::create(path)?;
        }

        let url = format!("sqlite:{}", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .context("Failed to open cache database")?;

        // Enable WAL mode for better concurrency and set busy timeout
        // This prevents SQLITE_BUSY errors when multiple processes access the DB
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        let cache = Self { pool };
        cache.init_schema().await?;

        Ok(cache)
    }

    /// In-memory database, used by tests
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let cache = Self { pool };
        cache.init_schema().await?;

        Ok(cache)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "
            -- Mined ERC-20 transfer logs per token
            CREATE TABLE IF NOT EXISTS transfers (
                token TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                log_index INTEGER NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                amount TEXT NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (token, block_number, log_index)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Index for quick lookups by token
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_token ON transfers(token)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "
            -- Highest block scanned per token (even if no transfers were found)
            CREATE TABLE IF NOT EXISTS token_progress (
                token TEXT PRIMARY KEY,
                highest_block INTEGER NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Block number -> unix timestamp
            CREATE TABLE IF NOT EXISTS block_times (
                block_number INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Historical day prices per coin
            CREATE TABLE IF NOT EXISTS prices (
                coin_id TEXT NOT NULL,
                date TEXT NOT NULL,
                usd_price REAL NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (coin_id, date)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Historical balance samples
            CREATE TABLE IF NOT EXISTS balances (
                token TEXT NOT NULL,
                holder TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                amount REAL NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (token, holder, block_number)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Cache metadata
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Get all cached transfers of a token, block-ascending
    pub async fn get_transfers(&self, token: Address) -> Result<Vec<Transfer>> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            "SELECT block_number, log_index, sender, recipient, amount
             FROM transfers
             WHERE token = ?
             ORDER BY block_number, log_index",
        )
        .bind(token.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(row_to_transfer).collect())
    }

    /// Store transfers of a token (in a transaction for atomicity)
    pub async fn store_transfers(&self, token: Address, transfers: &[Transfer]) -> Result<()> {
        if transfers.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for transfer in transfers {
            sqlx::query(
                "INSERT OR REPLACE INTO transfers
                 (token, block_number, log_index, sender, recipient, amount)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(token.to_string())
            .bind(transfer.block_number as i64)
            .bind(transfer.log_index as i64)
            .bind(transfer.sender.to_string())
            .bind(transfer.recipient.to_string())
            .bind(transfer.amount.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get the highest block scanned for a token (even if no transfers
    /// were found there)
    pub async fn get_token_progress(&self, token: Address) -> Result<Option<u64>> {
        // Check both token_progress and the transfers themselves, use the
        // higher value
        let progress_row: Option<(i64,)> =
            sqlx::query_as("SELECT highest_block FROM token_progress WHERE token = ?")
                .bind(token.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let transfer_row: Option<(i64,)> =
            sqlx::query_as("SELECT MAX(block_number) FROM transfers WHERE token = ?")
                .bind(token.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let progress_block = progress_row.map(|(b,)| b as u64);
        let transfer_block = transfer_row.and_then(|(b,)| if b > 0 { Some(b as u64) } else { None });

        Ok(match (progress_block, transfer_block) {
            (Some(p), Some(t)) => Some(p.max(t)),
            (Some(p), None) => Some(p),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        })
    }

    /// Store the highest block scanned for a token
    pub async fn set_token_progress(&self, token: Address, highest_block: u64) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO token_progress (token, highest_block) VALUES (?, ?)",
        )
        .bind(token.to_string())
        .bind(highest_block as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Block Timestamps
    // =========================================================================

    /// Get a cached block timestamp
    pub async fn get_block_timestamp(&self, block_number: u64) -> Result<Option<u64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT timestamp FROM block_times WHERE block_number = ?")
                .bind(block_number as i64)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(t,)| t as u64))
    }

    /// Store a block timestamp
    pub async fn store_block_timestamp(&self, block_number: u64, timestamp: u64) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO block_times (block_number, timestamp) VALUES (?, ?)")
            .bind(block_number as i64)
            .bind(timestamp as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Prices
    // =========================================================================

    /// Get every cached day price, for preloading a price client
    pub async fn get_all_prices(&self) -> Result<Vec<(String, String, f64)>> {
        let rows: Vec<(String, String, f64)> =
            sqlx::query_as("SELECT coin_id, date, usd_price FROM prices")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Store day prices (in a transaction for atomicity)
    pub async fn store_prices(&self, prices: &[(String, String, f64)]) -> Result<()> {
        if prices.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (coin_id, date, usd_price) in prices {
            sqlx::query(
                "INSERT OR REPLACE INTO prices (coin_id, date, usd_price) VALUES (?, ?, ?)",
            )
            .bind(coin_id)
            .bind(date)
            .bind(usd_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Balance Samples
    // =========================================================================

    /// Get cached balance samples for a (token, holder) pair
    pub async fn get_balances(&self, token: Address, holder: Address) -> Result<Vec<Balance>> {
        let rows: Vec<BalanceRow> = sqlx::query_as(
            "SELECT block_number, amount, holder
             FROM balances
             WHERE token = ? AND holder = ?
             ORDER BY block_number",
        )
        .bind(token.to_string())
        .bind(holder.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(Balance {
                    block_number: r.block_number as u64,
                    amount: r.amount,
                    holder: Address::from_str(&r.holder).ok()?,
                })
            })
            .collect())
    }

    /// Store balance samples (in a transaction for atomicity)
    pub async fn store_balances(&self, token: Address, samples: &[Balance]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for sample in samples {
            sqlx::query(
                "INSERT OR REPLACE INTO balances (token, holder, block_number, amount)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(token.to_string())
            .bind(sample.holder.to_string())
            .bind(sample.block_number as i64)
            .bind(sample.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Get metadata value
    #[allow(dead_code)]
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Set metadata value
    #[allow(dead_code)]
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        let transfers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await?;
        let tokens: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT token) FROM transfers")
            .fetch_one(&self.pool)
            .await?;
        let block_times: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM block_times")
            .fetch_one(&self.pool)
            .await?;
        let prices: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prices")
            .fetch_one(&self.pool)
            .await?;
        let balances: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM balances")
            .fetch_one(&self.pool)
            .await?;

        Ok(CacheStats {
            transfers: transfers.0 as u64,
            tokens: tokens.0 as u64,
            block_times: block_times.0 as u64,
            prices: prices.0 as u64,
            balances: balances.0 as u64,
        })
    }
}

/// Convert a TransferRow to a Transfer, dropping rows with unparseable
/// addresses or amounts
fn row_to_transfer(r: TransferRow) -> Option<Transfer> {
    let sender = Address::from_str(&r.sender).ok()?;
    let recipient = Address::from_str(&r.recipient).ok()?;
    let amount = U256::from_str_radix(&r.amount, 10).ok()?;

    Some(Transfer {
        block_number: r.block_number as u64,
        log_index: r.log_index as u64,
        amount,
        sender,
        recipient,
    })
}

/// Cache statistics
#[derive(Debug)]
pub struct CacheStats {
    pub transfers: u64,
    pub tokens: u64,
    pub block_times: u64,
    pub prices: u64,
    pub balances: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} transfers across {} tokens, {} block times, {} prices, {} balance samples",
            self.transfers, self.tokens, self.block_times, self.prices, self.balances
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const TOKEN: Address = address!("0x64aa3364F17a4D01c6f1751Fd97C2BD3D7e7f1D5");
    const WALLET: Address = address!("0x31F8Cc382c9898b273eff4e0b7626a6987C846E8");

    fn transfer(block_number: u64, log_index: u64, amount: u64) -> Transfer {
        Transfer {
            block_number,
            log_index,
            amount: U256::from(amount),
            sender: WALLET,
            recipient: TOKEN,
        }
    }

    #[tokio::test]
    async fn test_transfer_round_trip() {
        let cache = Cache::open_in_memory().await.unwrap();

        let transfers = vec![transfer(100, 3, 5_000), transfer(200, 0, 7_500)];
        cache.store_transfers(TOKEN, &transfers).await.unwrap();

        let loaded = cache.get_transfers(TOKEN).await.unwrap();
        assert_eq!(loaded, transfers);

        // Other tokens are unaffected
        let other = cache.get_transfers(WALLET).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_amount_survives_u256_range() {
        let cache = Cache::open_in_memory().await.unwrap();

        // Larger than i64: decimal TEXT storage must preserve it exactly
        let big = Transfer {
            amount: U256::from_str_radix("123456789012345678901234567890", 10).unwrap(),
            ..transfer(100, 0, 0)
        };
        cache.store_transfers(TOKEN, &[big.clone()]).await.unwrap();

        let loaded = cache.get_transfers(TOKEN).await.unwrap();
        assert_eq!(loaded, vec![big]);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let cache = Cache::open_in_memory().await.unwrap();

        let transfers = vec![transfer(100, 3, 5_000)];
        cache.store_transfers(TOKEN, &transfers).await.unwrap();
        cache.store_transfers(TOKEN, &transfers).await.unwrap();

        assert_eq!(cache.get_transfers(TOKEN).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_progress_uses_higher_of_both_sources() {
        let cache = Cache::open_in_memory().await.unwrap();
        assert_eq!(cache.get_token_progress(TOKEN).await.unwrap(), None);

        cache
            .store_transfers(TOKEN, &[transfer(500, 0, 1)])
            .await
            .unwrap();
        assert_eq!(cache.get_token_progress(TOKEN).await.unwrap(), Some(500));

        // Scanning past the last transfer advances progress without rows
        cache.set_token_progress(TOKEN, 900).await.unwrap();
        assert_eq!(cache.get_token_progress(TOKEN).await.unwrap(), Some(900));

        // A stale progress marker never wins over newer transfers
        cache
            .store_transfers(TOKEN, &[transfer(1_200, 0, 1)])
            .await
            .unwrap();
        assert_eq!(cache.get_token_progress(TOKEN).await.unwrap(), Some(1_200));
    }

    #[tokio::test]
    async fn test_block_timestamp_round_trip() {
        let cache = Cache::open_in_memory().await.unwrap();
        assert_eq!(cache.get_block_timestamp(14_000_000).await.unwrap(), None);

        cache
            .store_block_timestamp(14_000_000, 1_642_114_795)
            .await
            .unwrap();
        assert_eq!(
            cache.get_block_timestamp(14_000_000).await.unwrap(),
            Some(1_642_114_795)
        );
    }

    #[tokio::test]
    async fn test_price_round_trip() {
        let cache = Cache::open_in_memory().await.unwrap();
        assert!(cache.get_all_prices().await.unwrap().is_empty());

        let entries = vec![
            ("olympus".to_string(), "01-03-2022".to_string(), 23.17),
            ("dai".to_string(), "01-03-2022".to_string(), 1.0),
        ];
        cache.store_prices(&entries).await.unwrap();

        // Storing again overwrites rather than duplicating
        cache.store_prices(&entries).await.unwrap();

        let mut loaded = cache.get_all_prices().await.unwrap();
        loaded.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        let mut expected = entries;
        expected.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        assert_eq!(loaded, expected);
    }

    #[tokio::test]
    async fn test_balance_round_trip() {
        let cache = Cache::open_in_memory().await.unwrap();

        let samples = vec![
            Balance {
                block_number: 100,
                amount: 1.5,
                holder: WALLET,
            },
            Balance {
                block_number: 200,
                amount: 2.5,
                holder: WALLET,
            },
        ];
        cache.store_balances(TOKEN, &samples).await.unwrap();

        let loaded = cache.get_balances(TOKEN, WALLET).await.unwrap();
        assert_eq!(loaded, samples);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = Cache::open_in_memory().await.unwrap();
        cache
            .store_transfers(TOKEN, &[transfer(100, 0, 1), transfer(200, 0, 1)])
            .await
            .unwrap();
        cache
            .store_prices(&[("olympus".to_string(), "01-03-2022".to_string(), 23.17)])
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.transfers, 2);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.prices, 1);
        assert_eq!(stats.balances, 0);
        assert!(stats.to_string().contains("2 transfers"));
    }
}
