//! Olympus DAO Treasury Analytics
//!
//! This tool tracks treasury token flows, protocol-owned liquidity and
//! allocator deployments by querying on-chain data, exchange subgraphs
//! and price APIs, and labeling known addresses.

mod addresses;
mod balances;
mod cache;
mod chain;
mod config;
mod constants;
mod dates;
mod error;
mod etherscan;
mod liquidity;
mod prices;
mod reports;
mod subgraph;
mod transfers;
mod volume;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;

use addresses::TokenInfo;
use cache::Cache;
use chain::{BlockRange, ChainReader, EthClient, LendingSnapshot, StabilityPosition};
use config::FileConfig;
use error::ClientResult;
use etherscan::EtherscanClient;
use prices::PriceClient;
use subgraph::GraphClient;
use transfers::Transfer;

/// Default config file path
const CONFIG_FILE: &str = "config.toml";

/// Load config file or exit with helpful message
fn load_config_file() -> Result<FileConfig> {
    let path = std::path::Path::new(CONFIG_FILE);

    if !path.exists() {
        anyhow::bail!(
            "Config file '{}' not found.\n\n\
            To get started:\n\
            1. Copy config.toml.example to config.toml\n\
            2. Fill in your API keys\n\n\
            See config.toml.example for the required format.",
            CONFIG_FILE
        );
    }

    FileConfig::load(path)
}

/// Mask API keys in URLs for safe logging
/// Converts "https://eth-mainnet.g.alchemy.com/v2/SECRET" to ".../v2/****"
fn mask_api_key(url: &str) -> String {
    if let Some(idx) = url.find("/v2/") {
        let prefix = &url[..idx + 4];
        format!("{}****", prefix)
    } else if let Some(idx) = url.find("apikey=") {
        let prefix = &url[..idx + 7];
        format!("{}****", prefix)
    } else {
        url.to_string()
    }
}

#[derive(Parser, Debug)]
#[command(name = "treasury-analytics")]
#[command(about = "Treasury analytics for Olympus DAO")]
struct Args {
    /// Data directory for the cache database
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Output directory for generated CSV reports
    #[arg(short, long, default_value = "./output", global = true)]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,

    /// Report year (default: current UTC year)
    #[arg(long, global = true)]
    year: Option<i32>,

    /// Report month 1-12 (default: current UTC month)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// RPC URL (uses the Alchemy endpoint from config.toml by default)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Force refresh all data (ignore cache)
    #[arg(long, global = true)]
    no_cache: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a token's full transfer history
    Transfers {
        /// Token symbol (e.g. OHM, sOHM, gOHM)
        symbol: String,

        /// Only keep rows touching a treasury wallet or allocator contract
        #[arg(long)]
        treasury_only: bool,
    },

    /// Fold a token's transfer history into per-address balances
    Holders {
        /// Token symbol
        symbol: String,
    },

    /// Sample a token balance over time at a fixed block stride
    Balances {
        /// Token symbol
        symbol: String,

        /// Holder address (default: every treasury wallet)
        #[arg(long)]
        holder: Option<String>,

        /// First block of the series (default: the token's deploy block)
        #[arg(long)]
        from_block: Option<u64>,

        /// Sampling stride in blocks (~6500 blocks per day)
        #[arg(long, default_value_t = 6500)]
        interval: u64,
    },

    /// Track allocator deployments (Aave, Rari Fuse, Liquity)
    Allocators {
        /// First block of the series
        #[arg(long)]
        from_block: Option<u64>,

        /// Sampling stride in blocks
        #[arg(long, default_value_t = 6500)]
        interval: u64,
    },

    /// Liquidity month-over-month across all exchanges
    Liquidity {
        /// Token symbol
        #[arg(default_value = "OHM")]
        symbol: String,
    },

    /// Trade volume month-over-month across all exchanges
    Volume {
        /// Token symbol
        #[arg(default_value = "OHM")]
        symbol: String,
    },

    /// LP deposits (mints) into the treasury wallets
    Deposits,

    /// Cache management
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Create directories
    std::fs::create_dir_all(&args.data_dir)?;
    std::fs::create_dir_all(&args.output_dir)?;

    // Open cache database (in data directory)
    let cache_path = args.data_dir.join(constants::CACHE_FILENAME);
    let cache = Cache::open(&cache_path).await?;

    // Handle subcommands
    if let Some(command) = args.command.take() {
        return handle_command(command, &args, &cache).await;
    }

    // No subcommand - run the main report generation
    run_report_generation(args, cache).await
}

async fn handle_command(command: Command, args: &Args, cache: &Cache) -> Result<()> {
    match command {
        Command::Cache { action } => match action {
            CacheCommand::Stats => {
                let stats = cache.stats().await?;
                println!("Cache: {}", stats);
                Ok(())
            }
        },

        Command::Transfers {
            ref symbol,
            treasury_only,
        } => {
            let clients = Clients::connect(args)?;
            let token = lookup_token(symbol)?;

            println!("Fetching {} transfers...", token.symbol);
            let mut transfers =
                fetch_transfers_with_cache(cache, &clients.chain, token, args.no_cache).await?;

            if treasury_only {
                let mut allow_list = clients.config.treasury_wallets.clone();
                allow_list.extend_from_slice(addresses::ALLOCATORS);
                transfers = transfers::filter_by_addresses(&transfers, &allow_list);
            }

            let path = reports::write_transfers_csv(
                &args.output_dir,
                token.symbol,
                &transfers,
                token.decimals,
            )?;
            println!(
                "\n{} transfers written to {}",
                transfers.len(),
                path.display()
            );
            Ok(())
        }

        Command::Holders { ref symbol } => {
            let clients = Clients::connect(args)?;
            let token = lookup_token(symbol)?;

            println!("Fetching {} transfers...", token.symbol);
            let transfers =
                fetch_transfers_with_cache(cache, &clients.chain, token, args.no_cache).await?;

            let holders = transfers::holder_balances(&transfers, token.decimals);
            let path = reports::write_holders_csv(&args.output_dir, token.symbol, &holders)?;
            println!("\n{} holders written to {}", holders.len(), path.display());
            Ok(())
        }

        Command::Balances {
            ref symbol,
            ref holder,
            from_block,
            interval,
        } => {
            let clients = Clients::connect(args)?;
            let token = lookup_token(symbol)?;

            let holders = match holder {
                Some(h) => vec![
                    h.parse::<Address>()
                        .with_context(|| format!("Invalid holder address: {}", h))?,
                ],
                None => clients.config.treasury_wallets.clone(),
            };

            let head = clients.chain.latest_block().await?;
            let range = BlockRange::new(from_block.unwrap_or(token.deploy_block), head)?;

            println!(
                "Sampling {} balances every {} blocks over {}-{}...",
                token.symbol, interval, range.start, range.end
            );

            let mut series = Vec::new();
            for wallet in holders {
                let samples = fetch_balances_with_cache(
                    cache,
                    &clients.chain,
                    token.address,
                    wallet,
                    interval,
                    range,
                    args.no_cache,
                )
                .await?;
                println!(
                    "  {}: {} samples",
                    addresses::get_label(&wallet).name,
                    samples.len()
                );
                series.extend(samples);
            }

            let path = reports::write_balances_csv(&args.output_dir, token.symbol, &series)?;
            println!("\n{} samples written to {}", series.len(), path.display());
            Ok(())
        }

        Command::Allocators {
            from_block,
            interval,
        } => {
            let clients = Clients::connect(args)?;
            run_allocator_sweep(args, cache, &clients, from_block, interval).await
        }

        Command::Liquidity { ref symbol } => {
            let clients = Clients::connect(args)?;
            let token = lookup_token(symbol)?;
            let (year, month) = report_month(args);

            preload_prices(cache, &clients.prices).await?;
            println!(
                "{} liquidity for {} {}...",
                token.symbol,
                dates::month_label(month),
                year
            );

            let chain = CachingChain::new(&clients.chain, cache);
            let report = liquidity::liquidity_mom(
                &chain,
                &clients.graph,
                &clients.prices,
                token,
                year,
                month,
            )
            .await?;

            reports::print_mom_summary("Liquidity", &report);
            let path = reports::write_liquidity_mom_csv(&args.output_dir, &report)?;
            println!("\nReport written to {}", path.display());

            persist_prices(cache, &clients.prices).await?;
            Ok(())
        }

        Command::Volume { ref symbol } => {
            let clients = Clients::connect(args)?;
            let token = lookup_token(symbol)?;
            let (year, month) = report_month(args);

            preload_prices(cache, &clients.prices).await?;
            println!(
                "{} volume for {} {}...",
                token.symbol,
                dates::month_label(month),
                year
            );

            let report =
                volume::volume_mom(&clients.graph, &clients.prices, token, year, month).await?;

            reports::print_mom_summary("Volume", &report);
            let path = reports::write_volume_mom_csv(&args.output_dir, &report)?;
            println!("\nReport written to {}", path.display());

            persist_prices(cache, &clients.prices).await?;
            Ok(())
        }

        Command::Deposits => {
            let clients = Clients::connect(args)?;
            let deposits = fetch_all_deposits(&clients).await?;

            let path = reports::write_deposits_csv(&args.output_dir, &deposits)?;
            println!("{} deposits written to {}", deposits.len(), path.display());
            Ok(())
        }
    }
}

// =============================================================================
// Client Construction
// =============================================================================

/// All external clients, built once per run
struct Clients {
    config: config::Config,
    chain: EthClient,
    graph: GraphClient,
    prices: PriceClient,
    etherscan: EtherscanClient,
}

impl Clients {
    fn connect(args: &Args) -> Result<Self> {
        let file_config = load_config_file()?;
        let config = config::Config::from_file(&file_config, args.rpc_url.clone())?;

        if args.verbose {
            println!("RPC: {}", mask_api_key(&config.rpc_url));
        }

        let chain = EthClient::new(&config.rpc_url)?;
        let graph = GraphClient::new()?;
        let prices = PriceClient::new(config.coingecko_api_key.clone())?;
        let etherscan = EtherscanClient::new(config.etherscan_api_key.clone())?;

        Ok(Self {
            config,
            chain,
            graph,
            prices,
            etherscan,
        })
    }
}

fn lookup_token(symbol: &str) -> Result<&'static TokenInfo> {
    addresses::token_by_symbol(symbol).ok_or_else(|| {
        let known: Vec<&str> = addresses::TOKENS.iter().map(|t| t.symbol).collect();
        anyhow::anyhow!("Unknown token '{}'. Known: {}", symbol, known.join(", "))
    })
}

fn report_month(args: &Args) -> (i32, u32) {
    let now = Utc::now();
    (
        args.year.unwrap_or_else(|| now.year()),
        args.month.unwrap_or_else(|| now.month()),
    )
}

// =============================================================================
// Caching Wrappers
// =============================================================================

/// Chain reader that remembers block timestamps in the sqlite cache.
/// Timestamps of mined blocks never change, and the timestamp search
/// re-reads many of them across runs.
struct CachingChain<'a> {
    inner: &'a EthClient,
    cache: &'a Cache,
}

impl<'a> CachingChain<'a> {
    fn new(inner: &'a EthClient, cache: &'a Cache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ChainReader for CachingChain<'_> {
    async fn latest_block(&self) -> ClientResult<u64> {
        self.inner.latest_block().await
    }

    async fn timestamp_of_block(&self, block_number: u64) -> ClientResult<u64> {
        if let Ok(Some(timestamp)) = self.cache.get_block_timestamp(block_number).await {
            return Ok(timestamp);
        }

        let timestamp = self.inner.timestamp_of_block(block_number).await?;
        if let Err(e) = self.cache.store_block_timestamp(block_number, timestamp).await {
            eprintln!("    Warning: failed to cache block timestamp: {}", e);
        }
        Ok(timestamp)
    }

    async fn transfer_logs(&self, token: Address, range: BlockRange) -> ClientResult<Vec<Log>> {
        self.inner.transfer_logs(token, range).await
    }

    async fn erc20_decimals(&self, token: Address) -> ClientResult<u8> {
        self.inner.erc20_decimals(token).await
    }

    async fn erc20_balance(
        &self,
        token: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<U256> {
        self.inner.erc20_balance(token, holder, block).await
    }

    async fn lending_snapshot(
        &self,
        market: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<LendingSnapshot> {
        self.inner.lending_snapshot(market, holder, block).await
    }

    async fn stability_position(
        &self,
        pool: Address,
        holder: Address,
        block: u64,
    ) -> ClientResult<StabilityPosition> {
        self.inner.stability_position(pool, holder, block).await
    }
}

async fn preload_prices(cache: &Cache, prices: &PriceClient) -> Result<()> {
    let cached = cache.get_all_prices().await?;
    if !cached.is_empty() {
        prices.preload_dated(cached);
    }
    Ok(())
}

async fn persist_prices(cache: &Cache, prices: &PriceClient) -> Result<()> {
    cache.store_prices(&prices.dated_snapshot()).await
}

/// Fetch a token's transfer history, re-reading only blocks past the
/// cache's high-water mark
async fn fetch_transfers_with_cache(
    cache: &Cache,
    chain: &EthClient,
    token: &TokenInfo,
    no_cache: bool,
) -> Result<Vec<Transfer>> {
    let head = chain.latest_block().await?;

    if no_cache {
        let range = BlockRange::new(token.deploy_block, head)?;
        let fetched = transfers::fetch_token_transfers(chain, token.address, range).await?;
        cache.store_transfers(token.address, &fetched).await?;
        cache.set_token_progress(token.address, head).await?;
        return Ok(fetched);
    }

    let cached = cache.get_transfers(token.address).await?;
    let cached_count = cached.len();

    let scan_from = match cache.get_token_progress(token.address).await? {
        Some(highest) => highest + 1,
        None => token.deploy_block,
    };

    if scan_from > head {
        println!("    ({} from cache, up to date)", cached_count);
        return Ok(cached);
    }

    let range = BlockRange::new(scan_from, head)?;
    let fresh = transfers::fetch_token_transfers(chain, token.address, range).await?;
    cache.store_transfers(token.address, &fresh).await?;
    cache.set_token_progress(token.address, head).await?;

    let new_count = fresh.len();
    let merged = transfers::merge_transfers(cached, fresh);

    if cached_count > 0 {
        println!("    ({} from cache, {} new)", cached_count, new_count);
    }

    Ok(merged)
}

/// Sample a balance series, skipping the chain entirely when every stride
/// point is already cached
async fn fetch_balances_with_cache(
    cache: &Cache,
    chain: &EthClient,
    token: Address,
    holder: Address,
    interval: u64,
    range: BlockRange,
    no_cache: bool,
) -> Result<Vec<balances::Balance>> {
    if !no_cache {
        let cached = cache.get_balances(token, holder).await?;
        let have: HashSet<u64> = cached.iter().map(|b| b.block_number).collect();
        let wanted = range.stride(interval);

        if wanted.iter().all(|b| have.contains(b)) {
            let points: HashSet<u64> = wanted.into_iter().collect();
            return Ok(cached
                .into_iter()
                .filter(|b| points.contains(&b.block_number))
                .collect());
        }
    }

    let series = balances::fetch_erc20_balances(chain, token, holder, interval, range).await?;
    cache.store_balances(token, &series).await?;
    Ok(series)
}

// =============================================================================
// Allocator Sweep
// =============================================================================

/// Track DAI deployed to yield allocators: aDAI held by the Aave
/// allocators, Fuse lending positions for the Rari allocator, and the
/// Liquity stability pool position
async fn run_allocator_sweep(
    args: &Args,
    cache: &Cache,
    clients: &Clients,
    from_block: Option<u64>,
    interval: u64,
) -> Result<()> {
    let adai = lookup_token("aDAI")?;
    let head = clients.chain.latest_block().await?;
    let range = BlockRange::new(from_block.unwrap_or(adai.deploy_block), head)?;

    println!(
        "Tracking allocator deployments every {} blocks over {}-{}...\n",
        interval, range.start, range.end
    );

    // Aave: aDAI sits in the allocator and treasury wallets directly
    println!("Aave allocators (aDAI)...");
    let mut owners = addresses::aave_allocators();
    owners.extend_from_slice(&clients.config.treasury_wallets);
    let mut aave_series = Vec::new();
    for allocator in owners {
        let samples = fetch_balances_with_cache(
            cache,
            &clients.chain,
            adai.address,
            allocator,
            interval,
            range,
            args.no_cache,
        )
        .await?;
        println!(
            "  {}: {} samples",
            addresses::get_label(&allocator).name,
            samples.len()
        );
        aave_series.extend(samples);
    }
    let path = reports::write_balances_csv(&args.output_dir, "adai_allocator", &aave_series)?;
    println!("  Written to {}\n", path.display());

    // Rari Fuse: underlying DAI behind the allocator's fDAI position
    println!("Rari Fuse allocator (DAI via Pool Party)...");
    let rari_series = balances::fetch_lending_balances(
        &clients.chain,
        addresses::RARI_POOL_PARTY_DAI,
        addresses::RARI_ALLOCATOR_V1,
        interval,
        range,
        18,
    )
    .await?;
    println!("  {} samples", rari_series.len());
    let path = reports::write_balances_csv(&args.output_dir, "rari_allocator", &rari_series)?;
    println!("  Written to {}\n", path.display());

    // Liquity: compounded LUSD deposit plus accrued gains
    println!("Liquity stability pool (LUSD)...");
    let stability = balances::fetch_stability_samples(
        &clients.chain,
        addresses::LIQUITY_STABILITY_POOL,
        addresses::LIQUITY_ALLOCATOR_V1,
        interval,
        range,
    )
    .await?;
    println!("  {} samples", stability.len());
    let path = reports::write_stability_csv(&args.output_dir, &stability)?;
    println!("  Written to {}", path.display());

    Ok(())
}

// =============================================================================
// Report Generation
// =============================================================================

async fn fetch_all_deposits(clients: &Clients) -> Result<Vec<subgraph::LpDeposit>> {
    let mut deposits = Vec::new();

    for wallet in &clients.config.treasury_wallets {
        for desc in subgraph::PAIR_EXCHANGES {
            let mints = subgraph::fetch_mint_deposits(&clients.graph, desc, *wallet)
                .await
                .with_context(|| format!("{} mint query failed", desc.label))?;
            deposits.extend(mints);
        }
    }

    deposits.sort_by_key(|d| d.timestamp);
    Ok(deposits)
}

/// Run the main report generation workflow
async fn run_report_generation(args: Args, cache: Cache) -> Result<()> {
    println!("Olympus Treasury Analytics");
    println!("=============================================\n");

    let clients = Clients::connect(&args)?;
    println!("Treasury wallets: {}", clients.config.treasury_wallets.len());
    println!("RPC: {}\n", mask_api_key(&clients.config.rpc_url));

    // Show cache stats
    let stats = cache.stats().await?;
    if !args.no_cache && (stats.transfers > 0 || stats.prices > 0) {
        println!("Cache: {}", stats);
    }

    let head = clients.chain.latest_block().await?;
    println!("Latest block: {}\n", head);

    let (year, month) = report_month(&args);
    let ohm = lookup_token("OHM")?;

    preload_prices(&cache, &clients.prices).await?;

    // Step 1: OHM transfer history (with caching)
    println!("Fetching OHM transfers...");
    let ohm_transfers =
        fetch_transfers_with_cache(&cache, &clients.chain, ohm, args.no_cache).await?;
    println!("  Found {} transfers\n", ohm_transfers.len());

    // Step 2: Fold into holder balances
    println!("Folding holder balances...");
    let holders = transfers::holder_balances(&ohm_transfers, ohm.decimals);
    println!("  {} distinct holders\n", holders.len());

    // Step 3: Liquidity month-over-month
    println!(
        "Fetching liquidity ({} {})...",
        dates::month_label(month),
        year
    );
    let caching_chain = CachingChain::new(&clients.chain, &cache);
    let liquidity_report = liquidity::liquidity_mom(
        &caching_chain,
        &clients.graph,
        &clients.prices,
        ohm,
        year,
        month,
    )
    .await?;
    reports::print_mom_summary("Liquidity", &liquidity_report);
    println!();

    // Step 4: Volume month-over-month
    println!("Fetching volume ({} {})...", dates::month_label(month), year);
    let volume_report =
        volume::volume_mom(&clients.graph, &clients.prices, ohm, year, month).await?;
    reports::print_mom_summary("Volume", &volume_report);
    println!();

    // Step 5: LP deposits into the treasury
    println!("Fetching LP deposits...");
    let deposits = fetch_all_deposits(&clients).await?;
    println!("  Found {} deposits\n", deposits.len());

    // Step 6: Allocator balances at the month end
    println!("Fetching allocator balances...");
    let (_, month_end) = dates::month_bounds(year, month)?;
    let pin = if dates::is_current_month(year, month) {
        head
    } else {
        chain::block_of_timestamp(&caching_chain, month_end as u64).await?
    };
    let adai = lookup_token("aDAI")?;
    for allocator in addresses::aave_allocators() {
        match caching_chain.erc20_balance(adai.address, allocator, pin).await {
            Ok(raw) => println!(
                "  {}: {:.2} aDAI",
                addresses::get_label(&allocator).name,
                balances::scale_amount(raw, adai.decimals)
            ),
            Err(e) => eprintln!("  Warning: allocator balance lookup failed: {}", e),
        }
    }
    println!();

    // Step 7: Etherscan annotations (supplementary; warn and continue)
    println!("Fetching supply figures...");
    match clients.etherscan.token_total_supply(ohm.address).await {
        Ok(supply) => println!(
            "  OHM total supply: {:.0}",
            balances::scale_amount(supply, ohm.decimals)
        ),
        Err(e) => eprintln!("  Warning: total supply lookup failed: {}", e),
    }
    for wallet in &clients.config.treasury_wallets {
        match clients.etherscan.ether_balance(*wallet).await {
            Ok(wei) => println!(
                "  {}: {:.4} ETH",
                addresses::get_label(wallet).name,
                balances::scale_amount(wei, 18)
            ),
            Err(e) => eprintln!("  Warning: ether balance lookup failed: {}", e),
        }
    }
    println!();

    // Step 8: Write reports
    println!("Generating reports...");
    reports::write_transfers_csv(&args.output_dir, ohm.symbol, &ohm_transfers, ohm.decimals)?;
    reports::write_holders_csv(&args.output_dir, ohm.symbol, &holders)?;
    reports::write_liquidity_mom_csv(&args.output_dir, &liquidity_report)?;
    reports::write_volume_mom_csv(&args.output_dir, &volume_report)?;
    reports::write_deposits_csv(&args.output_dir, &deposits)?;

    persist_prices(&cache, &clients.prices).await?;

    println!("\nDone! Reports written to: {}", args.output_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(
            mask_api_key("https://eth-mainnet.g.alchemy.com/v2/secret-key"),
            "https://eth-mainnet.g.alchemy.com/v2/****"
        );
        assert_eq!(
            mask_api_key("https://api.etherscan.io/api?apikey=secret"),
            "https://api.etherscan.io/api?apikey=****"
        );
        assert_eq!(mask_api_key("http://localhost:8545"), "http://localhost:8545");
    }

    #[test]
    fn test_lookup_token() {
        assert_eq!(lookup_token("OHM").unwrap().symbol, "OHM");
        assert!(lookup_token("NOPE").is_err());
    }

    #[test]
    fn test_month_argument_is_range_checked() {
        // Out-of-range months never reach the date arithmetic
        assert!(Args::try_parse_from(["treasury-analytics", "--month", "0"]).is_err());
        assert!(Args::try_parse_from(["treasury-analytics", "--month", "13"]).is_err());

        let args = Args::try_parse_from(["treasury-analytics", "--month", "12"]).unwrap();
        assert_eq!(args.month, Some(12));
    }

    #[test]
    fn test_report_flags_accepted_after_subcommand() {
        let args = Args::try_parse_from([
            "treasury-analytics",
            "liquidity",
            "--year",
            "2022",
            "--month",
            "3",
            "--no-cache",
        ])
        .unwrap();

        assert_eq!(args.year, Some(2022));
        assert_eq!(args.month, Some(3));
        assert!(args.no_cache);
        assert!(matches!(args.command, Some(Command::Liquidity { .. })));
    }
}
