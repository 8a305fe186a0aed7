//! PumpSwap pool watcher service.
//!
//! Takes a pool address directly, or resolves one for a token mint via
//! DexScreener, then streams live prices to the log.
//!
//! # Usage
//!
//! ```bash
//! # Watch a known pool
//! cargo run --bin pumpswap-watcher -- --pool 5fo6rn6t8697uHE744utJ9rs4HvPq9yzt8FeiFM641QW
//!
//! # Or discover the pool for a mint
//! export SOLANA_RPC_URL="https://mainnet.helius-rpc.com/?api-key=..."
//! export WS_ENDPOINT="wss://rpc.helius.xyz/?api-key=..."
//! cargo run --bin pumpswap-watcher -- --mint <TOKEN_MINT>
//! ```

use clap::Parser;
use pumpswap_watcher::dexscreener::DEXSCREENER_API;
use pumpswap_watcher::prelude::*;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "pumpswap-watcher")]
#[command(about = "Live PumpSwap pool price streaming", long_about = None)]
struct Args {
    /// Token mint to look up on DexScreener (ignored when --pool is given)
    #[arg(short = 'm', long = "mint", env = "TOKEN_MINT")]
    mint: Option<String>,

    /// PumpSwap pool address to watch directly
    #[arg(short = 'p', long = "pool", env = "POOL_ADDRESS")]
    pool: Option<String>,

    /// Solana HTTP RPC endpoint
    #[arg(
        long = "rpc-endpoint",
        env = "SOLANA_RPC_URL",
        default_value = "https://api.mainnet-beta.solana.com"
    )]
    rpc_endpoint: String,

    /// Solana WebSocket endpoint
    #[arg(
        long = "ws-endpoint",
        env = "WS_ENDPOINT",
        default_value = "wss://api.mainnet-beta.solana.com"
    )]
    ws_endpoint: String,

    /// DexScreener token API base URL
    #[arg(long = "dexscreener-url", env = "DEXSCREENER_URL", default_value = DEXSCREENER_API)]
    dexscreener_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let pool_address = match (&args.pool, &args.mint) {
        (Some(pool), _) => pool.clone(),
        (None, Some(mint)) => {
            let client = reqwest::Client::new();
            match find_pool_address(&client, &args.dexscreener_url, mint).await? {
                Some(address) => {
                    log::info!("PumpSwap pool for mint {}: {}", mint, address);
                    address
                }
                None => anyhow::bail!("no PumpSwap pool found for mint {}", mint),
            }
        }
        (None, None) => anyhow::bail!("either --pool or --mint is required"),
    };
    let pool = Pubkey::from_str(&pool_address)
        .map_err(|e| anyhow::anyhow!("invalid pool address '{}': {}", pool_address, e))?;

    let config = WatcherConfig {
        rpc_endpoint: args.rpc_endpoint,
        ws_endpoint: args.ws_endpoint,
        ..WatcherConfig::default()
    };

    log::info!("=== PumpSwap Pool Watcher ===");
    log::info!("RPC endpoint: {}", config.rpc_endpoint);
    log::info!("WS endpoint: {}", config.ws_endpoint);
    log::info!("Pool: {}", pool);
    log::info!("=============================");

    let watcher = PoolWatcher::new(config);
    let mut sink = LogSink::default();
    watcher.watch(pool, &mut sink).await
}
