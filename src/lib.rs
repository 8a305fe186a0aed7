//! Live PumpSwap pool price streaming over Solana WebSocket RPC.
//!
//! The watcher resolves a pool's vault token accounts, subscribes to both via
//! `accountSubscribe`, and recomputes the quote/base price on every vault
//! balance change, delivering each price to a caller-supplied sink in arrival
//! order. Transient connection failures reconnect with exponential backoff;
//! the session runs until its task is cancelled.
//!
//! # Example Usage
//!
//! ```no_run
//! use pumpswap_watcher::prelude::*;
//! use solana_sdk::pubkey::Pubkey;
//! use std::str::FromStr;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let watcher = PoolWatcher::new(WatcherConfig::default());
//!     let pool = Pubkey::from_str("5fo6rn6t8697uHE744utJ9rs4HvPq9yzt8FeiFM641QW")?;
//!
//!     let mut sink = LogSink::default();
//!     watcher.watch(pool, &mut sink).await
//! }
//! ```

pub mod decimals;
pub mod dexscreener;
pub mod pool_states;
pub mod price;
pub mod sink;
pub mod watcher;

// Re-export commonly used types
pub use pool_states::{
    decode_pool, decode_token_account, DecodeError, PoolAccount, TokenAccountRecord,
};
pub use price::{compute_price, NATIVE_MINT};
pub use sink::{LogSink, PriceSink};
pub use watcher::{
    Backoff, PoolPricing, PoolSession, PoolWatcher, SubscriptionMap, VaultSide, VaultState,
    WatchError, WatcherConfig,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::decimals::resolve_decimals;
    pub use crate::dexscreener::find_pool_address;
    pub use crate::pool_states::{
        decode_pool, decode_token_account, PoolAccount, TokenAccountRecord,
    };
    pub use crate::price::{compute_price, NATIVE_MINT};
    pub use crate::sink::{LogSink, PriceSink};
    pub use crate::watcher::{PoolPricing, PoolSession, PoolWatcher, WatcherConfig};
}
