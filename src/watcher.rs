//! Pool watching sessions.
//!
//! A session resolves a pool's vault and mint addresses, then holds one
//! WebSocket connection with an `accountSubscribe` per vault, recomputing the
//! price on every balance change. Transient failures reconnect with
//! exponential backoff; only a sink failure escapes to the caller.

use crate::decimals::resolve_decimals;
use crate::pool_states::{decode_pool, decode_token_account};
use crate::price::compute_price;
use crate::sink::PriceSink;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, Stream, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

/// Configuration for pool watching sessions.
///
/// Everything the session needs is passed in here; there is no module-level
/// state to configure.
#[derive(Clone, Debug)]
pub struct WatcherConfig {
    /// HTTP RPC endpoint for the pool fetch and mint decimal reads.
    pub rpc_endpoint: String,
    /// WebSocket RPC endpoint for vault subscriptions.
    pub ws_endpoint: String,
    /// Commitment level requested for vault subscriptions.
    pub commitment: String,
    /// Timeout for each of the two subscription confirmations.
    pub subscribe_timeout: Duration,
    /// Timeout for each notification read in steady state.
    pub read_timeout: Duration,
    /// First reconnect delay; doubles per consecutive failure.
    pub initial_backoff: Duration,
    /// Reconnect delay ceiling.
    pub max_backoff: Duration,
    /// Attempts for the initial pool account fetch.
    pub resolve_attempts: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            ws_endpoint: "wss://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            subscribe_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
            resolve_attempts: 3,
        }
    }
}

/// Which side of the pool a vault holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaultSide {
    Base,
    Quote,
}

/// Decimal scales and mint identity needed to price vault balances.
#[derive(Clone, Debug)]
pub struct PoolPricing {
    pub base_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
}

/// Resolved inputs for one watching session.
///
/// Produced by [`PoolWatcher::resolve`]; hosts that already know the vaults
/// and decimals can build one directly and call [`PoolWatcher::stream`].
#[derive(Clone, Debug)]
pub struct PoolSession {
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub pricing: PoolPricing,
}

/// Latest observed balance per vault.
///
/// Both sides start unknown; a price exists only once both have been seen.
/// Balances survive reconnects, a new connection only has to observe the
/// sides that change.
#[derive(Debug, Default)]
pub struct VaultState {
    base: Option<u64>,
    quote: Option<u64>,
}

impl VaultState {
    pub fn record(&mut self, side: VaultSide, amount: u64) {
        match side {
            VaultSide::Base => self.base = Some(amount),
            VaultSide::Quote => self.quote = Some(amount),
        }
    }

    /// Price from the latest balances, once both sides are known.
    pub fn price(&self, pricing: &PoolPricing) -> Option<Decimal> {
        let (base, quote) = (self.base?, self.quote?);
        compute_price(
            base,
            quote,
            pricing.base_decimals,
            pricing.quote_decimals,
            &pricing.base_mint,
        )
    }
}

/// Server-assigned subscription ids mapped back to vault sides.
///
/// Built from the two subscribe confirmations and discarded on reconnect;
/// ids are only meaningful within one connection.
#[derive(Debug, Default)]
pub struct SubscriptionMap(HashMap<u64, VaultSide>);

impl SubscriptionMap {
    pub fn insert(&mut self, id: u64, side: VaultSide) {
        self.0.insert(id, side);
    }

    pub fn side(&self, id: u64) -> Option<VaultSide> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reconnect delay state: doubles per consecutive failure, capped, and reset
/// on every successful connection.
#[derive(Clone, Debug)]
pub struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    /// Delay to sleep before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Failures inside one streaming connection. All of them trigger a reconnect
/// except [`WatchError::Sink`], which ends the session.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("no message within {0:?}")]
    ReadTimeout(Duration),
    #[error("connection closed by server")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("price sink failed: {0}")]
    Sink(#[source] anyhow::Error),
}

/// Run `op` up to `attempts` times, sleeping `2^attempt` seconds between
/// failures. `None` once every attempt has failed.
pub(crate) async fn with_retries<T, F, Fut>(attempts: u32, what: &str, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Some(value),
            Err(e) => {
                log::error!("Attempt {}/{} failed for {}: {:#}", attempt + 1, attempts, what, e);
                if attempt + 1 < attempts {
                    sleep(Duration::from_secs(1u64 << attempt)).await;
                }
            }
        }
    }
    log::error!("Giving up on {} after {} attempts", what, attempts);
    None
}

/// Watches one PumpSwap pool and streams its price to a sink.
///
/// One watcher drives one pool; hosts watching several pools run one
/// independent task per pool. Cancelling the enclosing task at any await
/// point drops (and thereby closes) the connection.
pub struct PoolWatcher {
    config: WatcherConfig,
    rpc: RpcClient,
}

impl PoolWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        let rpc = RpcClient::new(config.rpc_endpoint.clone());
        Self { config, rpc }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Watch `pool` until the enclosing task is cancelled.
    ///
    /// Resolution failures (pool unfetchable or undecodable after retries,
    /// mint decimals absent) are logged and end the session with `Ok(())`
    /// without the sink ever being invoked. Once resolved, the session
    /// reconnects forever; only a sink failure is returned.
    pub async fn watch<S: PriceSink>(&self, pool: Pubkey, sink: &mut S) -> Result<()> {
        let Some(session) = self.resolve(pool).await else {
            return Ok(());
        };
        self.stream(&session, sink).await
    }

    /// Resolve vault addresses and mint decimals for `pool`.
    pub async fn resolve(&self, pool: Pubkey) -> Option<PoolSession> {
        let rpc = &self.rpc;
        let account = with_retries(self.config.resolve_attempts, "pool account fetch", move || {
            async move {
                let account = rpc
                    .get_account(&pool)
                    .await
                    .with_context(|| format!("getAccountInfo for pool {} failed", pool))?;
                decode_pool(&account.data).map_err(anyhow::Error::from)
            }
        })
        .await?;
        log::info!("Pool {} fetched", pool);

        let base_mint = Pubkey::new_from_array(account.base_mint);
        let quote_mint = Pubkey::new_from_array(account.quote_mint);
        let base_decimals = resolve_decimals(&self.rpc, &base_mint).await;
        let quote_decimals = resolve_decimals(&self.rpc, &quote_mint).await;
        let (Some(base_decimals), Some(quote_decimals)) = (base_decimals, quote_decimals) else {
            log::error!("Failed to resolve mint decimals for pool {}", pool);
            return None;
        };

        Some(PoolSession {
            base_vault: Pubkey::new_from_array(account.pool_base_token_account),
            quote_vault: Pubkey::new_from_array(account.pool_quote_token_account),
            pricing: PoolPricing {
                base_mint,
                base_decimals,
                quote_decimals,
            },
        })
    }

    /// Streaming phase: reconnects with exponential backoff indefinitely.
    ///
    /// Returns only on a sink failure or external cancellation.
    pub async fn stream<S: PriceSink>(&self, session: &PoolSession, sink: &mut S) -> Result<()> {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut vaults = VaultState::default();
        loop {
            match self
                .run_connection(session, &mut backoff, &mut vaults, sink)
                .await
            {
                Ok(()) => log::info!("WebSocket closed by server"),
                Err(WatchError::Sink(e)) => return Err(e),
                Err(e) => log::error!(
                    "WebSocket error for vaults {} / {}: {}",
                    session.base_vault,
                    session.quote_vault,
                    e
                ),
            }
            let delay = backoff.next_delay();
            log::info!("Reconnecting in {:?}", delay);
            sleep(delay).await;
        }
    }

    /// One connection: subscribe to both vaults, then pump notifications
    /// until something goes wrong.
    async fn run_connection<S: PriceSink>(
        &self,
        session: &PoolSession,
        backoff: &mut Backoff,
        vaults: &mut VaultState,
        sink: &mut S,
    ) -> std::result::Result<(), WatchError> {
        let (ws, _) = connect_async(&self.config.ws_endpoint).await?;
        log::info!(
            "Connected to WebSocket for vaults {} / {}",
            session.base_vault,
            session.quote_vault
        );
        backoff.reset();

        let (mut write, mut read) = ws.split();

        // One subscription per vault; request ids 1 and 2 correlate the
        // confirmations back to the base and quote side.
        for (id, vault) in [(1u64, &session.base_vault), (2, &session.quote_vault)] {
            let request = json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "accountSubscribe",
                "params": [
                    vault.to_string(),
                    { "encoding": "base64", "commitment": self.config.commitment }
                ],
            });
            write.send(Message::Text(request.to_string())).await?;
        }

        let subs = self.confirm_subscriptions(&mut read).await?;

        loop {
            let msg = timeout(self.config.read_timeout, read.next())
                .await
                .map_err(|_| WatchError::ReadTimeout(self.config.read_timeout))?
                .ok_or(WatchError::Closed)??;
            match msg {
                Message::Text(text) => {
                    if let Some(price) =
                        handle_notification(&text, &subs, vaults, &session.pricing)?
                    {
                        sink.on_price(price).await.map_err(WatchError::Sink)?;
                        log::debug!("Delivered price {}", price);
                    }
                }
                Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                Message::Close(_) => return Ok(()),
                _ => {}
            }
        }
    }

    /// Read the two subscription confirmations and map the server-assigned
    /// ids back to vault sides.
    async fn confirm_subscriptions<R>(&self, read: &mut R) -> std::result::Result<SubscriptionMap, WatchError>
    where
        R: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
    {
        let mut subs = SubscriptionMap::default();
        while subs.len() < 2 {
            let msg = timeout(self.config.subscribe_timeout, read.next())
                .await
                .map_err(|_| WatchError::ReadTimeout(self.config.subscribe_timeout))?
                .ok_or(WatchError::Closed)??;
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => return Err(WatchError::Closed),
                _ => continue,
            };
            let (id, sub_id) = parse_confirmation(&text).ok_or_else(|| {
                WatchError::Protocol(format!("invalid subscription response: {}", text))
            })?;
            let side = match id {
                1 => VaultSide::Base,
                2 => VaultSide::Quote,
                other => {
                    return Err(WatchError::Protocol(format!(
                        "unexpected request id {} in confirmation",
                        other
                    )))
                }
            };
            subs.insert(sub_id, side);
        }
        Ok(subs)
    }
}

/// Extract `(request id, subscription id)` from a subscribe confirmation.
fn parse_confirmation(text: &str) -> Option<(u64, u64)> {
    let msg: Value = serde_json::from_str(text).ok()?;
    let id = msg.get("id")?.as_u64()?;
    let sub_id = msg.get("result")?.as_u64()?;
    Some((id, sub_id))
}

/// Feed one text frame through the decoder and price calculator.
///
/// Frames that are not account notifications, or whose subscription id is
/// unrecognized, are ignored. An undecodable vault payload drops that update
/// only. A notification that does not carry the expected fields at all is a
/// protocol error and tears the connection down.
fn handle_notification(
    text: &str,
    subs: &SubscriptionMap,
    vaults: &mut VaultState,
    pricing: &PoolPricing,
) -> std::result::Result<Option<Decimal>, WatchError> {
    let msg: Value = serde_json::from_str(text)
        .map_err(|e| WatchError::Protocol(format!("unparseable message: {}", e)))?;
    if msg.get("method").and_then(Value::as_str) != Some("accountNotification") {
        return Ok(None);
    }
    let params = msg
        .get("params")
        .ok_or_else(|| WatchError::Protocol("notification without params".to_string()))?;
    let sub_id = params
        .get("subscription")
        .and_then(Value::as_u64)
        .ok_or_else(|| WatchError::Protocol("notification without subscription id".to_string()))?;
    let Some(side) = subs.side(sub_id) else {
        log::debug!("Ignoring notification for unknown subscription {}", sub_id);
        return Ok(None);
    };
    let payload = params
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.get("data"))
        .and_then(|d| d.get(0))
        .and_then(Value::as_str)
        .ok_or_else(|| WatchError::Protocol("notification without account data".to_string()))?;

    let raw = match BASE64.decode(payload) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Dropping vault update with invalid base64: {}", e);
            return Ok(None);
        }
    };
    let record = match decode_token_account(&raw) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("Dropping undecodable vault update: {}", e);
            return Ok(None);
        }
    };

    vaults.record(side, record.amount);
    Ok(vaults.price(pricing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::NATIVE_MINT;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn pricing() -> PoolPricing {
        PoolPricing {
            base_mint: NATIVE_MINT,
            base_decimals: 9,
            quote_decimals: 6,
        }
    }

    fn subs() -> SubscriptionMap {
        let mut subs = SubscriptionMap::default();
        subs.insert(11, VaultSide::Base);
        subs.insert(22, VaultSide::Quote);
        subs
    }

    fn notification(sub_id: u64, amount: u64) -> String {
        let mut data = vec![0u8; 165];
        data[64..72].copy_from_slice(&amount.to_le_bytes());
        json!({
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "subscription": sub_id,
                "result": {
                    "context": { "slot": 1 },
                    "value": { "data": [BASE64.encode(&data), "base64"] }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(16));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn non_notification_messages_are_ignored() {
        let mut vaults = VaultState::default();
        let confirmation = r#"{"jsonrpc":"2.0","id":1,"result":11}"#;
        let out = handle_notification(confirmation, &subs(), &mut vaults, &pricing()).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn unknown_subscription_is_ignored_and_does_not_mutate_state() {
        let mut vaults = VaultState::default();
        let out =
            handle_notification(&notification(99, 1), &subs(), &mut vaults, &pricing()).unwrap();
        assert_eq!(out, None);

        // A later quote update alone must still not produce a price: the
        // unknown-id message cannot have populated the base side.
        let out =
            handle_notification(&notification(22, 500), &subs(), &mut vaults, &pricing()).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn price_emitted_only_once_both_sides_are_known() {
        let mut vaults = VaultState::default();

        let out = handle_notification(
            &notification(11, 2_000_000_000),
            &subs(),
            &mut vaults,
            &pricing(),
        )
        .unwrap();
        assert_eq!(out, None);

        let out = handle_notification(
            &notification(22, 500_000_000),
            &subs(),
            &mut vaults,
            &pricing(),
        )
        .unwrap();
        assert_eq!(out, Some(Decimal::from_str("0.004").unwrap()));
    }

    #[test]
    fn short_payload_is_dropped_without_touching_state() {
        let mut vaults = VaultState::default();
        vaults.record(VaultSide::Quote, 500_000_000);

        let short = json!({
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "subscription": 11,
                "result": { "value": { "data": [BASE64.encode([0u8; 10]), "base64"] } }
            }
        })
        .to_string();
        let out = handle_notification(&short, &subs(), &mut vaults, &pricing()).unwrap();
        assert_eq!(out, None);
        assert_eq!(vaults.price(&pricing()), None);
    }

    #[test]
    fn malformed_notification_is_a_protocol_error() {
        let mut vaults = VaultState::default();
        let missing_sub = r#"{"jsonrpc":"2.0","method":"accountNotification","params":{}}"#;
        let err = handle_notification(missing_sub, &subs(), &mut vaults, &pricing()).unwrap_err();
        assert!(matches!(err, WatchError::Protocol(_)));

        let err = handle_notification("not json", &subs(), &mut vaults, &pricing()).unwrap_err();
        assert!(matches!(err, WatchError::Protocol(_)));
    }

    #[test]
    fn parses_subscription_confirmations() {
        assert_eq!(
            parse_confirmation(r#"{"jsonrpc":"2.0","id":2,"result":4021}"#),
            Some((2, 4021))
        );
        assert_eq!(parse_confirmation(r#"{"jsonrpc":"2.0","id":1}"#), None);
        assert_eq!(
            parse_confirmation(r#"{"jsonrpc":"2.0","id":1,"result":"nope"}"#),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = with_retries(3, "test op", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("transient failure")
                }
                Ok(42u32)
            }
        })
        .await;
        assert_eq!(out, Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = with_retries::<u32, _, _>(3, "test op", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("permanent failure")
            }
        })
        .await;
        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    #[ignore] // Requires RPC connection
    async fn resolves_live_pool() {
        dotenv::dotenv().ok();
        let mut config = WatcherConfig::default();
        if let Ok(url) = std::env::var("SOLANA_RPC_URL") {
            config.rpc_endpoint = url;
        }
        let watcher = PoolWatcher::new(config);
        let pool = Pubkey::from_str("5fo6rn6t8697uHE744utJ9rs4HvPq9yzt8FeiFM641QW").unwrap();
        let session = watcher.resolve(pool).await.expect("pool should resolve");
        assert_ne!(session.base_vault, session.quote_vault);
    }
}
