//! Price delivery seam between the streaming loop and the consumer.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

/// Receives every computed price, in arrival order.
///
/// The watcher awaits `on_price` before reading the next notification, so a
/// slow sink applies backpressure to the stream. A sink error ends the
/// session and is returned to the host; the watcher never swallows it.
#[async_trait]
pub trait PriceSink: Send {
    async fn on_price(&mut self, price: Decimal) -> Result<()>;
}

/// Forward prices into a channel; errors once the receiver is gone.
#[async_trait]
impl PriceSink for mpsc::Sender<Decimal> {
    async fn on_price(&mut self, price: Decimal) -> Result<()> {
        self.send(price)
            .await
            .map_err(|_| anyhow::anyhow!("price receiver dropped"))
    }
}

/// Sink that logs each price; what the CLI service runs with.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl PriceSink for LogSink {
    async fn on_price(&mut self, price: Decimal) -> Result<()> {
        log::info!("Live price: {}", price);
        Ok(())
    }
}
