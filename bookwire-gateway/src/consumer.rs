//! Stream consumer: consumer-group lifecycle plus the read → dispatch → ack
//! loop feeding the WebSocket fan-out.

use crate::{
    error::GatewayError,
    registry::Registry,
    wire::{
        BalanceUpdateFrame, DepthFrame, ExecutionReportFrame, KlineFrame, MiniTickerFrame,
        TradeFrame, envelope,
    },
};
use bookwire_data::record::{
    BalanceRecord, DepthRecord, ExecutionReportRecord, KlinesStreamRecord, TradeRecord,
    consumed_stream_keys, stream_name,
};
use bookwire_instrument::{ChainId, symbol::lowercase_address};
use bookwire_integration::{
    codec::FieldMap,
    error::BusError,
    stream::{Record, StreamBus},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Consumer-group reader translating stream records into wire frames.
///
/// Delivery is at-least-once: a record is acked only after its frame has
/// been handed to the registry, and unacked records are redelivered to the
/// next consumer of the group.
#[derive(Debug)]
pub struct EventConsumer<Bus> {
    bus: Arc<Bus>,
    registry: Arc<Registry>,
    chain: ChainId,
    group: String,
    consumer_id: String,
    batch_size: usize,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl<Bus> EventConsumer<Bus>
where
    Bus: StreamBus,
{
    pub fn new(
        bus: Arc<Bus>,
        registry: Arc<Registry>,
        chain: ChainId,
        group: impl Into<String>,
        consumer_id: impl Into<String>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            bus,
            registry,
            chain,
            group: group.into(),
            consumer_id: consumer_id.into(),
            batch_size,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The default group name for a chain: `websocket-consumers-<chainId>`,
    /// letting multi-chain deployments scale independently.
    pub fn default_group(chain: ChainId) -> String {
        format!("websocket-consumers-{}", chain.0)
    }

    /// Handle used to stop a running consumer.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Reconcile consumer groups with the streams that actually exist: an
    /// existing stream gets its group ensured (idempotent); a stale group on
    /// a missing stream is destroyed so it cannot stall a fresh deployment
    /// after a data reset.
    pub async fn init_groups(&self) -> Result<(), BusError> {
        for key in consumed_stream_keys(self.chain) {
            if self.bus.stream_exists(&key).await? {
                self.bus.create_group(&key, &self.group, false).await?;
                debug!(stream = %key, group = %self.group, "consumer group ready");
            } else {
                self.bus.destroy_group(&key, &self.group).await?;
                debug!(stream = %key, "destroyed orphan group for missing stream");
            }
        }
        Ok(())
    }

    /// Run the read → dispatch → ack loop until stopped.
    pub async fn run(&self) {
        self.running.store(true, Ordering::Release);
        let keys = consumed_stream_keys(self.chain);
        let block = self
            .poll_interval
            .checked_div(keys.len() as u32)
            .unwrap_or(self.poll_interval)
            .max(Duration::from_millis(10));
        info!(
            chain = %self.chain,
            group = %self.group,
            consumer = %self.consumer_id,
            "event consumer started"
        );

        while self.running.load(Ordering::Acquire) {
            let mut delivered = false;
            for key in &keys {
                if !self.running.load(Ordering::Acquire) {
                    break;
                }
                match self.read_one(key, block).await {
                    Ok(true) => {
                        delivered = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(error) => {
                        error!(stream = %key, %error, "stream read failed");
                        tokio::time::sleep(self.poll_interval).await;
                        break;
                    }
                }
            }
            // Nothing to do yet (streams absent or empty): idle for one
            // block interval instead of spinning.
            if !delivered {
                tokio::time::sleep(block).await;
            }
        }
        info!(chain = %self.chain, "event consumer stopped");
    }

    /// Read one batch from `key`; true when records were dispatched.
    async fn read_one(&self, key: &str, block: Duration) -> Result<bool, BusError> {
        if !self.bus.stream_exists(key).await? {
            return Ok(false);
        }

        let keys = [key.to_string()];
        let batches = match self
            .bus
            .read_group(&self.group, &self.consumer_id, &keys, self.batch_size, block)
            .await
        {
            Ok(batches) => batches,
            // The stream appeared after startup: create its group and retry
            // on the next cycle.
            Err(BusError::GroupNotFound { .. }) => {
                self.bus.create_group(key, &self.group, true).await?;
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        let mut delivered = false;
        for batch in batches {
            for Record { id, fields } in batch.records {
                match self.dispatch(key, &fields) {
                    Ok(()) => {
                        self.bus.ack(key, &self.group, &id).await?;
                        delivered = true;
                    }
                    Err(error) => {
                        // Not acked: redelivered to the next consumer.
                        warn!(stream = %key, record = %id, %error, "dispatch failed");
                    }
                }
            }
        }
        Ok(delivered)
    }

    /// Translate one record into its wire frame and route it.
    fn dispatch(&self, stream_key: &str, fields: &FieldMap) -> Result<(), GatewayError> {
        let name = stream_key.rsplit(':').next().unwrap_or(stream_key);
        match name {
            stream_name::TRADES => {
                let record = TradeRecord::decode(fields)?;
                let stream = format!("{}@trade", record.symbol);
                self.registry
                    .broadcast_to_stream(&stream, &envelope(stream.clone(), TradeFrame::from(&record)));
            }
            stream_name::DEPTH => {
                let record = DepthRecord::decode(fields)?;
                let stream = format!("{}@depth", record.symbol);
                self.registry
                    .broadcast_to_stream(&stream, &envelope(stream.clone(), DepthFrame::from(&record)));
            }
            stream_name::KLINES => match KlinesStreamRecord::decode(fields)? {
                KlinesStreamRecord::Kline(record) => {
                    let stream = format!("{}@kline_{}", record.symbol, record.interval);
                    self.registry.broadcast_to_stream(
                        &stream,
                        &envelope(stream.clone(), KlineFrame::from(&record)),
                    );
                }
                KlinesStreamRecord::MiniTicker(record) => {
                    let stream = format!("{}@miniTicker", record.symbol);
                    self.registry.broadcast_to_stream(
                        &stream,
                        &envelope(stream.clone(), MiniTickerFrame::from(&record)),
                    );
                }
            },
            stream_name::EXECUTION_REPORTS => {
                let record = ExecutionReportRecord::decode(fields)?;
                let payload = serde_json::to_string(&ExecutionReportFrame::from(&record))
                    .expect("wire frames are always serialisable");
                self.registry
                    .send_to_user(&lowercase_address(&record.user), &payload);
            }
            stream_name::BALANCES => {
                let record = BalanceRecord::decode(fields)?;
                let payload = serde_json::to_string(&BalanceUpdateFrame::from(&record))
                    .expect("wire frames are always serialisable");
                self.registry
                    .send_to_user(&lowercase_address(&record.user), &payload);
            }
            other => {
                warn!(stream = %other, "record on unrecognised stream");
            }
        }
        Ok(())
    }
}
