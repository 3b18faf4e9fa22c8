use crate::{
    depth::{DEPTH_SNAPSHOT_LEVELS, snapshot},
    entity::Pool,
    error::DataError,
    event::{EventArgs, EventContext, IndexedEvent},
    record::{DepthRecord, stream_name},
    store::EntityStore,
    sync::SyncGate,
};
use alloy_primitives::Address;
use bookwire_integration::stream::StreamBus;
use std::sync::Arc;
use tracing::{debug, warn};

mod balance;
mod market;

/// Deterministic reducer from decoded blockchain events to entity mutations
/// and stream appends.
///
/// Owns the store, stream bus and sync gate handles; events for a single
/// chain arrive serialized in block / log order, so per-event mutations are
/// linearizable. Durable writes always happen; stream appends are guarded by
/// the sync gate so historical backfill never emits live push records.
#[derive(Debug)]
pub struct Reducer<Store, Bus> {
    store: Arc<Store>,
    bus: Arc<Bus>,
    gate: Arc<SyncGate>,
}

impl<Store, Bus> Reducer<Store, Bus>
where
    Store: EntityStore,
    Bus: StreamBus,
{
    pub fn new(store: Arc<Store>, bus: Arc<Bus>, gate: Arc<SyncGate>) -> Self {
        Self { store, bus, gate }
    }

    /// Process one decoded event.
    ///
    /// Lookup misses (unknown pool / order) are logged and swallowed so the
    /// indexer keeps advancing; malformed events and infrastructure failures
    /// propagate for block-level retry.
    pub async fn process(&self, event: &IndexedEvent) -> Result<(), DataError> {
        let ctx = &event.context;
        debug!(
            chain = %ctx.chain,
            block = ctx.block.number,
            log_index = ctx.log.log_index,
            "processing event"
        );

        // Bracket the event in a store transaction so a mid-event failure
        // leaves no partial writes behind and the block can be retried
        // cleanly (at-least-once without double-applied rollups).
        self.store.begin().await?;
        let result = match &event.args {
            EventArgs::PoolCreated(args) => self.handle_pool_created(ctx, args).await,
            EventArgs::OrderPlaced(args) => self.handle_order_placed(ctx, args).await,
            EventArgs::OrderMatched(args) => self.handle_order_matched(ctx, args).await,
            EventArgs::OrderCancelled(args) => self.handle_order_cancelled(ctx, args).await,
            EventArgs::OrderUpdated(args) => self.handle_order_updated(ctx, args).await,
            EventArgs::Deposit(args) => self.handle_credit(ctx, args).await,
            EventArgs::Faucet(args) => self.handle_credit(ctx, args).await,
            EventArgs::Withdrawal(args) => self.handle_withdrawal(ctx, args).await,
            EventArgs::Lock(args) => self.handle_lock(ctx, args).await,
            EventArgs::Unlock(args) => self.handle_unlock(ctx, args).await,
            EventArgs::TransferFrom(args) => self.handle_transfer(ctx, args, false).await,
            EventArgs::TransferLockedFrom(args) => self.handle_transfer(ctx, args, true).await,
        };

        match result {
            Ok(()) => {
                self.store.commit().await?;
                Ok(())
            }
            Err(error) if error.is_recoverable() => {
                warn!(%error, block = ctx.block.number, "skipping event");
                self.store.commit().await?;
                Ok(())
            }
            Err(error) => {
                self.store.rollback().await?;
                Err(error)
            }
        }
    }

    /// Resolve the pool an event references, failing with `UnknownPool`.
    async fn require_pool(&self, ctx: &EventContext, address: &Address) -> Result<Pool, DataError> {
        self.store
            .find_pool(ctx.chain, address)
            .await?
            .ok_or(DataError::UnknownPool {
                chain: ctx.chain,
                address: *address,
            })
    }

    /// Append the current top-of-book snapshot for `pool` to the depth
    /// stream. Callers invoke this inside the sync gate only.
    async fn push_depth(&self, ctx: &EventContext, pool: &Pool, ts_ms: u64) -> Result<(), DataError> {
        let book = snapshot(self.store.as_ref(), &pool.address, DEPTH_SNAPSHOT_LEVELS).await?;
        let record = DepthRecord {
            symbol: pool.symbol(),
            ts: ts_ms,
            bids: book.bids,
            asks: book.asks,
        };
        self.bus
            .append(&ctx.chain.stream_key(stream_name::DEPTH), record.encode()?)
            .await?;
        Ok(())
    }

}

/// Milliseconds wire timestamp from unix seconds.
pub(crate) fn ms(ts_secs: u64) -> u64 {
    ts_secs * 1000
}
