use alloy_primitives::{Address, B256, U256};
use bookwire_instrument::{ChainId, OrderKind, OrderStatus, Side};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Block metadata attached to every decoded log.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct BlockMeta {
    pub number: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

/// Transaction metadata attached to every decoded log.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TransactionMeta {
    pub hash: B256,
    pub from: Address,
}

/// Log position metadata attached to every decoded log.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct LogMeta {
    pub address: Address,
    pub log_index: u64,
}

/// Everything the indexer supplies alongside the decoded arguments.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct EventContext {
    pub block: BlockMeta,
    pub transaction: TransactionMeta,
    pub log: LogMeta,
    pub chain: ChainId,
}

/// One decoded blockchain log event, as delivered by the indexer in block /
/// log order.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct IndexedEvent {
    pub context: EventContext,
    pub args: EventArgs,
}

/// Decoded arguments per event kind.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum EventArgs {
    PoolCreated(PoolCreatedArgs),
    OrderPlaced(OrderPlacedArgs),
    OrderMatched(OrderMatchedArgs),
    OrderCancelled(OrderCancelledArgs),
    OrderUpdated(OrderUpdatedArgs),
    Deposit(BalanceChangeArgs),
    Withdrawal(BalanceChangeArgs),
    Lock(BalanceChangeArgs),
    Unlock(BalanceChangeArgs),
    TransferFrom(TransferArgs),
    TransferLockedFrom(TransferArgs),
    Faucet(BalanceChangeArgs),
}

/// Currency metadata carried by a [`PoolCreatedArgs`].
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct CurrencyMeta {
    pub address: Address,
    pub symbol: SmolStr,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct PoolCreatedArgs {
    pub pool: Address,
    pub order_book: Address,
    pub base: CurrencyMeta,
    pub quote: CurrencyMeta,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderPlacedArgs {
    pub pool: Address,
    pub order_id: U256,
    pub user: Address,
    pub side: Side,
    pub kind: OrderKind,
    pub price: U256,
    pub quantity: U256,
    pub status: OrderStatus,
    pub expiry: Option<u64>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderMatchedArgs {
    pub pool: Address,
    pub buy_order_id: U256,
    pub sell_order_id: U256,
    pub execution_price: U256,
    pub executed_quantity: U256,
    /// The aggressing side of this match.
    pub taker_side: Side,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderCancelledArgs {
    pub pool: Address,
    pub order_id: U256,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderUpdatedArgs {
    pub pool: Address,
    pub order_id: U256,
    pub status: OrderStatus,
}

/// A single-account balance mutation (deposit, withdrawal, lock, unlock,
/// faucet drip).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct BalanceChangeArgs {
    pub user: Address,
    pub currency: Address,
    pub amount: U256,
}

/// A two-account balance movement.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TransferArgs {
    pub from: Address,
    pub to: Address,
    pub currency: Address,
    pub amount: U256,
}
