use super::{Reducer, ms};
use crate::{
    entity::{Balance, EntityId},
    error::DataError,
    event::{BalanceChangeArgs, EventContext, TransferArgs},
    id,
    record::{BalanceRecord, stream_name},
    store::EntityStore,
};
use alloy_primitives::{Address, U256};
use bookwire_integration::stream::StreamBus;

/// Which bucket of a balance a mutation touches.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum BalanceOp {
    /// available += amount (deposits, faucet drips)
    Credit,
    /// available -= amount (withdrawals)
    Debit,
    /// available -= amount, locked += amount
    Lock,
    /// locked -= amount, available += amount
    Unlock,
}

impl<Store, Bus> Reducer<Store, Bus>
where
    Store: EntityStore,
    Bus: StreamBus,
{
    pub(super) async fn handle_credit(
        &self,
        ctx: &EventContext,
        args: &BalanceChangeArgs,
    ) -> Result<(), DataError> {
        self.apply_balance_op(ctx, args, BalanceOp::Credit).await
    }

    pub(super) async fn handle_withdrawal(
        &self,
        ctx: &EventContext,
        args: &BalanceChangeArgs,
    ) -> Result<(), DataError> {
        self.apply_balance_op(ctx, args, BalanceOp::Debit).await
    }

    pub(super) async fn handle_lock(
        &self,
        ctx: &EventContext,
        args: &BalanceChangeArgs,
    ) -> Result<(), DataError> {
        self.apply_balance_op(ctx, args, BalanceOp::Lock).await
    }

    pub(super) async fn handle_unlock(
        &self,
        ctx: &EventContext,
        args: &BalanceChangeArgs,
    ) -> Result<(), DataError> {
        self.apply_balance_op(ctx, args, BalanceOp::Unlock).await
    }

    /// Move `amount` between two users: from the sender's available (or
    /// locked, for `TransferLockedFrom`) into the recipient's available.
    pub(super) async fn handle_transfer(
        &self,
        ctx: &EventContext,
        args: &TransferArgs,
        from_locked: bool,
    ) -> Result<(), DataError> {
        if args.amount.is_zero() {
            return Err(DataError::MalformedEvent { field: "amount" });
        }
        let ts = ctx.block.timestamp;

        let mut sender = self
            .load_or_seed_balance(ctx, &args.from, &args.currency)
            .await?;
        if from_locked {
            sender.locked = checked_debit(sender.locked, args.amount)?;
        } else {
            sender.available = checked_debit(sender.available, args.amount)?;
        }
        sender.last_updated = ts;
        self.store.put_balance(sender.clone()).await?;

        let mut recipient = self
            .load_or_seed_balance(ctx, &args.to, &args.currency)
            .await?;
        recipient.available = recipient.available.saturating_add(args.amount);
        recipient.last_updated = ts;
        self.store.put_balance(recipient.clone()).await?;

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                self.push_balance(ctx, &sender).await?;
                self.push_balance(ctx, &recipient).await
            })
            .await?;
        Ok(())
    }

    async fn apply_balance_op(
        &self,
        ctx: &EventContext,
        args: &BalanceChangeArgs,
        op: BalanceOp,
    ) -> Result<(), DataError> {
        if args.amount.is_zero() {
            return Err(DataError::MalformedEvent { field: "amount" });
        }

        let mut balance = self
            .load_or_seed_balance(ctx, &args.user, &args.currency)
            .await?;
        match op {
            BalanceOp::Credit => {
                balance.available = balance.available.saturating_add(args.amount);
            }
            BalanceOp::Debit => {
                balance.available = checked_debit(balance.available, args.amount)?;
            }
            BalanceOp::Lock => {
                balance.available = checked_debit(balance.available, args.amount)?;
                balance.locked = balance.locked.saturating_add(args.amount);
            }
            BalanceOp::Unlock => {
                balance.locked = checked_debit(balance.locked, args.amount)?;
                balance.available = balance.available.saturating_add(args.amount);
            }
        }
        balance.last_updated = ctx.block.timestamp;
        self.store.put_balance(balance.clone()).await?;

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                self.push_balance(ctx, &balance).await
            })
            .await?;
        Ok(())
    }

    async fn load_or_seed_balance(
        &self,
        ctx: &EventContext,
        user: &Address,
        currency: &Address,
    ) -> Result<Balance, DataError> {
        Ok(self
            .store
            .find_balance(ctx.chain, user, currency)
            .await?
            .unwrap_or_else(|| {
                Balance::empty(
                    EntityId::from(id::balance_id(ctx.chain, user, currency)),
                    ctx.chain,
                    *user,
                    *currency,
                )
            }))
    }

    async fn push_balance(&self, ctx: &EventContext, balance: &Balance) -> Result<(), DataError> {
        let asset = self
            .store
            .find_currency(ctx.chain, &balance.currency)
            .await?
            .map(|currency| currency.symbol.to_string())
            .unwrap_or_else(|| format!("{:#x}", balance.currency));

        let record = BalanceRecord {
            user: balance.user,
            asset,
            currency: balance.currency,
            available: balance.available,
            locked: balance.locked,
            ts: ms(balance.last_updated),
        };
        self.bus
            .append(&ctx.chain.stream_key(stream_name::BALANCES), record.encode())
            .await?;
        Ok(())
    }
}

/// Subtract with the no-negative-balances invariant: underflow means the
/// event disagrees with on-chain accounting and is rejected as malformed.
fn checked_debit(balance: U256, amount: U256) -> Result<U256, DataError> {
    balance
        .checked_sub(amount)
        .ok_or(DataError::MalformedEvent { field: "amount" })
}
