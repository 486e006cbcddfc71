//! Wallet ledger business logic - Charges, debits, refunds and ledger reads.
//!
//! Every balance change runs inside one database transaction together with the
//! ledger entry that records it, so a balance never moves without a matching
//! entry and vice versa. The arithmetic itself is done by the store
//! (`balance = balance + amount`), and debits carry a `balance >= amount`
//! predicate, so two writers on the same wallet can never interleave a stale
//! read with a write. `balance_after` is read back inside the same transaction.
//!
//! The `*_in` variants run on a caller-supplied connection or transaction and
//! are what the order pipeline composes into its own atomic unit.

use crate::{
    core::{
        pricing::cents_to_decimal, retry::expect_single_row, store::begin_write,
        user::require_user,
    },
    entities::{Transaction, Wallet, transaction, wallet},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info};

/// Kind of a ledger entry, stored in `transactions.transaction_type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Charge,
    Consume,
    Refund,
}

/// Finds the wallet owned by `user_id`.
pub async fn find_wallet<C>(db: &C, user_id: &str) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_wallet<C>(db: &C, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    find_wallet(db, user_id)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            user_id: user_id.to_string(),
        })
}

async fn reload_wallet<C>(db: &C, wallet_id: i64, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            user_id: user_id.to_string(),
        })
}

/// Adds `amount_delta` to the wallet balance in a single `UPDATE`.
///
/// Negative deltas only apply while the balance covers them; if the row no
/// longer satisfies the predicate the write is reported as a [`Error::Conflict`].
async fn apply_balance_delta<C>(db: &C, wallet: &wallet::Model, amount_delta: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = Wallet::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).add(amount_delta),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(wallet::Column::Id.eq(wallet.id));
    if amount_delta < 0 {
        update = update.filter(wallet::Column::Balance.gte(-amount_delta));
    }

    let result = update.exec(db).await?;
    expect_single_row(result.rows_affected, &format!("wallet {}", wallet.id))
}

async fn append_entry<C>(
    db: &C,
    wallet: &wallet::Model,
    transaction_type: TransactionType,
    amount: i64,
    order_id: Option<&str>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let entry = transaction::ActiveModel {
        wallet_id: Set(wallet.id),
        transaction_type: Set(transaction_type.to_string()),
        amount: Set(amount),
        balance_after: Set(wallet.balance),
        order_id: Set(order_id.map(ToString::to_string)),
        remark: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    entry.insert(db).await.map_err(Into::into)
}

/// Creates the user's wallet holding `amount`.
///
/// Losing the unique(user_id) race to a concurrent first charge is a
/// [`Error::Conflict`]: the retried charge finds the wallet and credits it.
async fn insert_wallet<C>(db: &C, user_id: &str, amount: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    wallet::ActiveModel {
        user_id: Set(user_id.to_string()),
        balance: Set(amount),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| match Error::from(err) {
        Error::AlreadyExists { message } => Error::Conflict { message },
        other => other,
    })
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Credits `amount` cents to the user's wallet, creating the wallet on first use.
///
/// Runs on `db` without opening a transaction of its own.
pub async fn charge_in<C>(db: &C, user_id: &str, amount: i64) -> Result<(i64, transaction::Model)>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;
    require_user(db, user_id).await?;

    let wallet = match find_wallet(db, user_id).await? {
        Some(existing) => {
            if existing.balance.checked_add(amount).is_none() {
                return Err(Error::InvalidAmount { amount });
            }
            apply_balance_delta(db, &existing, amount).await?;
            reload_wallet(db, existing.id, user_id).await?
        }
        None => insert_wallet(db, user_id, amount).await?,
    };

    let entry = append_entry(db, &wallet, TransactionType::Charge, amount, None).await?;
    Ok((wallet.balance, entry))
}

/// Debits `amount` cents for `order_id`. Never takes the balance below zero.
///
/// Runs on `db` without opening a transaction of its own.
pub async fn debit_in<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    order_id: &str,
) -> Result<(i64, transaction::Model)>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;
    let wallet = require_wallet(db, user_id).await?;

    if wallet.balance < amount {
        return Err(Error::InsufficientFunds {
            current: cents_to_decimal(wallet.balance),
            required: cents_to_decimal(amount),
        });
    }

    apply_balance_delta(db, &wallet, -amount).await?;
    let wallet = reload_wallet(db, wallet.id, user_id).await?;
    let entry =
        append_entry(db, &wallet, TransactionType::Consume, -amount, Some(order_id)).await?;
    Ok((wallet.balance, entry))
}

/// Credits `amount` cents back for `order_id`.
///
/// Runs on `db` without opening a transaction of its own.
pub async fn refund_in<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    order_id: &str,
) -> Result<(i64, transaction::Model)>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;
    require_user(db, user_id).await?;
    let wallet = require_wallet(db, user_id).await?;

    apply_balance_delta(db, &wallet, amount).await?;
    let wallet = reload_wallet(db, wallet.id, user_id).await?;
    let entry = append_entry(db, &wallet, TransactionType::Refund, amount, Some(order_id)).await?;
    Ok((wallet.balance, entry))
}

/// Charges a wallet as one atomic unit.
///
/// Returns the new balance and the `charge` ledger entry.
///
/// # Errors
/// - [`Error::InvalidAmount`] if `amount <= 0`
/// - [`Error::UserNotFound`] if the user does not exist
pub async fn charge(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
) -> Result<(i64, transaction::Model)> {
    let txn = begin_write(db).await?;
    let (balance, entry) = charge_in(&txn, user_id, amount).await?;
    txn.commit().await?;

    info!(user_id, amount, balance, entry_id = entry.id, "wallet charged");
    Ok((balance, entry))
}

/// Debits a wallet as one atomic unit.
///
/// # Errors
/// - [`Error::InvalidAmount`] if `amount <= 0`
/// - [`Error::WalletNotFound`] if the user has no wallet
/// - [`Error::InsufficientFunds`] if the balance does not cover `amount`
pub async fn debit(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    order_id: &str,
) -> Result<(i64, transaction::Model)> {
    let txn = begin_write(db).await?;
    let (balance, entry) = debit_in(&txn, user_id, amount, order_id).await?;
    txn.commit().await?;

    info!(user_id, amount, balance, order_id, "wallet debited");
    Ok((balance, entry))
}

/// Refunds into a wallet as one atomic unit.
pub async fn refund(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    order_id: &str,
) -> Result<(i64, transaction::Model)> {
    let txn = begin_write(db).await?;
    let (balance, entry) = refund_in(&txn, user_id, amount, order_id).await?;
    txn.commit().await?;

    info!(user_id, amount, balance, order_id, "wallet refunded");
    Ok((balance, entry))
}

/// Loads the user's wallet.
pub async fn get_wallet(db: &DatabaseConnection, user_id: &str) -> Result<wallet::Model> {
    require_wallet(db, user_id).await
}

/// Lists the user's ledger entries in creation order.
pub async fn get_ledger(db: &DatabaseConnection, user_id: &str) -> Result<Vec<transaction::Model>> {
    let wallet = require_wallet(db, user_id).await?;
    let entries = Transaction::find()
        .filter(transaction::Column::WalletId.eq(wallet.id))
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    debug!(user_id, entries = entries.len(), "ledger loaded");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_amount_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        assert!(matches!(
            charge_in(&db, "u1", 0).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            debit_in(&db, "u1", -5, "o1").await,
            Err(Error::InvalidAmount { amount: -5 })
        ));
        assert!(matches!(
            refund_in(&db, "u1", 0, "o1").await,
            Err(Error::InvalidAmount { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_first_charge_creates_wallet() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "u1").await?;

        let (balance, entry) = charge(&db, "u1", 5_000).await?;
        assert_eq!(balance, 5_000);
        assert_eq!(entry.transaction_type, "charge");
        assert_eq!(entry.amount, 5_000);
        assert_eq!(entry.balance_after, 5_000);
        assert!(entry.order_id.is_none());

        let (balance, entry) = charge(&db, "u1", 250).await?;
        assert_eq!(balance, 5_250);
        assert_eq!(entry.balance_after, 5_250);

        let wallets = Wallet::find().all(&db).await?;
        assert_eq!(wallets.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_charge_unknown_user() -> Result<()> {
        let db = setup_test_db().await?;

        let result = charge(&db, "ghost", 100).await;
        assert!(matches!(result, Err(Error::UserNotFound { .. })));
        assert!(Wallet::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_debit_without_wallet() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "u1").await?;

        let result = debit(&db, "u1", 100, "o1").await;
        assert!(matches!(result, Err(Error::WalletNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_debit_rejects_one_cent_over_balance() -> Result<()> {
        let db = setup_with_funded_user("u1", 1_000).await?;

        let err = debit(&db, "u1", 1_001, "o1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient funds: current balance 10.00, required 10.01"
        );

        assert_eq!(get_wallet(&db, "u1").await?.balance, 1_000);
        assert_eq!(get_ledger(&db, "u1").await?.len(), 1);

        // the exact balance is still spendable
        let (balance, entry) = debit(&db, "u1", 1_000, "o1").await?;
        assert_eq!(balance, 0);
        assert_eq!(entry.amount, -1_000);
        assert_eq!(entry.transaction_type, "consume");
        assert_eq!(entry.order_id.as_deref(), Some("o1"));

        Ok(())
    }

    #[tokio::test]
    async fn test_refund_credits_wallet() -> Result<()> {
        let db = setup_with_funded_user("u1", 1_000).await?;
        debit(&db, "u1", 400, "o1").await?;

        let (balance, entry) = refund(&db, "u1", 400, "o1").await?;
        assert_eq!(balance, 1_000);
        assert_eq!(entry.transaction_type, "refund");
        assert_eq!(entry.balance_after, 1_000);

        Ok(())
    }

    /// Runs ten charges and ten debits against one wallet at once and checks the
    /// ledger replays to the final balance.
    async fn assert_interleaved_writes_reconstruct_balance(db: DatabaseConnection) -> Result<()> {
        create_test_user(&db, "u1").await?;
        charge(&db, "u1", 1_000).await?;
        let db = Arc::new(db);

        let mut handles = Vec::new();
        for i in 0..20_i64 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    charge(&db, "u1", 100 + i).await.map(|_| 100 + i)
                } else {
                    debit(&db, "u1", 300, &format!("o{i}")).await.map(|_| -300)
                }
            }));
        }

        let mut expected = 1_000;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(delta) => expected += delta,
                Err(Error::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let wallet = get_wallet(&db, "u1").await?;
        assert_eq!(wallet.balance, expected);
        assert!(wallet.balance >= 0);

        // replaying the ledger in creation order reproduces every balance_after
        let mut running = 0;
        for entry in get_ledger(&db, "u1").await? {
            running += entry.amount;
            assert_eq!(entry.balance_after, running);
            assert!(entry.balance_after >= 0);
        }
        assert_eq!(running, wallet.balance);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_charges_and_debits_reconstruct_balance() -> Result<()> {
        assert_interleaved_writes_reconstruct_balance(setup_test_db().await?).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_writes_across_pooled_connections() -> Result<()> {
        let (db, _dir) = setup_file_db(8).await?;
        assert_interleaved_writes_reconstruct_balance(db).await
    }

    #[tokio::test]
    async fn test_second_wallet_insert_is_retryable_conflict() -> Result<()> {
        let db = setup_with_funded_user("u1", 100).await?;

        // what a concurrent first charge sees after the other one committed
        let err = insert_wallet(&db, "u1", 50).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(err.is_transient());
        assert_eq!(get_wallet(&db, "u1").await?.balance, 100);

        Ok(())
    }
}
