//! Write transactions.

use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};

/// Opens a transaction that holds the store's write lock before its first read.
///
/// `SQLite` starts transactions deferred. A transaction that reads and then
/// writes fails with `SQLITE_BUSY` without waiting once another connection has
/// committed in between. Taking the lock with the first statement makes
/// concurrent writers queue on the busy timeout instead, and every read that
/// follows sees the latest committed state.
pub(crate) async fn begin_write(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let txn = db.begin().await?;
    if txn.get_database_backend() == DatabaseBackend::Sqlite {
        // matches no row; the statement still acquires the RESERVED lock
        txn.execute_unprepared("UPDATE wallets SET id = id WHERE 0").await?;
    }
    Ok(txn)
}
