/*!
 * Transaction Helper Utilities
 *
 * Runs a unit of work inside one database transaction: commit on `Ok`,
 * rollback on `Err`, with the caller's error type preserved.
 */

pub use futures::future::BoxFuture;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};

/// Execute a function within a database transaction
///
/// The closure may only capture owned data; build repositories from the
/// `txn` argument inside it.
///
/// # Example
///
/// ```rust,ignore
/// use crate::db::transaction::with_transaction;
///
/// let line = with_transaction(&db, move |txn| {
///     Box::pin(async move {
///         CartRepository::new(txn).touch(cart_id).await?;
///         CartItemRepository::new(txn)
///             .upsert_line(cart_id, product_id, LineQuantity::Increment(1))
///             .await
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + From<DbErr> + Send,
{
    db.transaction(f).await.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}
