//! Transaction ledger storage trait.

use pocket_types::{Transaction, TransactionDirection, TransactionId};

use crate::StoreError;

/// Trait for the append-only (but revertible) transaction ledger.
pub trait TransactionStore {
    /// Insert or replace a transaction. Replacing the same content-derived
    /// id is how re-recording stays idempotent.
    fn put_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Retrieve a transaction. Absence is a valid outcome, not an error.
    fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Transactions filtered by direction (all if `None`), most recent
    /// first.
    fn list_transactions(
        &self,
        direction: Option<TransactionDirection>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Delete a transaction record; [`StoreError::NotFound`] if absent.
    fn delete_transaction(&self, id: &TransactionId) -> Result<(), StoreError>;
}
