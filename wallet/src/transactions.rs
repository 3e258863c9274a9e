//! Transaction ledger — the wallet's history of value movements.

use std::collections::HashMap;
use std::sync::Arc;

use pocket_store::WalletDatabase;
use pocket_types::{
    Amount, CurrencyUnit, ProofId, ProofState, Timestamp, Transaction, TransactionDirection,
    TransactionId,
};

use crate::error::WalletError;
use crate::proofs::ProofLedger;

/// Records and reverts wallet transactions.
#[derive(Clone)]
pub struct TransactionLedger {
    db: Arc<dyn WalletDatabase>,
    proofs: ProofLedger,
}

impl TransactionLedger {
    pub fn new(db: Arc<dyn WalletDatabase>, proofs: ProofLedger) -> Self {
        Self { db, proofs }
    }

    /// Record a transaction. The id is derived from the proof set, direction
    /// and unit, so re-recording the same movement overwrites in place
    /// instead of duplicating history.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        direction: TransactionDirection,
        amount: Amount,
        fee: Amount,
        unit: CurrencyUnit,
        proof_ids: Vec<ProofId>,
        memo: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<Transaction, WalletError> {
        let tx = Transaction::new(
            direction,
            amount,
            fee,
            unit,
            proof_ids,
            memo,
            metadata,
            Timestamp::now(),
        );
        self.db.put_transaction(&tx)?;
        tracing::debug!(id = %tx.id, direction = ?tx.direction, amount = %tx.amount, "recorded transaction");
        Ok(tx)
    }

    pub fn get(&self, id: &TransactionId) -> Result<Option<Transaction>, WalletError> {
        Ok(self.db.get_transaction(id)?)
    }

    /// Most recent first, optionally filtered by direction.
    pub fn list(
        &self,
        direction: Option<TransactionDirection>,
    ) -> Result<Vec<Transaction>, WalletError> {
        Ok(self.db.list_transactions(direction)?)
    }

    /// Undo an outgoing transaction whose proofs are still in flight.
    ///
    /// Revert requires every referenced proof to still exist and sit in a
    /// state restorable to `Unspent`; a proof consumed by a later swap or
    /// melt makes the whole transaction non-revertible.
    pub fn revert(&self, id: &TransactionId) -> Result<(), WalletError> {
        let tx = self
            .db
            .get_transaction(id)?
            .ok_or(WalletError::TransactionNotFound)?;
        if tx.direction != TransactionDirection::Outgoing {
            return Err(WalletError::TransactionNotRevertible(
                "only outgoing transactions can be reverted".into(),
            ));
        }

        let held = self.db.get_proofs_by_ids(&tx.proof_ids)?;
        if held.len() != tx.proof_ids.len() {
            return Err(WalletError::TransactionNotRevertible(
                "referenced proofs no longer exist".into(),
            ));
        }
        for (proof, state) in &held {
            if !state.can_transition_to(ProofState::Unspent) {
                return Err(WalletError::TransactionNotRevertible(format!(
                    "proof {} is {state} and cannot be restored",
                    proof.id()
                )));
            }
        }

        self.proofs.release(&tx.proof_ids)?;
        self.db.delete_transaction(id)?;
        tracing::info!(id = %tx.id, amount = %tx.amount, "reverted transaction");
        Ok(())
    }
}
