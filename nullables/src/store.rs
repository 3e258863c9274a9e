//! Nullable store — thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use pocket_store::{KeysetStore, ProofStore, QuoteStore, StoreError, TransactionStore};
use pocket_types::{
    CurrencyUnit, Keyset, KeysetId, MeltQuote, MintQuote, Proof, ProofId, ProofState, Transaction,
    TransactionDirection, TransactionId,
};

#[derive(Default)]
struct Inner {
    proofs: HashMap<ProofId, (Proof, ProofState)>,
    mint_quotes: HashMap<String, MintQuote>,
    melt_quotes: HashMap<String, MeltQuote>,
    transactions: HashMap<TransactionId, (Transaction, u64)>,
    keysets: HashMap<KeysetId, Keyset>,
    counters: HashMap<KeysetId, u32>,
    /// Insertion sequence, so listing can order ties deterministically.
    seq: u64,
}

/// An in-memory wallet database for testing.
/// A single lock over all record families keeps batch operations atomic,
/// matching the transactional guarantees real backends provide.
#[derive(Default)]
pub struct NullStore {
    inner: Mutex<Inner>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored proofs, regardless of state (for assertions).
    pub fn proof_count(&self) -> usize {
        self.inner.lock().unwrap().proofs.len()
    }
}

impl ProofStore for NullStore {
    fn insert_proofs(&self, proofs: Vec<Proof>, state: ProofState) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for proof in &proofs {
            if inner.proofs.contains_key(&proof.id()) {
                return Err(StoreError::Duplicate(proof.id().to_string()));
            }
        }
        for proof in proofs {
            inner.proofs.insert(proof.id(), (proof, state));
        }
        Ok(())
    }

    fn get_proofs(
        &self,
        unit: Option<&CurrencyUnit>,
        states: Option<&[ProofState]>,
    ) -> Result<Vec<(Proof, ProofState)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut result: Vec<(Proof, ProofState)> = inner
            .proofs
            .values()
            .filter(|(proof, state)| {
                unit.is_none_or(|u| proof.unit == *u)
                    && states.is_none_or(|s| s.contains(state))
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.0.id().cmp(&b.0.id()));
        Ok(result)
    }

    fn get_proofs_by_ids(&self, ids: &[ProofId]) -> Result<Vec<(Proof, ProofState)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.proofs.get(id).cloned())
            .collect())
    }

    fn update_proofs_state(
        &self,
        ids: &[ProofId],
        state: ProofState,
    ) -> Result<Vec<ProofState>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        // Validate the whole batch before touching anything.
        let mut prior = Vec::with_capacity(ids.len());
        for id in ids {
            let (_, current) = inner
                .proofs
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if !current.can_transition_to(state) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: *current,
                    to: state,
                });
            }
            prior.push(*current);
        }
        for id in ids {
            if let Some(entry) = inner.proofs.get_mut(id) {
                entry.1 = state;
            }
        }
        Ok(prior)
    }

    fn remove_proofs(&self, ids: &[ProofId]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for id in ids {
            inner.proofs.remove(id);
        }
        Ok(())
    }
}

impl QuoteStore for NullStore {
    fn put_mint_quote(&self, quote: &MintQuote) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .mint_quotes
            .insert(quote.id.clone(), quote.clone());
        Ok(())
    }

    fn get_mint_quote(&self, id: &str) -> Result<MintQuote, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .mint_quotes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn remove_mint_quote(&self, id: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().mint_quotes.remove(id);
        Ok(())
    }

    fn put_melt_quote(&self, quote: &MeltQuote) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .melt_quotes
            .insert(quote.id.clone(), quote.clone());
        Ok(())
    }

    fn get_melt_quote(&self, id: &str) -> Result<MeltQuote, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .melt_quotes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get_melt_quotes(&self) -> Result<Vec<MeltQuote>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .melt_quotes
            .values()
            .cloned()
            .collect())
    }

    fn remove_melt_quote(&self, id: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().melt_quotes.remove(id);
        Ok(())
    }
}

impl TransactionStore for NullStore {
    fn put_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.seq += 1;
        let seq = inner.seq;
        inner
            .transactions
            .insert(transaction.id, (transaction.clone(), seq));
        Ok(())
    }

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .get(id)
            .map(|(tx, _)| tx.clone()))
    }

    fn list_transactions(
        &self,
        direction: Option<TransactionDirection>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(Transaction, u64)> = inner
            .transactions
            .values()
            .filter(|(tx, _)| direction.is_none_or(|d| tx.direction == d))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(entries.into_iter().map(|(tx, _)| tx).collect())
    }

    fn delete_transaction(&self, id: &TransactionId) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl KeysetStore for NullStore {
    fn put_keyset(&self, keyset: &Keyset) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .keysets
            .insert(keyset.id.clone(), keyset.clone());
        Ok(())
    }

    fn get_keyset(&self, id: &KeysetId) -> Result<Option<Keyset>, StoreError> {
        Ok(self.inner.lock().unwrap().keysets.get(id).cloned())
    }

    fn increment_keyset_counter(&self, id: &KeysetId, count: u32) -> Result<u32, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let counter = inner.counters.entry(id.clone()).or_insert(0);
        let first = *counter;
        *counter += count;
        Ok(first)
    }
}
