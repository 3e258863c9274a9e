//! Proof storage trait.
//!
//! The proof store is the wallet's durable ledger of owned ecash. Every
//! proof carries a spend state; transitions over a batch of proofs are
//! all-or-nothing.

use pocket_types::{CurrencyUnit, Proof, ProofId, ProofState};

use crate::StoreError;

/// Trait for the durable proof ledger.
pub trait ProofStore {
    /// Atomically persist new proofs with the given state.
    ///
    /// Fails with [`StoreError::Duplicate`] if any proof with the same
    /// secret/keyset identity already exists; in that case nothing is
    /// written.
    fn insert_proofs(&self, proofs: Vec<Proof>, state: ProofState) -> Result<(), StoreError>;

    /// Proofs whose state is in `states` (all states if `None`), optionally
    /// restricted to one currency unit. Order is unspecified but stable
    /// within a single call.
    fn get_proofs(
        &self,
        unit: Option<&CurrencyUnit>,
        states: Option<&[ProofState]>,
    ) -> Result<Vec<(Proof, ProofState)>, StoreError>;

    /// Look up specific proofs by id. Missing ids are simply absent from
    /// the result.
    fn get_proofs_by_ids(&self, ids: &[ProofId]) -> Result<Vec<(Proof, ProofState)>, StoreError>;

    /// Atomically transition every listed proof to `state`, returning the
    /// prior state of each (in input order).
    ///
    /// The whole batch fails — leaving every proof untouched — if any id is
    /// missing ([`StoreError::NotFound`]) or any transition is invalid per
    /// [`ProofState::can_transition_to`] ([`StoreError::InvalidTransition`]).
    fn update_proofs_state(
        &self,
        ids: &[ProofId],
        state: ProofState,
    ) -> Result<Vec<ProofState>, StoreError>;

    /// Remove proofs outright (used when a swap replaces them).
    fn remove_proofs(&self, ids: &[ProofId]) -> Result<(), StoreError>;
}
