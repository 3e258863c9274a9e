//! Proof ledger — selection, reservation, and state transitions.
//!
//! Wraps the proof store with the engine's selection algorithm and the
//! serialization needed to keep concurrent operations from selecting
//! overlapping proofs: selection and the transition to `Pending` happen
//! atomically under one lock, so two concurrent sends over the same funds
//! can never both reserve the same proof.

use std::sync::Arc;
use tokio::sync::Mutex;

use pocket_store::WalletDatabase;
use pocket_types::{Amount, CurrencyUnit, Proof, ProofId, ProofState};

use crate::error::WalletError;
use crate::subscription::SubscriptionBus;

/// Constraints applied when selecting proofs for a send or melt.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionPolicy {
    /// The selection must sum to the target exactly.
    pub exact: bool,
    /// Permitted overshoot above the target when not exact.
    pub tolerance: Option<Amount>,
    /// Cover the per-input fee on top of the target.
    pub include_fee: bool,
    /// Fee per thousand inputs, from the active keyset.
    pub fee_ppk: u64,
    /// Upper bound on the number of proofs selected.
    pub max_proofs: Option<usize>,
}

impl SelectionPolicy {
    fn fee_for(&self, input_count: usize) -> Amount {
        if self.include_fee {
            Amount::new((self.fee_ppk * input_count as u64).div_ceil(1000))
        } else {
            Amount::ZERO
        }
    }
}

/// A reserved set of proofs, already transitioned to `Pending`.
#[derive(Clone, Debug)]
pub struct Selection {
    pub proofs: Vec<Proof>,
    pub total: Amount,
    /// Fee the selection covers on top of the requested amount.
    pub fee: Amount,
}

impl Selection {
    pub fn ids(&self) -> Vec<ProofId> {
        self.proofs.iter().map(Proof::id).collect()
    }
}

/// The wallet's view of its owned proofs.
#[derive(Clone)]
pub struct ProofLedger {
    db: Arc<dyn WalletDatabase>,
    bus: SubscriptionBus,
    /// Serializes select-and-reserve so selections never overlap.
    selection_lock: Arc<Mutex<()>>,
}

impl ProofLedger {
    pub fn new(db: Arc<dyn WalletDatabase>, bus: SubscriptionBus) -> Self {
        Self {
            db,
            bus,
            selection_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sum of unspent proof amounts for a unit. Lock-free read.
    pub fn balance(&self, unit: &CurrencyUnit) -> Result<Amount, WalletError> {
        let proofs = self
            .db
            .get_proofs(Some(unit), Some(&[ProofState::Unspent]))?;
        Ok(Amount::try_sum(proofs.iter().map(|(p, _)| p.amount))?)
    }

    /// Proofs whose state is in `states`. Lock-free read.
    pub fn get_by_states(
        &self,
        unit: Option<&CurrencyUnit>,
        states: &[ProofState],
    ) -> Result<Vec<(Proof, ProofState)>, WalletError> {
        Ok(self.db.get_proofs(unit, Some(states))?)
    }

    /// Persist freshly minted or received proofs as unspent.
    pub fn insert_unspent(&self, proofs: Vec<Proof>) -> Result<(), WalletError> {
        let updates: Vec<(ProofId, ProofState)> = proofs
            .iter()
            .map(|p| (p.id(), ProofState::Unspent))
            .collect();
        self.db.insert_proofs(proofs, ProofState::Unspent)?;
        self.bus.publish_proof_states(&updates);
        Ok(())
    }

    /// Persist proofs directly as pending (outgoing proofs reserved in a
    /// token that has not been redeemed yet).
    pub fn insert_pending(&self, proofs: Vec<Proof>) -> Result<(), WalletError> {
        let updates: Vec<(ProofId, ProofState)> = proofs
            .iter()
            .map(|p| (p.id(), ProofState::Pending))
            .collect();
        self.db.insert_proofs(proofs, ProofState::Pending)?;
        self.bus.publish_proof_states(&updates);
        Ok(())
    }

    /// Select unspent proofs covering `target` under `policy` and
    /// atomically transition them to `Pending`.
    ///
    /// On any failure nothing is reserved and the store is unchanged.
    pub async fn reserve(
        &self,
        target: Amount,
        unit: &CurrencyUnit,
        policy: SelectionPolicy,
    ) -> Result<Selection, WalletError> {
        let _guard = self.selection_lock.lock().await;
        let selection = self.select_for_amount(target, unit, policy)?;
        let ids = selection.ids();
        self.transition(&ids, ProofState::Pending)?;
        tracing::debug!(
            %target,
            selected = selection.proofs.len(),
            total = %selection.total,
            "reserved proofs"
        );
        Ok(selection)
    }

    /// Pure selection: greedy largest-first below the target, then the
    /// smallest remaining proof that closes the gap. Does not mutate state.
    pub fn select_for_amount(
        &self,
        target: Amount,
        unit: &CurrencyUnit,
        policy: SelectionPolicy,
    ) -> Result<Selection, WalletError> {
        let mut available: Vec<Proof> = self
            .db
            .get_proofs(Some(unit), Some(&[ProofState::Unspent]))?
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        let available_total = Amount::try_sum(available.iter().map(|p| p.amount))?;
        available.sort_by(|a, b| b.amount.cmp(&a.amount));

        let insufficient = || WalletError::InsufficientFunds {
            needed: target,
            available: available_total,
        };

        // The fee grows with the number of inputs, so re-run selection with
        // the fee folded into the goal until the pick is stable.
        let mut goal = target;
        for _ in 0..=available.len() {
            let selected = Self::greedy_select(&available, goal);
            let count = selected.len();
            let total = Amount::try_sum(selected.iter().map(|p| p.amount))?;
            if total < goal {
                return Err(insufficient());
            }
            let fee = policy.fee_for(count);
            let full_goal = target.checked_add(fee).ok_or_else(insufficient)?;
            if total < full_goal {
                goal = full_goal;
                continue;
            }

            if let Some(max) = policy.max_proofs {
                if count > max {
                    return Err(insufficient());
                }
            }
            if policy.exact && total != full_goal {
                return Err(insufficient());
            }
            if let Some(tolerance) = policy.tolerance {
                if total.saturating_sub(full_goal) > tolerance {
                    return Err(insufficient());
                }
            }

            return Ok(Selection {
                proofs: selected.into_iter().cloned().collect(),
                total,
                fee,
            });
        }
        Err(insufficient())
    }

    fn greedy_select(sorted_desc: &[Proof], target: Amount) -> Vec<&Proof> {
        let mut selected: Vec<&Proof> = Vec::new();
        let mut sum = Amount::ZERO;

        // Largest-first without overshooting.
        for proof in sorted_desc {
            match sum.checked_add(proof.amount) {
                Some(next) if next <= target => {
                    selected.push(proof);
                    sum = next;
                    if sum == target {
                        return selected;
                    }
                }
                _ => {}
            }
        }

        // Close the remainder with the smallest proof that covers it.
        let remainder = target.saturating_sub(sum);
        if !remainder.is_zero() {
            let topup = sorted_desc
                .iter()
                .rev()
                .find(|p| !selected.iter().any(|s| std::ptr::eq(*s, *p)) && p.amount >= remainder);
            if let Some(proof) = topup {
                selected.push(proof);
            }
        }
        selected
    }

    /// Roll reserved proofs back to unspent (failed or aborted operation).
    pub fn release(&self, ids: &[ProofId]) -> Result<(), WalletError> {
        self.transition(ids, ProofState::Unspent)
    }

    /// Mark proofs spent after the mint confirmed the operation.
    pub fn settle(&self, ids: &[ProofId]) -> Result<(), WalletError> {
        self.transition(ids, ProofState::Spent)
    }

    fn transition(&self, ids: &[ProofId], state: ProofState) -> Result<(), WalletError> {
        self.db.update_proofs_state(ids, state)?;
        let updates: Vec<(ProofId, ProofState)> = ids.iter().map(|id| (*id, state)).collect();
        self.bus.publish_proof_states(&updates);
        Ok(())
    }
}
