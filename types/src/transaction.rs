//! The transaction ledger record: a completed send, receive, mint, or melt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::proof::ProofId;
use crate::time::Timestamp;
use crate::unit::CurrencyUnit;

/// Direction of value flow relative to this wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Incoming,
    Outgoing,
}

impl fmt::Display for TransactionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Content-derived transaction id.
///
/// Derived from the proof set, direction, and unit — not the timestamp —
/// so recording the same completed operation twice collapses to one entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the id for a proof set, direction, and unit.
    pub fn derive(
        proof_ids: &[ProofId],
        direction: TransactionDirection,
        unit: &CurrencyUnit,
    ) -> Self {
        let mut sorted: Vec<&ProofId> = proof_ids.iter().collect();
        sorted.sort();
        let mut hasher = Sha256::new();
        for id in sorted {
            hasher.update(id.as_bytes());
        }
        hasher.update([match direction {
            TransactionDirection::Incoming => 0u8,
            TransactionDirection::Outgoing => 1u8,
        }]);
        hasher.update(unit.to_string().as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for TransactionId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(bytes))
    }
}

/// A completed wallet operation, recorded in the transaction ledger.
///
/// Holds back-references to proofs by id; the proof records themselves are
/// owned by the proof store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub direction: TransactionDirection,
    pub amount: Amount,
    pub fee: Amount,
    pub unit: CurrencyUnit,
    pub proof_ids: Vec<ProofId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    pub timestamp: Timestamp,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: TransactionDirection,
        amount: Amount,
        fee: Amount,
        unit: CurrencyUnit,
        proof_ids: Vec<ProofId>,
        memo: Option<String>,
        metadata: HashMap<String, String>,
        timestamp: Timestamp,
    ) -> Self {
        let id = TransactionId::derive(&proof_ids, direction, &unit);
        Self {
            id,
            direction,
            amount,
            fee,
            unit,
            proof_ids,
            memo,
            metadata,
            timestamp,
        }
    }
}
