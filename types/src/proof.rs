//! Proofs — unblinded ecash tokens — and their spend states.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::keyset::KeysetId;
use crate::unit::CurrencyUnit;

/// The spend state of a proof held by the wallet.
///
/// `Pending` is the intermediate state guarding multi-step network
/// operations: proofs move there before the mint is contacted and only
/// leave it once the outcome is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofState {
    /// Spendable; counted in the wallet balance.
    Unspent,
    /// Reserved for an in-flight send or melt.
    Pending,
    /// Consumed; terminal.
    Spent,
}

impl ProofState {
    /// Whether a transition from `self` to `next` is valid.
    ///
    /// Same-state transitions are allowed (transitions are idempotent).
    /// `Spent` is terminal.
    pub fn can_transition_to(&self, next: ProofState) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Unspent => matches!(next, Self::Pending | Self::Spent),
            Self::Pending => matches!(next, Self::Unspent | Self::Spent),
            Self::Spent => false,
        }
    }

    pub fn is_spendable(&self) -> bool {
        matches!(self, Self::Unspent)
    }
}

impl fmt::Display for ProofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspent => write!(f, "unspent"),
            Self::Pending => write!(f, "pending"),
            Self::Spent => write!(f, "spent"),
        }
    }
}

/// Stable identity of a proof: SHA-256 over its secret and keyset id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProofId([u8; 32]);

impl ProofId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ProofId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(bytes))
    }
}

/// A spending restriction attached to a proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SpendingConditions {
    /// Redeemable only with a signature from this public key.
    P2pk { pubkey: String },
    /// Redeemable only with the preimage of this SHA-256 hash.
    Htlc { hash: String },
}

/// Witness data satisfying a proof's spending condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Witness {
    Signature(String),
    Preimage(String),
}

/// An unblinded ecash token: a fixed-denomination unit of value redeemable
/// at the issuing mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub amount: Amount,
    pub unit: CurrencyUnit,
    pub keyset_id: KeysetId,
    /// The unblinded secret; unique per proof.
    pub secret: String,
    /// The mint's unblinded signature over the secret.
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<SpendingConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
}

impl Proof {
    /// Stable identity derived from secret and keyset.
    pub fn id(&self) -> ProofId {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(self.keyset_id.as_str().as_bytes());
        ProofId(hasher.finalize().into())
    }
}
