//! Mint keysets — the versioned public-key sets proofs are issued against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::amount::Amount;
use crate::unit::CurrencyUnit;

/// Identifier of a mint keyset (hex string assigned by the mint).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeysetId(String);

impl KeysetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeysetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mint's signing keyset for one currency unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    pub id: KeysetId,
    pub unit: CurrencyUnit,
    /// Denomination (base units) to public key (hex).
    pub keys: BTreeMap<u64, String>,
    pub active: bool,
    /// Fee charged per thousand inputs spent against this keyset.
    #[serde(default)]
    pub input_fee_ppk: u64,
}

impl Keyset {
    /// Whether this keyset can sign the given denomination.
    pub fn supports(&self, amount: Amount) -> bool {
        self.keys.contains_key(&amount.value())
    }

    /// Fee for spending `input_count` proofs, rounded up to a whole unit.
    pub fn fee_for(&self, input_count: usize) -> Amount {
        Amount::new((self.input_fee_ppk * input_count as u64).div_ceil(1000))
    }
}
