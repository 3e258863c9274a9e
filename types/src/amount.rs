//! Ecash amounts and denomination split policies.
//!
//! Amounts are non-negative integers in the wallet's base unit (satoshis,
//! millisatoshis, cents). Mints issue proofs in power-of-two denominations,
//! so every amount decomposes into the set bits of its binary representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::error::AmountError;

/// An amount of ecash in the wallet's base unit.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Sum a sequence of amounts, failing on overflow instead of wrapping.
    pub fn try_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Result<Amount, AmountError> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, a| {
                acc.checked_add(a).ok_or(AmountError::Overflow)
            })
    }

    /// Decompose into power-of-two denominations (the set bits), ascending.
    pub fn split(&self) -> Vec<Amount> {
        (0..64)
            .filter(|bit| self.0 & (1u64 << bit) != 0)
            .map(|bit| Amount(1u64 << bit))
            .collect()
    }

    /// Decompose according to a split policy.
    ///
    /// Every part is a power of two, since those are the only denominations
    /// a mint's keyset signs. `Value(v)` yields v's decomposition repeated
    /// for each whole multiple of `v`, then the remainder's decomposition.
    /// `Values(list)` yields the list as given; it must sum to the amount,
    /// otherwise [`AmountError::AmountMismatch`].
    pub fn split_targeted(&self, target: &SplitTarget) -> Result<Vec<Amount>, AmountError> {
        match target {
            SplitTarget::None => Ok(self.split()),
            SplitTarget::Value(denomination) => {
                if denomination.is_zero() {
                    return Err(AmountError::AmountMismatch {
                        requested: *self,
                        actual: Amount::ZERO,
                    });
                }
                if *self <= *denomination {
                    return Ok(self.split());
                }
                let count = self.0 / denomination.0;
                let remainder = Amount(self.0 % denomination.0);
                let denomination_parts = denomination.split();
                let mut parts: Vec<Amount> =
                    Vec::with_capacity(denomination_parts.len() * count as usize);
                for _ in 0..count {
                    parts.extend_from_slice(&denomination_parts);
                }
                parts.extend(remainder.split());
                parts.sort_unstable();
                Ok(parts)
            }
            SplitTarget::Values(amounts) => {
                let actual = Amount::try_sum(amounts.iter().copied())?;
                if actual != *self {
                    return Err(AmountError::AmountMismatch {
                        requested: *self,
                        actual,
                    });
                }
                Ok(amounts.clone())
            }
        }
    }

    /// Decompose into powers of two, then keep halving the largest
    /// denomination until at least `count` pieces exist (or only 1s remain).
    ///
    /// Used to keep roughly `target_proof_count` denominations on hand.
    pub fn split_toward_count(&self, count: usize) -> Vec<Amount> {
        let mut parts = self.split();
        while parts.len() < count {
            parts.sort_unstable();
            match parts.pop() {
                Some(largest) if largest.0 > 1 => {
                    let half = Amount(largest.0 / 2);
                    parts.push(half);
                    parts.push(half);
                }
                Some(largest) => {
                    parts.push(largest);
                    break;
                }
                None => break,
            }
        }
        parts.sort_unstable();
        parts
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Policy describing how an amount decomposes into proof denominations
/// when minting, swapping, or sending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitTarget {
    /// Greedy binary decomposition (the mint's default).
    #[default]
    None,
    /// Proofs of exactly one denomination, repeated as needed.
    Value(Amount),
    /// An explicit list of denominations; must sum to the request.
    Values(Vec<Amount>),
}
