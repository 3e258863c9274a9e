//! Mint and melt quote state machines.
//!
//! A mint quote tracks an incoming payment that will be exchanged for new
//! proofs; a melt quote tracks proofs being redeemed to pay an external
//! invoice. Quotes are created by the mint and mutated only through state
//! transitions observed via polling or subscription.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::proof::ProofId;
use crate::time::Timestamp;
use crate::unit::CurrencyUnit;

/// State of a mint quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MintQuoteState {
    /// The payment request has not been settled yet.
    Unpaid,
    /// Payment received; proofs may be minted.
    Paid,
    /// Proofs were minted against this quote; terminal.
    Issued,
}

impl fmt::Display for MintQuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Paid => write!(f, "paid"),
            Self::Issued => write!(f, "issued"),
        }
    }
}

/// A quote for minting new proofs against an incoming payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    pub id: String,
    /// Requested amount; `None` for amountless payment requests.
    pub amount: Option<Amount>,
    pub unit: CurrencyUnit,
    /// The payment request (e.g. bolt11 invoice) to be paid.
    pub request: String,
    pub state: MintQuoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
}

impl MintQuote {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|e| e.is_past(now))
    }
}

/// State of a melt quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeltQuoteState {
    /// Not yet executed.
    Unpaid,
    /// Melt submitted; outcome not yet known.
    Pending,
    /// Invoice paid; terminal.
    Paid,
    /// Payment failed; terminal.
    Failed,
}

impl fmt::Display for MeltQuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Options for requesting a melt quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeltOptions {
    /// Pay only part of the invoice (multi-path payment).
    Mpp { amount: Amount },
    /// The invoice carries no amount; pay this many millisatoshis.
    Amountless { amount_msat: Amount },
}

/// A quote for redeeming proofs to pay an external payment request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    pub id: String,
    pub unit: CurrencyUnit,
    /// The payment request being paid.
    pub request: String,
    pub amount: Amount,
    /// Reserved on top of `amount` to cover routing fees.
    pub fee_reserve: Amount,
    pub state: MeltQuoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_preimage: Option<String>,
    /// Proofs reserved for this quote while it is in flight.
    /// Local bookkeeping; never sent to the mint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved_proofs: Vec<ProofId>,
}

impl MeltQuote {
    /// Total value that must be covered by selected proofs. Saturates
    /// rather than wrapping if the mint supplies absurd values.
    pub fn total(&self) -> Amount {
        self.amount.saturating_add(self.fee_reserve)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|e| e.is_past(now))
    }
}
