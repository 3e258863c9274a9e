//! Fundamental types for the Pocket ecash wallet engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: amounts and split targets, currency units, proofs and their
//! spend states, keysets, mint/melt quotes, the transaction record, mint URLs,
//! serialized tokens, and timestamps.

pub mod amount;
pub mod error;
pub mod keyset;
pub mod mint_url;
pub mod proof;
pub mod quote;
pub mod time;
pub mod token;
pub mod transaction;
pub mod unit;

pub use amount::{Amount, SplitTarget};
pub use error::AmountError;
pub use keyset::{Keyset, KeysetId};
pub use mint_url::{MintUrl, MintUrlError};
pub use proof::{Proof, ProofId, ProofState, SpendingConditions, Witness};
pub use quote::{MeltOptions, MeltQuote, MeltQuoteState, MintQuote, MintQuoteState};
pub use time::Timestamp;
pub use token::{Token, TokenError};
pub use transaction::{Transaction, TransactionDirection, TransactionId};
pub use unit::CurrencyUnit;
