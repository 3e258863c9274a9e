//! Quote storage trait.

use pocket_types::{MeltQuote, MintQuote};

use crate::StoreError;

/// Trait for persisting mint and melt quotes, keyed by quote id.
pub trait QuoteStore {
    /// Insert or replace a mint quote.
    fn put_mint_quote(&self, quote: &MintQuote) -> Result<(), StoreError>;

    /// Retrieve a mint quote; [`StoreError::NotFound`] if absent.
    fn get_mint_quote(&self, id: &str) -> Result<MintQuote, StoreError>;

    /// Delete a mint quote (expired or issued housekeeping).
    fn remove_mint_quote(&self, id: &str) -> Result<(), StoreError>;

    /// Insert or replace a melt quote.
    fn put_melt_quote(&self, quote: &MeltQuote) -> Result<(), StoreError>;

    /// Retrieve a melt quote; [`StoreError::NotFound`] if absent.
    fn get_melt_quote(&self, id: &str) -> Result<MeltQuote, StoreError>;

    /// All known melt quotes, in no particular order.
    fn get_melt_quotes(&self) -> Result<Vec<MeltQuote>, StoreError>;

    /// Delete a melt quote.
    fn remove_melt_quote(&self, id: &str) -> Result<(), StoreError>;
}
