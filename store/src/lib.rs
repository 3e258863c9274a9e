//! Abstract storage traits for the Pocket wallet engine.
//!
//! Every persistence backend (SQL, in-memory for testing) implements these
//! traits. The rest of the workspace depends only on the traits.

pub mod error;
pub mod keysets;
pub mod proofs;
pub mod quotes;
pub mod transactions;

pub use error::StoreError;
pub use keysets::KeysetStore;
pub use proofs::ProofStore;
pub use quotes::QuoteStore;
pub use transactions::TransactionStore;

/// Umbrella trait for a complete wallet database.
///
/// Implementations must make the multi-record operations
/// ([`ProofStore::insert_proofs`], [`ProofStore::update_proofs_state`])
/// atomic: a failure mid-batch leaves every record untouched, and readers
/// never observe a partially updated proof set.
pub trait WalletDatabase:
    ProofStore + QuoteStore + TransactionStore + KeysetStore + Send + Sync
{
}

impl<T> WalletDatabase for T where
    T: ProofStore + QuoteStore + TransactionStore + KeysetStore + Send + Sync
{
}
