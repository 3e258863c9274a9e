//! Keyset storage trait.

use pocket_types::{Keyset, KeysetId};

use crate::StoreError;

/// Trait for caching mint keysets and tracking the per-keyset derivation
/// counter used for deterministic proof secrets.
pub trait KeysetStore {
    /// Insert or replace a keyset.
    fn put_keyset(&self, keyset: &Keyset) -> Result<(), StoreError>;

    /// Retrieve a cached keyset, if present.
    fn get_keyset(&self, id: &KeysetId) -> Result<Option<Keyset>, StoreError>;

    /// Reserve `count` derivation indices for a keyset, returning the first
    /// reserved index. The counter is monotonic so restored wallets never
    /// reuse secrets.
    fn increment_keyset_counter(&self, id: &KeysetId, count: u32) -> Result<u32, StoreError>;
}
