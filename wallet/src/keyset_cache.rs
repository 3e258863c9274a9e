//! Cached mint keysets with single-flight fetching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use pocket_store::WalletDatabase;
use pocket_types::{CurrencyUnit, Keyset, KeysetId};

use crate::error::WalletError;
use crate::mint_client::MintConnector;

/// Caches the mint's active keyset per currency unit.
///
/// Each unit maps to a `OnceCell`, so concurrent callers requesting the
/// same unit share one in-flight fetch and await the same result. A failed
/// fetch leaves the cell empty, so the next caller retries.
#[derive(Clone)]
pub struct KeysetCache {
    client: Arc<dyn MintConnector>,
    db: Arc<dyn WalletDatabase>,
    cells: Arc<Mutex<HashMap<CurrencyUnit, Arc<OnceCell<Keyset>>>>>,
}

impl KeysetCache {
    pub fn new(client: Arc<dyn MintConnector>, db: Arc<dyn WalletDatabase>) -> Self {
        Self {
            client,
            db,
            cells: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn cell_for(&self, unit: &CurrencyUnit) -> Arc<OnceCell<Keyset>> {
        self.cells
            .lock()
            .expect("keyset cache lock poisoned")
            .entry(unit.clone())
            .or_default()
            .clone()
    }

    /// The mint's active keyset for `unit`, fetching and persisting it on
    /// first use.
    pub async fn active_keyset(&self, unit: &CurrencyUnit) -> Result<Keyset, WalletError> {
        let cell = self.cell_for(unit);
        let keyset = cell
            .get_or_try_init(|| self.fetch_active(unit))
            .await?
            .clone();
        Ok(keyset)
    }

    /// Drop the cached keyset for `unit` and fetch it again.
    pub async fn refresh(&self, unit: &CurrencyUnit) -> Result<Keyset, WalletError> {
        self.cells
            .lock()
            .expect("keyset cache lock poisoned")
            .remove(unit);
        self.active_keyset(unit).await
    }

    /// Look up a cached (or previously persisted) keyset by id, for
    /// verifying proofs issued against older keysets.
    pub fn keyset_by_id(&self, id: &KeysetId) -> Result<Option<Keyset>, WalletError> {
        Ok(self.db.get_keyset(id)?)
    }

    async fn fetch_active(&self, unit: &CurrencyUnit) -> Result<Keyset, WalletError> {
        tracing::debug!(%unit, "fetching keysets from mint");
        let keysets = self.client.get_keysets(unit).await?;
        let active = keysets
            .into_iter()
            .find(|ks| ks.active)
            .ok_or_else(|| {
                WalletError::MintCommunication(format!("mint has no active keyset for unit {unit}"))
            })?;
        self.db.put_keyset(&active)?;
        Ok(active)
    }
}
