//! Per-run cache of the legacy ledger location.
//!
//! The location comes from the environment or the config file and is read at
//! most once per cache. The cache is owned by the caller (normally through
//! [`ApplyContext`](crate::ApplyContext)) so tests can start from a clean
//! slate with [`LegacyLedgerCache::clear`].

use std::sync::{Mutex, MutexGuard, PoisonError};
use tm_core::{LedgerLocation, MigrateConfig};

#[derive(Debug, Default)]
pub struct LegacyLedgerCache {
    /// `None` until loaded; `Some(None)` once loaded with nothing configured
    slot: Mutex<Option<Option<LedgerLocation>>>,
}

impl LegacyLedgerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-filled with a known location (or explicitly none).
    pub fn with_location(location: Option<LedgerLocation>) -> Self {
        Self {
            slot: Mutex::new(Some(location)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Option<LedgerLocation>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached location, running `loader` on first use only.
    pub fn resolve<F>(&self, loader: F) -> Option<LedgerLocation>
    where
        F: FnOnce() -> Option<LedgerLocation>,
    {
        let mut slot = self.lock();
        if let Some(cached) = slot.as_ref() {
            return cached.clone();
        }
        let loaded = loader();
        match &loaded {
            Some(loc) => log::debug!(
                "Legacy ledger configured: {}{}",
                loc.schema
                    .as_deref()
                    .map(|s| format!("{s}."))
                    .unwrap_or_default(),
                loc.table
            ),
            None => log::debug!("No legacy ledger configured"),
        }
        *slot = Some(loaded.clone());
        loaded
    }

    /// Resolve from a config: environment overrides first, then the file.
    pub fn resolve_from_config(&self, config: &MigrateConfig) -> Option<LedgerLocation> {
        self.resolve(|| config.resolve_legacy_ledger())
    }

    /// The cached location, without loading.
    pub fn get(&self) -> Option<LedgerLocation> {
        self.lock().clone().flatten()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Forget the cached value; the next `resolve` loads again.
    pub fn clear(&self) {
        *self.lock() = None;
    }
}

#[cfg(test)]
#[path = "legacy_test.rs"]
mod tests;
