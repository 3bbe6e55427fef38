pub mod models;
pub mod queries;
pub mod store;

use anyhow::Result;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

use crate::models::LedgerState;
use crate::store::HistoryStore;

/// The server's authoritative, append-only message store.
///
/// Every mutation holds the state lock through its persist step, so writers are
/// serialized and IDs come out strictly increasing.
pub struct Ledger {
    state: Mutex<LedgerState>,
    store: Option<HistoryStore>,
}

impl Ledger {
    /// A ledger with no durable store.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            store: None,
        }
    }

    /// Open a ledger backed by a history file. Never fails: an unreadable or
    /// corrupt file is reported and the ledger starts empty.
    pub fn open(path: &Path) -> Self {
        let store = HistoryStore::new(path);
        let state = match store.load() {
            Ok(Some(file)) => {
                let state = LedgerState::from_history(file);
                info!(
                    "Ledger loaded {} messages from {} (next id {})",
                    state.messages.len(),
                    path.display(),
                    state.next_id
                );
                state
            }
            Ok(None) => {
                info!("No history at {}, starting empty", path.display());
                LedgerState::default()
            }
            Err(e) => {
                error!("Ignoring history at {}: {}", path.display(), e);
                LedgerState::default()
            }
        };

        Self {
            state: Mutex::new(state),
            store: Some(store),
        }
    }

    pub fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&LedgerState) -> T,
    {
        let state = self.state.lock().map_err(|e| anyhow::anyhow!("Ledger lock poisoned: {}", e))?;
        Ok(f(&state))
    }

    /// Run a mutation under the lock. When it reports a change, the full state
    /// is persisted before the lock is released.
    fn with_state_mut<F, T>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut LedgerState) -> Option<T>,
    {
        let mut state = self.state.lock().map_err(|e| anyhow::anyhow!("Ledger lock poisoned: {}", e))?;
        let changed = f(&mut state);
        if changed.is_some() {
            self.persist(&state);
        }
        Ok(changed)
    }

    /// Best-effort: a failed write is logged and never blocks the broadcast.
    fn persist(&self, state: &LedgerState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&state.to_history()) {
                tracing::warn!("Failed to persist history to {}: {}", store.path().display(), e);
            }
        }
    }
}
