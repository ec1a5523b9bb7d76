//! Shared application state
//!
//! Built once at startup and cloned into every handler. Everything inside is
//! an `Arc` to a store or service that synchronizes itself.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogProvider};
use crate::history::DonationLedger;
use crate::hub::{Hub, KeepaliveConfig};
use crate::persistence::PersistenceGateway;
use crate::store::{QuestStore, RequestStore, TtsStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub quests: Arc<QuestStore>,
    pub requests: Arc<RequestStore>,
    pub tts: Arc<TtsStore>,
    pub catalog: Arc<Catalog>,
    pub persistence: Arc<PersistenceGateway>,
    pub history: Arc<DonationLedger>,
    pub keepalive: KeepaliveConfig,
}

impl AppState {
    /// Wire a fresh hub and empty stores around a catalog
    ///
    /// The donation ledger defaults to `donations.json` next to the state
    /// file; see [`AppState::with_history_file`].
    pub fn new(state_file: impl Into<PathBuf>, catalog: Catalog) -> Self {
        let state_file = state_file.into();
        let history_file = state_file.with_file_name("donations.json");
        let hub = Arc::new(Hub::new());
        let quests = Arc::new(QuestStore::new(Arc::clone(&hub)));
        let requests = Arc::new(RequestStore::new(Arc::clone(&hub)));
        let tts = Arc::new(TtsStore::new(Arc::clone(&hub)));
        let persistence = Arc::new(PersistenceGateway::new(
            state_file,
            Arc::clone(&quests),
            Arc::clone(&requests),
            Arc::clone(&tts),
            Arc::clone(&hub),
        ));

        Self {
            hub,
            quests,
            requests,
            tts,
            catalog: Arc::new(catalog),
            persistence,
            history: Arc::new(DonationLedger::new(history_file)),
            keepalive: KeepaliveConfig::default(),
        }
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history = Arc::new(DonationLedger::new(path));
        self
    }

    /// Catalog lookups through the provider interface
    pub fn catalog(&self) -> &dyn CatalogProvider {
        self.catalog.as_ref()
    }
}
