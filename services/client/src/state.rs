//! services/client/src/state.rs
//!
//! Defines the application state shared by every CLI command.

use crate::adapters::{FileStore, HttpBackend, RasterCodec};
use crate::config::Config;
use crate::error::ClientError;
use social_feed_core::feed::FeedService;
use social_feed_core::ports::{FeedBackend, ImageCodec, KeyValueStore};
use social_feed_core::session::SessionManager;
use social_feed_core::storage::StorageGuard;
use std::sync::Arc;
use tracing::debug;

//=========================================================================================
// AppState
//=========================================================================================

/// The wired-up client, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: StorageGuard,
    pub session: Arc<SessionManager>,
    pub feed: FeedService,
    pub codec: Arc<dyn ImageCodec>,
}

impl AppState {
    /// Builds the production adapters from `config` and restores any
    /// persisted session.
    pub fn from_config(config: Arc<Config>) -> Result<Self, ClientError> {
        let backend = Arc::new(HttpBackend::new(&config.api_url, config.http_timeout)?);
        let store = Arc::new(FileStore::new(config.storage_path.clone()));
        Ok(Self::with_adapters(config, backend, store, Arc::new(RasterCodec::new())))
    }

    /// Wires explicit adapters, e.g. a mock backend in tests.
    pub fn with_adapters(
        config: Arc<Config>,
        backend: Arc<dyn FeedBackend>,
        store: Arc<dyn KeyValueStore>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        let storage = StorageGuard::new(store);
        let session = Arc::new(SessionManager::new(backend.clone(), storage.clone()));
        let authenticated = session.initialize();
        debug!(authenticated, "Session initialized");
        let feed = FeedService::new(backend, session.clone());
        Self {
            config,
            storage,
            session,
            feed,
            codec,
        }
    }
}
