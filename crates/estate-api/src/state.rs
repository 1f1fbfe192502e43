//! # Application State
//!
//! Shared by every handler through axum's `State` extractor. Cloning is
//! cheap: every field is an `Arc` or wraps one.

use std::sync::Arc;

use crate::auth::CredentialStore;
use crate::background::TaskTracker;
use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;
use crate::notify::{LogNotifier, Notifier};
use crate::store::memory::MemoryStore;
use crate::store::Models;
use crate::uploads::{DiskUploads, UploadStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub models: Models,
    pub credentials: CredentialStore,
    pub notifier: Arc<dyn Notifier>,
    pub uploads: Arc<dyn UploadStore>,
    pub background: TaskTracker,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, models: Models, notifier: Arc<dyn Notifier>) -> Self {
        let credentials = CredentialStore::new(models.users.clone(), models.tokens.clone());
        let limiter = RateLimiter::new(config.rate_limit());
        let uploads = Arc::new(DiskUploads::new(config.upload_dir.clone()));
        Self {
            config: Arc::new(config),
            models,
            credentials,
            notifier,
            uploads,
            background: TaskTracker::new(),
            limiter,
        }
    }

    /// State backed by `store`, with notifications written to the log.
    pub fn in_memory(config: Config, store: Arc<MemoryStore>) -> Self {
        Self::new(config, Models::memory(store), Arc::new(LogNotifier))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("models", &self.models)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}
