//! Per-site coordination: the writer lock and the cached site-code list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::error::PublisherResult;
use crate::storage::PublisherStore;

/// One async mutex per site code. Every lifecycle write and version repair for a site
/// holds its guard, so two promotions of the same site never interleave.
#[derive(Debug, Clone, Default)]
pub struct SiteLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, site_code: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(site_code.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Read-through cache of the distinct site codes. Rebuilt from the store on the first
/// read after an invalidation.
#[derive(Debug, Clone, Default)]
pub struct SiteCodeCache {
    codes: Arc<RwLock<Option<Vec<String>>>>,
}

impl SiteCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<S: PublisherStore>(&self, store: &S) -> PublisherResult<Vec<String>> {
        if let Some(codes) = self.codes.read().await.as_ref() {
            return Ok(codes.clone());
        }
        let mut slot = self.codes.write().await;
        if let Some(codes) = slot.as_ref() {
            return Ok(codes.clone());
        }
        let codes = store.list_site_codes().await?;
        *slot = Some(codes.clone());
        Ok(codes)
    }

    pub async fn invalidate(&self) {
        *self.codes.write().await = None;
    }
}
