use std::sync::Arc;

use snapshot_publisher_core::events::bus::EventBus;
use snapshot_publisher_core::storage::AnyStore;
use snapshot_publisher_core::Publisher;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    publisher: Publisher<AnyStore>,
    config: AppConfig,
}

impl AppState {
    pub fn new(publisher: Publisher<AnyStore>, config: AppConfig) -> Self {
        Self {
            inner: Arc::new(InnerState { publisher, config }),
        }
    }

    pub fn publisher(&self) -> &Publisher<AnyStore> {
        &self.inner.publisher
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn event_bus(&self) -> &EventBus {
        self.inner.publisher.events()
    }
}
