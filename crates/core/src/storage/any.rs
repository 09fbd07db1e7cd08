use uuid::Uuid;

use super::{MemoryStore, PgStore, PublisherStore};
use crate::document::model::ReleaseDocument;
use crate::error::PublisherResult;
use crate::release::model::ContentRelease;

/// Backend chosen at startup.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl AnyStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            AnyStore::Postgres(_) => "postgres",
            AnyStore::Memory(_) => "memory",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Postgres($store) => $call.await,
            AnyStore::Memory($store) => $call.await,
        }
    };
}

impl PublisherStore for AnyStore {
    async fn insert_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        delegate!(self, store => store.insert_release(release))
    }

    async fn update_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        delegate!(self, store => store.update_release(release))
    }

    async fn swap_live_release(
        &self,
        live: &ContentRelease,
        archived: &[ContentRelease],
    ) -> PublisherResult<()> {
        delegate!(self, store => store.swap_live_release(live, archived))
    }

    async fn get_release(&self, uuid: Uuid) -> PublisherResult<Option<ContentRelease>> {
        delegate!(self, store => store.get_release(uuid))
    }

    async fn list_releases(&self, site_code: &str) -> PublisherResult<Vec<ContentRelease>> {
        delegate!(self, store => store.list_releases(site_code))
    }

    async fn list_site_codes(&self) -> PublisherResult<Vec<String>> {
        delegate!(self, store => store.list_site_codes())
    }

    async fn upsert_document(&self, document: &ReleaseDocument) -> PublisherResult<()> {
        delegate!(self, store => store.upsert_document(document))
    }

    async fn get_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Option<ReleaseDocument>> {
        delegate!(self, store => store.get_document(release_uuid, content_type, document_key))
    }

    async fn delete_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<bool> {
        delegate!(self, store => store.delete_document(release_uuid, content_type, document_key))
    }

    async fn list_documents(&self, release_uuid: Uuid) -> PublisherResult<Vec<ReleaseDocument>> {
        delegate!(self, store => store.list_documents(release_uuid))
    }
}
