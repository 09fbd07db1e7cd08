use std::future::Future;

use uuid::Uuid;

use crate::document::model::ReleaseDocument;
use crate::error::PublisherResult;
use crate::release::model::ContentRelease;

pub mod any;
pub mod memory;
pub mod postgres;

pub use any::AnyStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence backend for releases and their documents.
///
/// Each method is a single atomic read or write. Ordering across several writes is the
/// caller's business (see `SiteLocks`).
pub trait PublisherStore: Send + Sync + 'static {
    fn insert_release(
        &self,
        release: &ContentRelease,
    ) -> impl Future<Output = PublisherResult<()>> + Send;

    /// Overwrite every mutable column of an existing release.
    fn update_release(
        &self,
        release: &ContentRelease,
    ) -> impl Future<Output = PublisherResult<()>> + Send;

    /// Write a newly live release together with the releases it archives, as one unit.
    /// On error none of them is written. Archived releases are written first, so a
    /// one-live-per-site constraint holds at every step.
    fn swap_live_release(
        &self,
        live: &ContentRelease,
        archived: &[ContentRelease],
    ) -> impl Future<Output = PublisherResult<()>> + Send;

    fn get_release(
        &self,
        uuid: Uuid,
    ) -> impl Future<Output = PublisherResult<Option<ContentRelease>>> + Send;

    /// All releases of a site, oldest first.
    fn list_releases(
        &self,
        site_code: &str,
    ) -> impl Future<Output = PublisherResult<Vec<ContentRelease>>> + Send;

    /// Distinct site codes, sorted.
    fn list_site_codes(&self) -> impl Future<Output = PublisherResult<Vec<String>>> + Send;

    /// Insert or replace the record at the document's (release, type, key).
    fn upsert_document(
        &self,
        document: &ReleaseDocument,
    ) -> impl Future<Output = PublisherResult<()>> + Send;

    fn get_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> impl Future<Output = PublisherResult<Option<ReleaseDocument>>> + Send;

    /// Hard delete. Returns whether a record was removed.
    fn delete_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> impl Future<Output = PublisherResult<bool>> + Send;

    /// Every record of a release, tombstones included, ordered by (type, key).
    fn list_documents(
        &self,
        release_uuid: Uuid,
    ) -> impl Future<Output = PublisherResult<Vec<ReleaseDocument>>> + Send;
}
