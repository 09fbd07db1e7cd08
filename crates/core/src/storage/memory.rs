use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::PublisherStore;
use crate::document::model::ReleaseDocument;
use crate::error::{PublisherError, PublisherResult};
use crate::release::model::ContentRelease;

type DocumentSlot = (Uuid, String, String);

/// In-process store. Used for tests and for running the API without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    releases: Arc<RwLock<HashMap<Uuid, ContentRelease>>>,
    documents: Arc<RwLock<BTreeMap<DocumentSlot, ReleaseDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slot(release_uuid: Uuid, content_type: &str, document_key: &str) -> DocumentSlot {
    (release_uuid, content_type.to_string(), document_key.to_string())
}

impl PublisherStore for MemoryStore {
    async fn insert_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        let mut releases = self.releases.write().await;
        if releases.contains_key(&release.uuid) {
            return Err(PublisherError::Dependency(format!(
                "release {} already exists",
                release.uuid
            )));
        }
        releases.insert(release.uuid, release.clone());
        Ok(())
    }

    async fn update_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        let mut releases = self.releases.write().await;
        match releases.get_mut(&release.uuid) {
            Some(stored) => {
                *stored = release.clone();
                Ok(())
            }
            None => Err(PublisherError::release_not_found(release.uuid)),
        }
    }

    async fn swap_live_release(
        &self,
        live: &ContentRelease,
        archived: &[ContentRelease],
    ) -> PublisherResult<()> {
        let mut releases = self.releases.write().await;
        let batch: Vec<&ContentRelease> = archived.iter().chain(std::iter::once(live)).collect();
        if let Some(missing) = batch.iter().find(|r| !releases.contains_key(&r.uuid)) {
            return Err(PublisherError::release_not_found(missing.uuid));
        }
        for release in batch {
            releases.insert(release.uuid, release.clone());
        }
        Ok(())
    }

    async fn get_release(&self, uuid: Uuid) -> PublisherResult<Option<ContentRelease>> {
        Ok(self.releases.read().await.get(&uuid).cloned())
    }

    async fn list_releases(&self, site_code: &str) -> PublisherResult<Vec<ContentRelease>> {
        let mut releases: Vec<ContentRelease> = self
            .releases
            .read()
            .await
            .values()
            .filter(|r| r.site_code == site_code)
            .cloned()
            .collect();
        releases.sort_by_key(|r| (r.created_at, r.uuid));
        Ok(releases)
    }

    async fn list_site_codes(&self) -> PublisherResult<Vec<String>> {
        let codes: BTreeSet<String> = self
            .releases
            .read()
            .await
            .values()
            .map(|r| r.site_code.clone())
            .collect();
        Ok(codes.into_iter().collect())
    }

    async fn upsert_document(&self, document: &ReleaseDocument) -> PublisherResult<()> {
        let key = slot(
            document.release_uuid,
            &document.content_type,
            &document.document_key,
        );
        self.documents.write().await.insert(key, document.clone());
        Ok(())
    }

    async fn get_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Option<ReleaseDocument>> {
        let key = slot(release_uuid, content_type, document_key);
        Ok(self.documents.read().await.get(&key).cloned())
    }

    async fn delete_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<bool> {
        let key = slot(release_uuid, content_type, document_key);
        Ok(self.documents.write().await.remove(&key).is_some())
    }

    async fn list_documents(&self, release_uuid: Uuid) -> PublisherResult<Vec<ReleaseDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|((release, _, _), _)| *release == release_uuid)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
