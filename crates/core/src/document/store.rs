use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use super::dynamic::Describable;
use super::model::{DocumentId, ReleaseDocument, DYNAMIC_ELEMENT_KEYS, HAVE_DYNAMIC_ELEMENTS};
use super::path::find_dynamic_paths;
use crate::error::{PublisherError, PublisherResult};
use crate::events::bus::EventBus;
use crate::events::types::{ContentEvent, PublisherEvent};
use crate::release::model::{ContentRelease, ReleaseStatus};
use crate::release::live_release;
use crate::storage::PublisherStore;

/// Documents of releases, addressed by (release, content type, key).
///
/// `unpublish` hard-deletes a record, so reads fall back to the base release again.
/// `soft_delete` writes a tombstone that hides the key, including the base copy.
pub struct DocumentStore<S> {
    store: Arc<S>,
    events: EventBus,
}

impl<S> Clone for DocumentStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        }
    }
}

impl<S: PublisherStore> DocumentStore<S> {
    pub fn new(store: Arc<S>, events: EventBus) -> Self {
        Self { store, events }
    }

    fn ensure_writable(release: &ContentRelease) -> PublisherResult<()> {
        if release.status == ReleaseStatus::Archived {
            return Err(PublisherError::IllegalState(format!(
                "release {} is archived",
                release.uuid
            )));
        }
        Ok(())
    }

    fn content_event(
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
        title: Option<String>,
        content: Option<Value>,
    ) -> ContentEvent {
        ContentEvent {
            site_code: release.site_code.clone(),
            release_uuid: release.uuid,
            content_type: content_type.to_string(),
            document_key: document_key.to_string(),
            title,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Upsert a document, clearing any tombstone, and announce it.
    pub async fn put(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
        document_json: Value,
        parameters: Map<String, Value>,
    ) -> PublisherResult<ReleaseDocument> {
        Self::ensure_writable(release)?;

        let document = ReleaseDocument::new(
            release.uuid,
            content_type,
            document_key,
            document_json,
            parameters,
        );
        self.store.upsert_document(&document).await?;

        tracing::info!(
            site_code = %release.site_code,
            release = %release.uuid,
            content_type,
            document_key,
            "document published"
        );
        self.events.notify(PublisherEvent::ContentPublished(Self::content_event(
            release,
            content_type,
            document_key,
            document.title().map(str::to_string),
            Some(document.document_json.clone()),
        )));
        Ok(document)
    }

    /// Publish a serialized body, recording its dynamic reference paths first.
    pub async fn publish(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
        mut document_json: Value,
        mut parameters: Map<String, Value>,
    ) -> PublisherResult<ReleaseDocument> {
        let paths = find_dynamic_paths(&document_json);
        let have_dynamic_elements = !paths.is_empty();
        if have_dynamic_elements {
            if let Value::Object(body) = &mut document_json {
                let paths = serde_json::to_value(&paths)
                    .map_err(|e| PublisherError::validation("document_json", e.to_string()))?;
                body.insert(DYNAMIC_ELEMENT_KEYS.to_string(), paths);
            }
        }
        parameters.insert(
            HAVE_DYNAMIC_ELEMENTS.to_string(),
            Value::Bool(have_dynamic_elements),
        );
        self.put(release, content_type, document_key, document_json, parameters)
            .await
    }

    /// Publish every serializer view of a content item.
    pub async fn publish_item(
        &self,
        release: &ContentRelease,
        item: &dyn Describable,
        extra_parameters: &Map<String, Value>,
    ) -> PublisherResult<Vec<ReleaseDocument>> {
        let mut published = Vec::new();
        for (view, descriptor) in item.serializers() {
            let body = item.serialize(&view).ok_or_else(|| {
                PublisherError::validation("serializer", format!("view {view:?} produced no body"))
            })?;
            let document = self
                .publish(
                    release,
                    &descriptor.content_type,
                    &descriptor.key,
                    body,
                    extra_parameters.clone(),
                )
                .await?;
            published.push(document);
        }
        Ok(published)
    }

    /// Own record of the release, tombstones included.
    pub async fn get(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<ReleaseDocument> {
        self.store
            .get_document(release.uuid, content_type, document_key)
            .await?
            .ok_or_else(|| PublisherError::document_not_found(content_type, document_key))
    }

    pub async fn exists(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<bool> {
        Ok(self
            .store
            .get_document(release.uuid, content_type, document_key)
            .await?
            .is_some())
    }

    /// Mark a document removed. A key only inherited from the lineage gets a tombstone
    /// copied from the inherited record.
    pub async fn soft_delete(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<ReleaseDocument> {
        Self::ensure_writable(release)?;

        let own = self
            .store
            .get_document(release.uuid, content_type, document_key)
            .await?;
        let mut document = match own {
            Some(document) => document,
            None => {
                let inherited = match self.fallback_release(release).await? {
                    Some(base) => self.read_own(&base, content_type, document_key).await?,
                    None => None,
                };
                let inherited = inherited
                    .ok_or_else(|| PublisherError::document_not_found(content_type, document_key))?;
                ReleaseDocument {
                    release_uuid: release.uuid,
                    ..inherited
                }
            }
        };
        document.deleted = true;
        document.updated_at = Utc::now();
        self.store.upsert_document(&document).await?;

        tracing::info!(
            site_code = %release.site_code,
            release = %release.uuid,
            content_type,
            document_key,
            "document removed"
        );
        self.events.notify(PublisherEvent::ContentUnpublished(Self::content_event(
            release,
            content_type,
            document_key,
            document.title().map(str::to_string),
            None,
        )));
        Ok(document)
    }

    /// Delete the release's own record outright.
    pub async fn unpublish(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<()> {
        Self::ensure_writable(release)?;

        let removed = self
            .store
            .delete_document(release.uuid, content_type, document_key)
            .await?;
        if !removed {
            return Err(PublisherError::document_not_found(content_type, document_key));
        }

        tracing::info!(
            site_code = %release.site_code,
            release = %release.uuid,
            content_type,
            document_key,
            "document unpublished"
        );
        self.events.notify(PublisherEvent::ContentUnpublished(Self::content_event(
            release,
            content_type,
            document_key,
            None,
            None,
        )));
        Ok(())
    }

    /// Unpublish or remove every view of an item. Views missing from the release are
    /// skipped.
    pub async fn withdraw_item(
        &self,
        release: &ContentRelease,
        item: &dyn Describable,
        tombstone: bool,
    ) -> PublisherResult<usize> {
        let mut withdrawn = 0;
        for descriptor in item.serializers().values() {
            let outcome = if tombstone {
                self.soft_delete(release, &descriptor.content_type, &descriptor.key)
                    .await
                    .map(|_| ())
            } else {
                self.unpublish(release, &descriptor.content_type, &descriptor.key)
                    .await
            };
            match outcome {
                Ok(()) => withdrawn += 1,
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(withdrawn)
    }

    async fn read_own(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Option<ReleaseDocument>> {
        Ok(self
            .store
            .get_document(release.uuid, content_type, document_key)
            .await?
            .filter(|doc| !doc.deleted))
    }

    /// The release reads fall back to: the current live release of the site when
    /// `use_current_live_as_base_release` is set, otherwise `base_release`. Never the
    /// release itself.
    pub async fn fallback_release(
        &self,
        release: &ContentRelease,
    ) -> PublisherResult<Option<ContentRelease>> {
        let base = if release.use_current_live_as_base_release {
            live_release(self.store.as_ref(), &release.site_code).await?
        } else {
            match release.base_release {
                Some(uuid) => self.store.get_release(uuid).await?,
                None => None,
            }
        };
        Ok(base.filter(|base| base.uuid != release.uuid))
    }

    /// Live-serve read: the release's own visible record, else the fallback release's,
    /// one hop only. An own tombstone hides the key.
    pub async fn read(
        &self,
        release: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Option<ReleaseDocument>> {
        match self
            .store
            .get_document(release.uuid, content_type, document_key)
            .await?
        {
            Some(doc) if doc.deleted => Ok(None),
            Some(doc) => Ok(Some(doc)),
            None => match self.fallback_release(release).await? {
                Some(base) => self.read_own(&base, content_type, document_key).await,
                None => Ok(None),
            },
        }
    }

    /// Every own record, tombstones included.
    pub async fn list(&self, release: &ContentRelease) -> PublisherResult<Vec<ReleaseDocument>> {
        self.store.list_documents(release.uuid).await
    }

    /// The visible document set of a release: own records overlaid on the fallback
    /// release's visible records, tombstones removed.
    pub async fn effective_documents(
        &self,
        release: &ContentRelease,
    ) -> PublisherResult<BTreeMap<DocumentId, ReleaseDocument>> {
        let mut documents = BTreeMap::new();
        if let Some(base) = self.fallback_release(release).await? {
            for doc in self.store.list_documents(base.uuid).await? {
                if !doc.deleted {
                    documents.insert(doc.id(), doc);
                }
            }
        }
        for doc in self.store.list_documents(release.uuid).await? {
            if doc.deleted {
                documents.remove(&doc.id());
            } else {
                documents.insert(doc.id(), doc);
            }
        }
        Ok(documents)
    }

    /// Persist a rewritten body without announcing it.
    pub(crate) async fn save(&self, document: &ReleaseDocument) -> PublisherResult<()> {
        self.store.upsert_document(document).await
    }
}
