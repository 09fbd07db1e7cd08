//! Entry point wiring the document store, lifecycle, resolver and comparator over one
//! backend, plus the read-side query surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::compare::{DiffEntry, ReleaseComparator};
use crate::document::dynamic::{DynamicElementResolver, SerializerRegistry};
use crate::document::model::ReleaseSelector;
use crate::document::store::DocumentStore;
use crate::error::{PublisherError, PublisherResult};
use crate::events::bus::EventBus;
use crate::release::lifecycle::ReleaseLifecycle;
use crate::release::model::{ContentRelease, NewRelease, ReleaseStatus};
use crate::release::{live_release, stage_release};
use crate::sites::{SiteCodeCache, SiteLocks};
use crate::storage::PublisherStore;

pub struct Publisher<S> {
    store: Arc<S>,
    events: EventBus,
    documents: DocumentStore<S>,
    lifecycle: ReleaseLifecycle<S>,
    resolver: DynamicElementResolver<S>,
    comparator: ReleaseComparator<S>,
    site_codes: SiteCodeCache,
}

impl<S> Clone for Publisher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            documents: self.documents.clone(),
            lifecycle: self.lifecycle.clone(),
            resolver: self.resolver.clone(),
            comparator: self.comparator.clone(),
            site_codes: self.site_codes.clone(),
        }
    }
}

impl<S: PublisherStore> Publisher<S> {
    pub fn new(store: S, events: EventBus, registry: Arc<dyn SerializerRegistry>) -> Self {
        let store = Arc::new(store);
        let documents = DocumentStore::new(Arc::clone(&store), events.clone());
        let resolver = DynamicElementResolver::new(documents.clone(), registry);
        let site_codes = SiteCodeCache::new();
        let lifecycle = ReleaseLifecycle::new(
            Arc::clone(&store),
            events.clone(),
            SiteLocks::new(),
            site_codes.clone(),
            resolver.clone(),
        );
        let comparator = ReleaseComparator::new(documents.clone());
        Self {
            store,
            events,
            documents,
            lifecycle,
            resolver,
            comparator,
            site_codes,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn documents(&self) -> &DocumentStore<S> {
        &self.documents
    }

    pub fn lifecycle(&self) -> &ReleaseLifecycle<S> {
        &self.lifecycle
    }

    pub fn comparator(&self) -> &ReleaseComparator<S> {
        &self.comparator
    }

    pub async fn release(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        self.store
            .get_release(uuid)
            .await?
            .ok_or_else(|| PublisherError::release_not_found(uuid))
    }

    pub async fn list_releases(&self, site_code: &str) -> PublisherResult<Vec<ContentRelease>> {
        self.store.list_releases(site_code).await
    }

    pub async fn create_release(&self, new: NewRelease) -> PublisherResult<ContentRelease> {
        self.lifecycle.create(new).await
    }

    pub async fn get_live_release(&self, site_code: &str) -> PublisherResult<ContentRelease> {
        live_release(self.store.as_ref(), site_code)
            .await?
            .ok_or_else(|| PublisherError::no_live_release(site_code))
    }

    pub async fn get_stage_release(&self, site_code: &str) -> PublisherResult<ContentRelease> {
        stage_release(self.store.as_ref(), site_code)
            .await?
            .ok_or_else(|| PublisherError::no_stage_release(site_code))
    }

    /// A release of `site_code` by uuid, or its live release.
    pub async fn select_release(
        &self,
        site_code: &str,
        selector: ReleaseSelector,
    ) -> PublisherResult<ContentRelease> {
        match selector {
            ReleaseSelector::Live => self.get_live_release(site_code).await,
            ReleaseSelector::Release(uuid) => {
                let release = self.release(uuid).await?;
                if release.site_code != site_code {
                    return Err(PublisherError::release_not_found(uuid));
                }
                Ok(release)
            }
        }
    }

    /// Serve a document as the selected release sees it, dynamic elements resolved on
    /// the fly.
    pub async fn get_document(
        &self,
        site_code: &str,
        selector: ReleaseSelector,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Value> {
        let release = self.select_release(site_code, selector).await?;
        let document = self
            .documents
            .read(&release, content_type, document_key)
            .await?
            .ok_or_else(|| PublisherError::document_not_found(content_type, document_key))?;
        Ok(self.resolver.preview(&release, document.document_json).await)
    }

    async fn compare_pair(
        &self,
        uuid: Uuid,
        compare_to: Option<Uuid>,
    ) -> PublisherResult<(ContentRelease, ContentRelease)> {
        let from = self.release(uuid).await?;
        let to = match compare_to {
            Some(other) => self.release(other).await?,
            None => self.get_live_release(&from.site_code).await?,
        };
        Ok((from, to))
    }

    /// Diff a release against another one, by default the current live release.
    pub async fn compare(
        &self,
        uuid: Uuid,
        compare_to: Option<Uuid>,
    ) -> PublisherResult<Vec<DiffEntry>> {
        let (from, to) = self.compare_pair(uuid, compare_to).await?;
        self.comparator.compare(&from, &to).await
    }

    pub async fn diff_document(
        &self,
        uuid: Uuid,
        compare_to: Option<Uuid>,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<String> {
        let (from, to) = self.compare_pair(uuid, compare_to).await?;
        self.comparator
            .diff_document(&from, &to, content_type, document_key)
            .await
    }

    /// Releases in `status` scheduled strictly after `after`, soonest first.
    pub async fn list_upcoming_releases(
        &self,
        site_code: &str,
        status: ReleaseStatus,
        after: DateTime<Utc>,
    ) -> PublisherResult<Vec<ContentRelease>> {
        let mut releases: Vec<ContentRelease> = self
            .store
            .list_releases(site_code)
            .await?
            .into_iter()
            .filter(|r| r.status == status && r.publish_datetime.is_some_and(|at| at > after))
            .collect();
        releases.sort_by(|a, b| {
            (a.publish_datetime, &a.title).cmp(&(b.publish_datetime, &b.title))
        });
        Ok(releases)
    }

    pub async fn list_site_codes(&self) -> PublisherResult<Vec<String>> {
        self.site_codes.get(self.store.as_ref()).await
    }

    /// Settle due scheduled releases on every site. One failing site does not stop the
    /// others.
    pub async fn settle_all(&self, now: DateTime<Utc>) -> PublisherResult<Vec<ContentRelease>> {
        let mut promoted = Vec::new();
        for site_code in self.list_site_codes().await? {
            match self.lifecycle.settle_scheduled(&site_code, now).await {
                Ok(Some(release)) => promoted.push(release),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(site_code = %site_code, error = %err, "settling scheduled releases failed");
                }
            }
        }
        Ok(promoted)
    }
}
