//! Release state machine.
//!
//! ```text
//! DRAFT --set_stage--> STAGED --set_live/settle--> LIVE --archive--> ARCHIVED
//!   ^                    |                                              |
//!   +----unset_stage-----+        unfreeze: any frozen state -> DRAFT   |
//!                                 restore: ARCHIVED -> new DRAFT -> LIVE
//! ```
//!
//! Every write holds the site lock and runs the same commit path: version assignment
//! before the write, conflict repair after it, and dynamic-element resolution when the
//! release ends up live. A promotion writes the new live release and the releases it
//! archives in one store call. Work after a committed write only logs its failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::model::{ContentRelease, NewRelease, ReleaseStatus, VersionType};
use super::version::{assign_version, fix_version_conflicts};
use super::{live_release, stage_release};
use crate::document::dynamic::DynamicElementResolver;
use crate::error::{PublisherError, PublisherResult};
use crate::events::bus::EventBus;
use crate::events::types::{PublisherEvent, ReleaseEvent};
use crate::sites::{SiteCodeCache, SiteLocks};
use crate::storage::PublisherStore;

const RESTORED_SUFFIX: &str = " - Restored";

pub struct ReleaseLifecycle<S> {
    store: Arc<S>,
    events: EventBus,
    locks: SiteLocks,
    site_codes: SiteCodeCache,
    resolver: DynamicElementResolver<S>,
}

impl<S> Clone for ReleaseLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            locks: self.locks.clone(),
            site_codes: self.site_codes.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

fn ensure_future(publish_datetime: DateTime<Utc>) -> PublisherResult<()> {
    if publish_datetime <= Utc::now() {
        return Err(PublisherError::validation(
            "publish_datetime",
            format!("{publish_datetime} is in the past"),
        ));
    }
    Ok(())
}

impl<S: PublisherStore> ReleaseLifecycle<S> {
    pub fn new(
        store: Arc<S>,
        events: EventBus,
        locks: SiteLocks,
        site_codes: SiteCodeCache,
        resolver: DynamicElementResolver<S>,
    ) -> Self {
        Self {
            store,
            events,
            locks,
            site_codes,
            resolver,
        }
    }

    async fn load(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        self.store
            .get_release(uuid)
            .await?
            .ok_or_else(|| PublisherError::release_not_found(uuid))
    }

    /// Take the site lock of a release and reload it under the lock.
    async fn lock_release(
        &self,
        uuid: Uuid,
    ) -> PublisherResult<(OwnedMutexGuard<()>, ContentRelease)> {
        let site_code = self.load(uuid).await?.site_code;
        let guard = self.locks.lock(&site_code).await;
        let release = self.load(uuid).await?;
        Ok((guard, release))
    }

    async fn save(&self, release: &mut ContentRelease) -> PublisherResult<()> {
        release.updated_at = Utc::now();
        self.store.update_release(release).await
    }

    /// Write a release through the version hooks. Caller holds the site lock.
    async fn commit(&self, mut release: ContentRelease) -> PublisherResult<ContentRelease> {
        let site_releases = self.store.list_releases(&release.site_code).await?;
        if let Some(version) = assign_version(&mut release, &site_releases) {
            tracing::debug!(release = %release.uuid, %version, "version assigned");
        }
        self.save(&mut release).await?;
        Ok(self.after_commit(release).await)
    }

    /// Conflict repair and, for a live release, dynamic resolution. The write has
    /// already landed, so failures here are logged and the written release returned.
    async fn after_commit(&self, release: ContentRelease) -> ContentRelease {
        if let Err(err) = self.repair_versions(&release.site_code).await {
            tracing::error!(site_code = %release.site_code, error = %err, "version conflict repair failed");
        }

        let release = match self.load(release.uuid).await {
            Ok(reloaded) => reloaded,
            Err(err) => {
                tracing::warn!(release = %release.uuid, error = %err, "reload after commit failed");
                release
            }
        };
        if release.is_live() {
            if let Err(err) = self.resolver.resolve_release(&release).await {
                tracing::error!(
                    site_code = %release.site_code,
                    release = %release.uuid,
                    error = %err,
                    "dynamic element resolution failed"
                );
            }
        }
        release
    }

    async fn repair_versions(&self, site_code: &str) -> PublisherResult<()> {
        let mut releases = self.store.list_releases(site_code).await?;
        let changed = fix_version_conflicts(&mut releases);
        if changed.is_empty() {
            return Ok(());
        }
        tracing::warn!(site_code, reassigned = changed.len(), "repaired version conflicts");
        for release in releases.iter_mut().filter(|r| changed.contains(&r.uuid)) {
            self.save(release).await?;
        }
        Ok(())
    }

    /// Make `release` the only live release of its site, archiving the current live
    /// release and `superseded` in the same write. Caller holds the site lock.
    async fn promote(
        &self,
        mut release: ContentRelease,
        publish_datetime: DateTime<Utc>,
        superseded: Vec<ContentRelease>,
    ) -> PublisherResult<ContentRelease> {
        let site_releases = self.store.list_releases(&release.site_code).await?;
        let now = Utc::now();

        release.status = ReleaseStatus::Live;
        release.publish_datetime = Some(publish_datetime);
        if let Some(version) = assign_version(&mut release, &site_releases) {
            tracing::debug!(release = %release.uuid, %version, "version assigned");
        }
        release.updated_at = now;

        let archived: Vec<ContentRelease> = site_releases
            .into_iter()
            .filter(|r| r.is_live() && r.uuid != release.uuid)
            .chain(superseded)
            .map(|mut r| {
                r.status = ReleaseStatus::Archived;
                r.updated_at = now;
                r
            })
            .collect();
        self.store.swap_live_release(&release, &archived).await?;
        for previous in &archived {
            tracing::info!(site_code = %previous.site_code, release = %previous.uuid, "release archived by promotion");
        }

        let release = self.after_commit(release).await;
        tracing::info!(
            site_code = %release.site_code,
            release = %release.uuid,
            version = ?release.version,
            "release is live"
        );
        self.events
            .notify(PublisherEvent::ReleaseLive(ReleaseEvent::from(&release)));
        Ok(release)
    }

    pub async fn create(&self, new: NewRelease) -> PublisherResult<ContentRelease> {
        if new.site_code.trim().is_empty() {
            return Err(PublisherError::validation("site_code", "must not be empty"));
        }
        if new.title.trim().is_empty() {
            return Err(PublisherError::validation("title", "must not be empty"));
        }
        if let Some(base) = new.base_release {
            let base = self.load(base).await?;
            if base.site_code != new.site_code {
                return Err(PublisherError::validation(
                    "base_release",
                    format!("release {} belongs to site {}", base.uuid, base.site_code),
                ));
            }
        }

        let _guard = self.locks.lock(&new.site_code).await;
        let release = new.into_release(Utc::now());
        self.store.insert_release(&release).await?;
        self.site_codes.invalidate().await;
        tracing::info!(site_code = %release.site_code, release = %release.uuid, "release created");
        Ok(release)
    }

    /// Stage a draft, optionally scheduling its go-live.
    pub async fn set_stage(
        &self,
        uuid: Uuid,
        publish_datetime: Option<DateTime<Utc>>,
    ) -> PublisherResult<ContentRelease> {
        let (_guard, mut release) = self.lock_release(uuid).await?;
        if release.status != ReleaseStatus::Draft {
            return Err(PublisherError::IllegalState(format!(
                "release {} is {}, only drafts can be staged",
                uuid,
                release.status.label()
            )));
        }
        if let Some(at) = publish_datetime {
            ensure_future(at)?;
        }
        if let Some(staged) = stage_release(self.store.as_ref(), &release.site_code).await? {
            if !staged.is_scheduled() {
                return Err(PublisherError::IllegalState(format!(
                    "release {} is already staged for site {}",
                    staged.uuid, release.site_code
                )));
            }
        }

        release.status = ReleaseStatus::Staged;
        release.publish_datetime = publish_datetime;
        let release = self.commit(release).await?;

        tracing::info!(site_code = %release.site_code, release = %release.uuid, "release staged");
        self.events
            .notify(PublisherEvent::ReleaseStaged(ReleaseEvent::from(&release)));
        Ok(release)
    }

    pub async fn unset_stage(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        let (_guard, mut release) = self.lock_release(uuid).await?;
        if release.status != ReleaseStatus::Staged {
            return Err(PublisherError::IllegalState(format!(
                "release {} is {}, only staged releases can be unstaged",
                uuid,
                release.status.label()
            )));
        }
        release.status = ReleaseStatus::Draft;
        release.publish_datetime = None;
        let release = self.commit(release).await?;
        tracing::info!(site_code = %release.site_code, release = %release.uuid, "release unstaged");
        Ok(release)
    }

    /// Promote a draft or staged release now, or schedule it for `publish_datetime`.
    pub async fn set_live(
        &self,
        uuid: Uuid,
        publish_datetime: Option<DateTime<Utc>>,
        publisher: Option<String>,
    ) -> PublisherResult<ContentRelease> {
        let (_guard, mut release) = self.lock_release(uuid).await?;
        if !matches!(release.status, ReleaseStatus::Draft | ReleaseStatus::Staged) {
            return Err(PublisherError::IllegalState(format!(
                "release {} is {} and cannot go live",
                uuid,
                release.status.label()
            )));
        }
        if publisher.is_some() {
            release.publisher = publisher;
        }

        match publish_datetime {
            Some(at) => {
                ensure_future(at)?;
                release.status = ReleaseStatus::Staged;
                release.publish_datetime = Some(at);
                let release = self.commit(release).await?;
                tracing::info!(
                    site_code = %release.site_code,
                    release = %release.uuid,
                    publish_datetime = %at,
                    "release scheduled to go live"
                );
                Ok(release)
            }
            None => self.promote(release, Utc::now(), Vec::new()).await,
        }
    }

    /// Promote the latest scheduled release whose go-live time has passed. Earlier due
    /// releases are superseded and archived.
    pub async fn settle_scheduled(
        &self,
        site_code: &str,
        now: DateTime<Utc>,
    ) -> PublisherResult<Option<ContentRelease>> {
        let _guard = self.locks.lock(site_code).await;
        let mut due: Vec<ContentRelease> = self
            .store
            .list_releases(site_code)
            .await?
            .into_iter()
            .filter(|r| r.is_scheduled() && r.publish_datetime.is_some_and(|at| at <= now))
            .collect();
        due.sort_by_key(|r| r.publish_datetime);

        let Some(winner) = due.pop() else {
            return Ok(None);
        };
        if !due.is_empty() {
            tracing::info!(site_code, superseded = due.len(), "earlier scheduled releases superseded");
        }

        let at = winner.publish_datetime.unwrap_or(now);
        self.promote(winner, at, due).await.map(Some)
    }

    pub async fn archive(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        let (_guard, mut release) = self.lock_release(uuid).await?;
        if !release.is_live() {
            return Err(PublisherError::IllegalState(format!(
                "release {} is {}, only the live release can be archived",
                uuid,
                release.status.label()
            )));
        }
        release.status = ReleaseStatus::Archived;
        let release = self.commit(release).await?;
        tracing::info!(site_code = %release.site_code, release = %release.uuid, "release archived");
        Ok(release)
    }

    /// Return a frozen release to draft and drop its schedule.
    pub async fn unfreeze(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        let (_guard, mut release) = self.lock_release(uuid).await?;
        if release.is_draft() {
            return Err(PublisherError::IllegalState(format!(
                "release {uuid} is already a draft"
            )));
        }
        release.status = ReleaseStatus::Draft;
        release.publish_datetime = None;
        let release = self.commit(release).await?;
        tracing::info!(site_code = %release.site_code, release = %release.uuid, "release unfrozen");
        Ok(release)
    }

    async fn spawn_restore_locked(&self, source: &ContentRelease) -> PublisherResult<ContentRelease> {
        let live = live_release(self.store.as_ref(), &source.site_code).await?;
        if live.is_some_and(|live| live.uuid == source.uuid) {
            return Err(PublisherError::IllegalState(format!(
                "release {} is live and cannot be restored",
                source.uuid
            )));
        }
        if source.status != ReleaseStatus::Archived {
            return Err(PublisherError::IllegalState(format!(
                "release {} is {}, only previously live releases can be restored",
                source.uuid,
                source.status.label()
            )));
        }

        let title = if source.restored {
            source.title.clone()
        } else {
            format!("{}{RESTORED_SUFFIX}", source.title)
        };
        let mut release = NewRelease {
            site_code: source.site_code.clone(),
            title,
            version_type: VersionType::Major,
            base_release: Some(source.uuid),
            ..Default::default()
        }
        .into_release(Utc::now());
        release.restored = true;

        self.store.insert_release(&release).await?;
        tracing::info!(
            site_code = %release.site_code,
            release = %release.uuid,
            source = %source.uuid,
            "restore release created"
        );
        Ok(release)
    }

    /// Create the draft that restores `uuid`, without promoting it.
    pub async fn spawn_restore(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        let (_guard, source) = self.lock_release(uuid).await?;
        self.spawn_restore_locked(&source).await
    }

    /// Restore a previously live release: a new major release based on it goes live.
    pub async fn restore(
        &self,
        uuid: Uuid,
        publisher: Option<String>,
    ) -> PublisherResult<ContentRelease> {
        let (_guard, source) = self.lock_release(uuid).await?;
        let mut release = self.spawn_restore_locked(&source).await?;
        release.publisher = publisher;
        self.promote(release, Utc::now(), Vec::new()).await
    }

    /// Ask subscribers to re-index a release.
    pub async fn reindex(&self, uuid: Uuid) -> PublisherResult<ContentRelease> {
        let release = self.load(uuid).await?;
        tracing::info!(site_code = %release.site_code, release = %release.uuid, "reindex requested");
        self.events
            .notify(PublisherEvent::ReindexRequested(ReleaseEvent::from(&release)));
        Ok(release)
    }
}
