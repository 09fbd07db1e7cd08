use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::release::model::ContentRelease;
use crate::release::version::Version;

/// Notifications for external subscribers (search indexers, audit trail).
/// Fire-and-forget: a failed send never rolls back the operation that emitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PublisherEvent {
    ContentPublished(ContentEvent),
    ContentUnpublished(ContentEvent),
    ReleaseStaged(ReleaseEvent),
    ReleaseLive(ReleaseEvent),
    ReindexRequested(ReleaseEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEvent {
    pub site_code: String,
    pub release_uuid: Uuid,
    pub content_type: String,
    pub document_key: String,
    pub title: Option<String>,
    /// Published body; `None` for unpublish and remove.
    pub content: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEvent {
    pub site_code: String,
    pub release_uuid: Uuid,
    pub title: String,
    pub version: Option<Version>,
    pub publish_datetime: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ContentRelease> for ReleaseEvent {
    fn from(release: &ContentRelease) -> Self {
        Self {
            site_code: release.site_code.clone(),
            release_uuid: release.uuid,
            title: release.title.clone(),
            version: release.version,
            publish_datetime: release.publish_datetime,
            timestamp: Utc::now(),
        }
    }
}
