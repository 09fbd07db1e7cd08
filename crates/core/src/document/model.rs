use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Parameter recording which content revision produced a snapshot.
pub const REVISION_ID: &str = "revision_id";
/// Parameter flagging documents that still hold unresolved dynamic references.
pub const HAVE_DYNAMIC_ELEMENTS: &str = "have_dynamic_elements";
/// Bookkeeping key listing the dynamic reference paths inside a document body.
pub const DYNAMIC_ELEMENT_KEYS: &str = "dynamic_element_keys";

/// A serialized content item stored in one release.
/// Maps to the `release_documents` table, keyed by (release, content type, key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDocument {
    pub release_uuid: Uuid,
    pub content_type: String,
    pub document_key: String,
    pub document_json: Value,
    /// Tombstone written by `remove`. Hidden from live reads, kept for diffs.
    pub deleted: bool,
    pub parameters: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl ReleaseDocument {
    pub fn new(
        release_uuid: Uuid,
        content_type: impl Into<String>,
        document_key: impl Into<String>,
        document_json: Value,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            release_uuid,
            content_type: content_type.into(),
            document_key: document_key.into(),
            document_json,
            deleted: false,
            parameters,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> DocumentId {
        DocumentId::new(&self.content_type, &self.document_key)
    }

    pub fn revision_id(&self) -> Option<&Value> {
        self.parameters.get(REVISION_ID)
    }

    pub fn has_dynamic_elements(&self) -> bool {
        self.parameters
            .get(HAVE_DYNAMIC_ELEMENTS)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn title(&self) -> Option<&str> {
        self.document_json.get("title").and_then(Value::as_str)
    }
}

/// Address of a document inside a release. Orders by content type, then key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub content_type: String,
    pub document_key: String,
}

impl DocumentId {
    pub fn new(content_type: impl Into<String>, document_key: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            document_key: document_key.into(),
        }
    }
}

/// Selects the release a read targets: the site's live release or a specific one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseSelector {
    Live,
    Release(Uuid),
}

impl ReleaseSelector {
    /// `"live"` or a release uuid.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("live") {
            Some(ReleaseSelector::Live)
        } else {
            Uuid::parse_str(raw).ok().map(ReleaseSelector::Release)
        }
    }
}
