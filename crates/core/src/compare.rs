//! Structural comparison of two releases' visible document sets.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use similar::TextDiff;

use crate::document::model::{DocumentId, ReleaseDocument, DYNAMIC_ELEMENT_KEYS};
use crate::document::store::DocumentStore;
use crate::error::{PublisherError, PublisherResult};
use crate::release::model::ContentRelease;
use crate::storage::PublisherStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub document_key: String,
    pub content_type: String,
    pub diff: DiffKind,
    /// Provenance: one side's parameters, or both as `release_from` and
    /// `release_compare_to` for changes.
    pub parameters: Value,
}

impl DiffEntry {
    fn new(id: &DocumentId, diff: DiffKind, parameters: Value) -> Self {
        Self {
            document_key: id.document_key.clone(),
            content_type: id.content_type.clone(),
            diff,
            parameters,
        }
    }
}

/// Body without the dynamic-element bookkeeping key.
fn comparable_body(document: &ReleaseDocument) -> Cow<'_, Value> {
    match &document.document_json {
        Value::Object(body) if body.contains_key(DYNAMIC_ELEMENT_KEYS) => {
            let mut body = body.clone();
            body.shift_remove(DYNAMIC_ELEMENT_KEYS);
            Cow::Owned(Value::Object(body))
        }
        other => Cow::Borrowed(other),
    }
}

/// Same revision on both sides, or equal bodies when either lacks a revision id.
///
/// Bodies are compared without the bookkeeping key. A body whose dynamic references
/// were resolved still differs from one holding the unresolved references.
fn same_fingerprint(from: &ReleaseDocument, to: &ReleaseDocument) -> bool {
    match (from.revision_id(), to.revision_id()) {
        (Some(a), Some(b)) => a == b,
        _ => comparable_body(from) == comparable_body(to),
    }
}

/// Diff two effective document sets. Entries come out sorted by content type, then key.
pub fn diff_document_sets(
    from: &BTreeMap<DocumentId, ReleaseDocument>,
    to: &BTreeMap<DocumentId, ReleaseDocument>,
) -> Vec<DiffEntry> {
    let ids: BTreeSet<&DocumentId> = from.keys().chain(to.keys()).collect();
    ids.into_iter()
        .filter_map(|id| match (from.get(id), to.get(id)) {
            (Some(added), None) => Some(DiffEntry::new(
                id,
                DiffKind::Added,
                Value::Object(added.parameters.clone()),
            )),
            (None, Some(removed)) => Some(DiffEntry::new(
                id,
                DiffKind::Removed,
                Value::Object(removed.parameters.clone()),
            )),
            (Some(a), Some(b)) if !same_fingerprint(a, b) => Some(DiffEntry::new(
                id,
                DiffKind::Changed,
                json!({
                    "release_from": a.parameters,
                    "release_compare_to": b.parameters,
                }),
            )),
            _ => None,
        })
        .collect()
}

/// Unified line diff of two document bodies, pretty-printed.
pub fn document_diff(from: &Value, to: &Value) -> String {
    let pretty = |value: &Value| serde_json::to_string_pretty(value).unwrap_or_default() + "\n";
    let (from, to) = (pretty(from), pretty(to));
    TextDiff::from_lines(&from, &to)
        .unified_diff()
        .context_radius(3)
        .header("release_from", "release_compare_to")
        .to_string()
}

pub struct ReleaseComparator<S> {
    documents: DocumentStore<S>,
}

impl<S> Clone for ReleaseComparator<S> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
        }
    }
}

impl<S: PublisherStore> ReleaseComparator<S> {
    pub fn new(documents: DocumentStore<S>) -> Self {
        Self { documents }
    }

    pub async fn compare(
        &self,
        from: &ContentRelease,
        to: &ContentRelease,
    ) -> PublisherResult<Vec<DiffEntry>> {
        let from_docs = self.documents.effective_documents(from).await?;
        let to_docs = self.documents.effective_documents(to).await?;
        let entries = diff_document_sets(&from_docs, &to_docs);
        tracing::debug!(
            release_from = %from.uuid,
            release_compare_to = %to.uuid,
            entries = entries.len(),
            "releases compared"
        );
        Ok(entries)
    }

    /// Line diff of one document as served by each release. A side without the
    /// document diffs as `null`.
    pub async fn diff_document(
        &self,
        from: &ContentRelease,
        to: &ContentRelease,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<String> {
        let a = self.documents.read(from, content_type, document_key).await?;
        let b = self.documents.read(to, content_type, document_key).await?;
        if a.is_none() && b.is_none() {
            return Err(PublisherError::document_not_found(content_type, document_key));
        }
        let body = |doc: Option<ReleaseDocument>| doc.map_or(Value::Null, |d| d.document_json);
        Ok(document_diff(&body(a), &body(b)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    use super::*;
    use crate::events::bus::EventBus;
    use crate::release::model::NewRelease;
    use crate::storage::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        documents: DocumentStore<MemoryStore>,
        comparator: ReleaseComparator<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let documents = DocumentStore::new(Arc::clone(&store), EventBus::new(8));
        Fixture {
            comparator: ReleaseComparator::new(documents.clone()),
            store,
            documents,
        }
    }

    async fn release(fx: &Fixture, new: NewRelease) -> ContentRelease {
        let release = new.into_release(Utc::now());
        fx.store.insert_release(&release).await.unwrap();
        release
    }

    fn revision(id: u64) -> Map<String, Value> {
        let mut parameters = Map::new();
        parameters.insert("revision_id".into(), json!(id));
        parameters
    }

    async fn put(fx: &Fixture, release: &ContentRelease, ct: &str, key: &str, rev: u64) {
        fx.documents
            .put(release, ct, key, json!({"title": format!("{ct}{key}"), "rev": rev}), revision(rev))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn added_removed_and_changed_in_stable_order() {
        let fx = fixture();
        let a = release(&fx, NewRelease::new("s1", "a")).await;
        let b = release(&fx, NewRelease::new("s1", "b")).await;

        put(&fx, &a, "page", "3", 2).await;
        put(&fx, &a, "cover", "3", 2).await;
        put(&fx, &a, "page", "5", 1).await;
        put(&fx, &b, "page", "3", 1).await;
        put(&fx, &b, "cover", "3", 1).await;
        put(&fx, &b, "page", "5", 1).await;
        put(&fx, &b, "page", "8", 4).await;
        put(&fx, &a, "page", "9", 7).await;

        let entries = fx.comparator.compare(&a, &b).await.unwrap();
        assert_eq!(
            entries,
            vec![
                DiffEntry {
                    document_key: "3".into(),
                    content_type: "cover".into(),
                    diff: DiffKind::Changed,
                    parameters: json!({
                        "release_from": {"revision_id": 2},
                        "release_compare_to": {"revision_id": 1},
                    }),
                },
                DiffEntry {
                    document_key: "3".into(),
                    content_type: "page".into(),
                    diff: DiffKind::Changed,
                    parameters: json!({
                        "release_from": {"revision_id": 2},
                        "release_compare_to": {"revision_id": 1},
                    }),
                },
                DiffEntry {
                    document_key: "8".into(),
                    content_type: "page".into(),
                    diff: DiffKind::Removed,
                    parameters: json!({"revision_id": 4}),
                },
                DiffEntry {
                    document_key: "9".into(),
                    content_type: "page".into(),
                    diff: DiffKind::Added,
                    parameters: json!({"revision_id": 7}),
                },
            ]
        );
    }

    #[test]
    fn bookkeeping_key_alone_is_not_a_change() {
        let id = DocumentId::new("page", "3");
        let body = json!({"title": "T1", "related": [1, 2]});
        let mut flagged = body.clone();
        flagged[DYNAMIC_ELEMENT_KEYS] = json!([["related"]]);

        let from = BTreeMap::from([(
            id.clone(),
            ReleaseDocument::new(Uuid::new_v4(), "page", "3", flagged, Map::new()),
        )]);
        let to = BTreeMap::from([(
            id.clone(),
            ReleaseDocument::new(Uuid::new_v4(), "page", "3", body, Map::new()),
        )]);
        assert!(diff_document_sets(&from, &to).is_empty());

        let mut edited = to.clone();
        if let Some(doc) = edited.get_mut(&id) {
            doc.document_json["title"] = json!("T2");
        }
        assert_eq!(diff_document_sets(&from, &edited)[0].diff, DiffKind::Changed);
    }

    #[tokio::test]
    async fn added_and_removed_are_symmetric() {
        let fx = fixture();
        let a = release(&fx, NewRelease::new("s1", "a")).await;
        let b = release(&fx, NewRelease::new("s1", "b")).await;
        put(&fx, &a, "page", "1", 1).await;
        put(&fx, &a, "page", "2", 1).await;
        put(&fx, &b, "page", "2", 1).await;
        put(&fx, &b, "page", "3", 5).await;

        let forward = fx.comparator.compare(&a, &b).await.unwrap();
        let backward = fx.comparator.compare(&b, &a).await.unwrap();

        let pick = |entries: &[DiffEntry], kind| -> Vec<(String, String, Value)> {
            entries
                .iter()
                .filter(|e| e.diff == kind)
                .map(|e| (e.content_type.clone(), e.document_key.clone(), e.parameters.clone()))
                .collect()
        };
        assert_eq!(pick(&forward, DiffKind::Added), pick(&backward, DiffKind::Removed));
        assert_eq!(pick(&forward, DiffKind::Removed), pick(&backward, DiffKind::Added));
        assert_eq!(forward.len(), 2);
    }

    #[tokio::test]
    async fn empty_release_is_all_added_or_removed() {
        let fx = fixture();
        let a = release(&fx, NewRelease::new("s1", "a")).await;
        let empty = release(&fx, NewRelease::new("s1", "empty")).await;
        put(&fx, &a, "page", "1", 1).await;
        put(&fx, &a, "page", "2", 1).await;

        let entries = fx.comparator.compare(&a, &empty).await.unwrap();
        assert!(entries.iter().all(|e| e.diff == DiffKind::Added));
        assert_eq!(entries.len(), 2);

        let entries = fx.comparator.compare(&empty, &a).await.unwrap();
        assert!(entries.iter().all(|e| e.diff == DiffKind::Removed));
        assert!(fx.comparator.compare(&empty, &empty).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tombstones_show_as_removed() {
        let fx = fixture();
        let live = release(&fx, NewRelease::new("s1", "live")).await;
        let next = release(&fx, NewRelease::new("s1", "next").base_release(live.uuid)).await;
        put(&fx, &live, "page", "1", 1).await;
        put(&fx, &live, "page", "2", 1).await;

        assert!(fx.comparator.compare(&next, &live).await.unwrap().is_empty());

        fx.documents.soft_delete(&next, "page", "2").await.unwrap();
        let entries = fx.comparator.compare(&next, &live).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].diff, DiffKind::Removed);
        assert_eq!(entries[0].document_key, "2");
    }

    #[tokio::test]
    async fn bodies_are_compared_without_revision_ids() {
        let fx = fixture();
        let a = release(&fx, NewRelease::new("s1", "a")).await;
        let b = release(&fx, NewRelease::new("s1", "b")).await;
        fx.documents
            .put(&a, "page", "1", json!({"title": "A"}), Map::new())
            .await
            .unwrap();
        fx.documents
            .put(&b, "page", "1", json!({"title": "A"}), Map::new())
            .await
            .unwrap();
        assert!(fx.comparator.compare(&a, &b).await.unwrap().is_empty());

        fx.documents
            .put(&b, "page", "1", json!({"title": "B"}), Map::new())
            .await
            .unwrap();
        let entries = fx.comparator.compare(&a, &b).await.unwrap();
        assert_eq!(entries[0].diff, DiffKind::Changed);

        let diff = fx.comparator.diff_document(&a, &b, "page", "1").await.unwrap();
        assert!(diff.contains("-  \"title\": \"A\""));
        assert!(diff.contains("+  \"title\": \"B\""));
        assert!(fx
            .comparator
            .diff_document(&a, &b, "page", "404")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn diff_kind_serializes_by_name() {
        assert_eq!(serde_json::to_value(DiffKind::Changed).unwrap(), json!("Changed"));
    }
}
