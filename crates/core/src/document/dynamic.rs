//! Dynamic elements: references embedded in a document body that point at another
//! content item's serialized view, resolved by lookup instead of being inlined at
//! publish time.
//!
//! A reference looks like `{"id": 4, "app": "x", "class": "Y", "serializer": "cover",
//! "dynamic": true}`. Resolution replaces it with the referenced document; references
//! that cannot be resolved are pruned together with their enclosing container.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::model::DYNAMIC_ELEMENT_KEYS;
use super::path::{self, find_dynamic_paths, JsonPath};
use super::store::DocumentStore;
use crate::error::PublisherResult;
use crate::release::model::ContentRelease;
use crate::storage::PublisherStore;

/// Where one serializer view of a content item is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerDescriptor {
    pub key: String,
    pub content_type: String,
}

impl SerializerDescriptor {
    pub fn new(key: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_type: content_type.into(),
        }
    }
}

/// A content item with named serializer views (`default`, `cover`, ...).
pub trait Describable: Send + Sync {
    fn serializers(&self) -> BTreeMap<String, SerializerDescriptor>;

    /// Body of one view. Registries that only address documents return `None`.
    fn serialize(&self, _view: &str) -> Option<Value> {
        None
    }
}

/// Looks up content items by (app, class) and id. `None` means the item no longer
/// exists.
pub trait SerializerRegistry: Send + Sync {
    fn describe(&self, app: &str, class: &str, id: &Value) -> Option<Arc<dyn Describable>>;
}

/// Explicitly registered items.
#[derive(Default, Clone)]
pub struct MapRegistry {
    items: HashMap<(String, String, String), Arc<dyn Describable>>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        app: &str,
        class: &str,
        id: &Value,
        item: Arc<dyn Describable>,
    ) -> &mut Self {
        self.items.insert(
            (app.to_lowercase(), class.to_lowercase(), id_key(id)),
            item,
        );
        self
    }
}

fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SerializerRegistry for MapRegistry {
    fn describe(&self, app: &str, class: &str, id: &Value) -> Option<Arc<dyn Describable>> {
        self.items
            .get(&(app.to_lowercase(), class.to_lowercase(), id_key(id)))
            .cloned()
    }
}

/// Addresses every item by convention: the document key is the id and the content type
/// is the serializer name. Existence is left to the document lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConventionRegistry;

struct ConventionItem {
    key: String,
}

impl Describable for ConventionItem {
    fn serializers(&self) -> BTreeMap<String, SerializerDescriptor> {
        ["default", "cover"]
            .into_iter()
            .map(|view| {
                let content_type = if view == "default" { "page" } else { view };
                (
                    view.to_string(),
                    SerializerDescriptor::new(self.key.clone(), content_type),
                )
            })
            .collect()
    }
}

impl SerializerRegistry for ConventionRegistry {
    fn describe(&self, _app: &str, _class: &str, id: &Value) -> Option<Arc<dyn Describable>> {
        match id {
            Value::Null => None,
            id => Some(Arc::new(ConventionItem { key: id_key(id) })),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DynamicReference {
    id: Value,
    app: String,
    class: String,
    serializer: String,
}

pub struct DynamicElementResolver<S> {
    documents: DocumentStore<S>,
    registry: Arc<dyn SerializerRegistry>,
}

impl<S> Clone for DynamicElementResolver<S> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: PublisherStore> DynamicElementResolver<S> {
    pub fn new(documents: DocumentStore<S>, registry: Arc<dyn SerializerRegistry>) -> Self {
        Self {
            documents,
            registry,
        }
    }

    /// Paths to resolve: the stored bookkeeping list when present and readable,
    /// otherwise a fresh walk of the body.
    pub fn dynamic_paths(document: &Value) -> Vec<JsonPath> {
        document
            .get(DYNAMIC_ELEMENT_KEYS)
            .and_then(|keys| serde_json::from_value::<Vec<JsonPath>>(keys.clone()).ok())
            .unwrap_or_else(|| find_dynamic_paths(document))
    }

    async fn fetch(&self, release: &ContentRelease, descriptor: &Value) -> Option<Value> {
        let reference: DynamicReference = serde_json::from_value(descriptor.clone()).ok()?;
        let item = self
            .registry
            .describe(&reference.app, &reference.class, &reference.id)?;
        let target = item.serializers().remove(&reference.serializer)?;

        match self
            .documents
            .read(release, &target.content_type, &target.key)
            .await
        {
            Ok(found) => found.map(|doc| doc.document_json),
            Err(err) => {
                tracing::warn!(
                    release = %release.uuid,
                    content_type = %target.content_type,
                    document_key = %target.key,
                    error = %err,
                    "dynamic element lookup failed"
                );
                None
            }
        }
    }

    /// Splice the referenced documents into `document` at `paths`.
    ///
    /// Unresolvable references prune their enclosing container; prunes run in reverse
    /// order so earlier array indices stay valid. The bookkeeping key is dropped.
    /// Returns the rewritten document and whether anything changed.
    pub async fn resolve(
        &self,
        release: &ContentRelease,
        mut document: Value,
        paths: &[JsonPath],
    ) -> (Value, bool) {
        let mut prune: Vec<JsonPath> = Vec::new();

        for target in paths {
            let resolved = match path::get(&document, target) {
                Ok(descriptor) => self.fetch(release, descriptor).await,
                Err(_) => None,
            };
            let spliced = match resolved {
                Some(value) => path::set(&mut document, target, value).is_ok(),
                None => false,
            };
            if !spliced {
                tracing::warn!(
                    release = %release.uuid,
                    path = ?target,
                    "pruning unresolvable dynamic element"
                );
                let container = match target.split_last() {
                    Some((_, parent)) if !parent.is_empty() => parent.to_vec(),
                    _ => target.clone(),
                };
                prune.push(container);
            }
        }

        for container in prune.iter().rev() {
            if let Err(err) = path::remove(&mut document, container) {
                tracing::debug!(path = ?container, error = %err, "prune target already gone");
            }
        }

        let had_bookkeeping = document
            .as_object_mut()
            .and_then(|body| body.shift_remove(DYNAMIC_ELEMENT_KEYS))
            .is_some();

        let changed = !paths.is_empty() || had_bookkeeping;
        (document, changed)
    }

    /// Resolve on read without persisting.
    pub async fn preview(&self, release: &ContentRelease, document: Value) -> Value {
        let paths = Self::dynamic_paths(&document);
        self.resolve(release, document, &paths).await.0
    }

    /// Resolve and persist every own document of `release` flagged as holding dynamic
    /// elements. Returns how many documents were rewritten.
    pub async fn resolve_release(&self, release: &ContentRelease) -> PublisherResult<usize> {
        let mut rewritten = 0;
        for mut document in self.documents.list(release).await? {
            if document.deleted || !document.has_dynamic_elements() {
                continue;
            }
            let paths = Self::dynamic_paths(&document.document_json);
            let body = std::mem::take(&mut document.document_json);
            let (body, changed) = self.resolve(release, body, &paths).await;
            if changed {
                document.document_json = body;
                document.updated_at = chrono::Utc::now();
                self.documents.save(&document).await?;
                rewritten += 1;
            }
        }
        if rewritten > 0 {
            tracing::info!(
                release = %release.uuid,
                rewritten,
                "resolved dynamic elements for live release"
            );
        }
        Ok(rewritten)
    }
}
