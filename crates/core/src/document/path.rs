//! Key-path addressing inside JSON documents.
//!
//! A path is a list of object keys and array indices, serialized as a plain JSON array
//! (`["body", 2, "value", "ref"]`) so it can be stored inside the document itself.
//! Objects keep their key order, so walks visit keys in document order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

pub type JsonPath = Vec<PathSegment>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("key {0:?} not found")]
    MissingKey(String),
    #[error("index {0} out of bounds")]
    IndexOutOfBounds(usize),
    #[error("segment {0:?} does not address a container")]
    NotAContainer(PathSegment),
    #[error("empty path")]
    EmptyPath,
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Result<&'a Value, PathError> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.get(key).ok_or_else(|| PathError::MissingKey(key.clone()))
        }
        (Value::Array(items), PathSegment::Index(index)) => {
            items.get(*index).ok_or(PathError::IndexOutOfBounds(*index))
        }
        _ => Err(PathError::NotAContainer(segment.clone())),
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Result<&'a mut Value, PathError> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map
            .get_mut(key)
            .ok_or_else(|| PathError::MissingKey(key.clone())),
        (Value::Array(items), PathSegment::Index(index)) => items
            .get_mut(*index)
            .ok_or(PathError::IndexOutOfBounds(*index)),
        _ => Err(PathError::NotAContainer(segment.clone())),
    }
}

pub fn get<'a>(document: &'a Value, path: &[PathSegment]) -> Result<&'a Value, PathError> {
    path.iter().try_fold(document, step)
}

pub fn get_mut<'a>(document: &'a mut Value, path: &[PathSegment]) -> Result<&'a mut Value, PathError> {
    path.iter().try_fold(document, step_mut)
}

/// Replace the value at `path`. The parent must exist; object keys are inserted if
/// missing, array indices must be in bounds.
pub fn set(document: &mut Value, path: &[PathSegment], value: Value) -> Result<(), PathError> {
    let (last, parent_path) = path.split_last().ok_or(PathError::EmptyPath)?;
    match (get_mut(document, parent_path)?, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Array(items), PathSegment::Index(index)) => {
            let slot = items
                .get_mut(*index)
                .ok_or(PathError::IndexOutOfBounds(*index))?;
            *slot = value;
            Ok(())
        }
        _ => Err(PathError::NotAContainer(last.clone())),
    }
}

/// Remove the value at `path` from its parent and return it. Array elements after the
/// removed index shift down.
pub fn remove(document: &mut Value, path: &[PathSegment]) -> Result<Value, PathError> {
    let (last, parent_path) = path.split_last().ok_or(PathError::EmptyPath)?;
    match (get_mut(document, parent_path)?, last) {
        (Value::Object(map), PathSegment::Key(key)) => map
            .shift_remove(key)
            .ok_or_else(|| PathError::MissingKey(key.clone())),
        (Value::Array(items), PathSegment::Index(index)) => {
            if *index < items.len() {
                Ok(items.remove(*index))
            } else {
                Err(PathError::IndexOutOfBounds(*index))
            }
        }
        _ => Err(PathError::NotAContainer(last.clone())),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Collect the paths of every object carrying a truthy scalar `dynamic` key.
///
/// Depth-first, in order of first encounter. The document root is never reported.
pub fn find_dynamic_paths(document: &Value) -> Vec<JsonPath> {
    let mut found = Vec::new();
    let mut current = Vec::new();
    walk(document, &mut current, &mut found);
    found
}

fn walk(value: &Value, current: &mut JsonPath, found: &mut Vec<JsonPath>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "dynamic" && is_truthy(child) && !current.is_empty() {
                    found.push(current.clone());
                    continue;
                }
                current.push(PathSegment::Key(key.clone()));
                walk(child, current, found);
                current.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                current.push(PathSegment::Index(index));
                walk(child, current, found);
                current.pop();
            }
        }
        _ => {}
    }
}
