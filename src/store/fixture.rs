//! Local document stores: a directory of JSON files, and an in-memory map.
//!
//! Fixture documents are plain JSON (not the Firestore wire encoding),
//! stored at `{root}/{collection}/{document}.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::logging::{info, obj, v_str, Domain};
use crate::store::DocumentStore;
use crate::trial::FieldMap;

pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, collection: &str, document: &str) -> PathBuf {
        self.root.join(collection).join(format!("{}.json", document))
    }
}

fn not_found(collection: &str, document: &str) -> FetchError {
    FetchError::NotFound {
        collection: collection.to_string(),
        document: document.to_string(),
    }
}

/// Ids with path separators or `..` would escape the fixture root.
fn is_plain_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

fn read_document(path: &Path) -> Result<FieldMap, FetchError> {
    let text = std::fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_owned(),
        source,
    })?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(FetchError::Decode(format!(
            "{} does not hold a JSON object",
            path.display()
        ))),
        Err(e) => Err(FetchError::Decode(format!("{}: {}", path.display(), e))),
    }
}

#[async_trait]
impl DocumentStore for FixtureStore {
    async fn fetch(&self, collection: &str, document: &str) -> Result<FieldMap, FetchError> {
        if !is_plain_segment(collection) || !is_plain_segment(document) {
            return Err(not_found(collection, document));
        }
        let path = self.path_for(collection, document);
        if !path.is_file() {
            return Err(not_found(collection, document));
        }
        let fields = read_document(&path)?;
        info(
            Domain::Fetch,
            "fixture_read",
            obj(&[
                ("collection", v_str(collection)),
                ("document", v_str(document)),
                ("path", v_str(&path.to_string_lossy())),
            ]),
        );
        Ok(fields)
    }
}

/// Documents held in memory, keyed by (collection, document).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: HashMap<(String, String), FieldMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collection: &str, document: &str, fields: FieldMap) -> Self {
        self.insert(collection, document, fields);
        self
    }

    pub fn insert(&mut self, collection: &str, document: &str, fields: FieldMap) {
        self.docs
            .insert((collection.to_string(), document.to_string()), fields);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, collection: &str, document: &str) -> Result<FieldMap, FetchError> {
        self.docs
            .get(&(collection.to_string(), document.to_string()))
            .cloned()
            .ok_or_else(|| not_found(collection, document))
    }
}
