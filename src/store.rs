use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Document, DocumentStore, Query};

pub const CURSOR_COLLECTION: &str = "cursor";
pub const POSTS_COLLECTION: &str = "posts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub source_name: String,
    pub value: i64,
}

/// Snapshot of a post the user chose to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPost {
    pub source_name: String,
    pub index: usize,
    pub content: String,
    pub datetime: String,
}

/// Last viewed position per source.
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn DocumentStore>,
}

impl CursorStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn query(source_name: &str) -> Query {
        Query::new().eq("source_name", source_name)
    }

    /// Returns the stored cursor, creating it at 0 the first time a source is
    /// seen.
    pub fn get_value(&self, source_name: &str) -> Result<i64> {
        let query = Self::query(source_name);
        let doc = match self.store.get(CURSOR_COLLECTION, &query)? {
            Some(doc) => doc,
            None => {
                self.set_value(source_name, 0)?;
                self.store
                    .get(CURSOR_COLLECTION, &query)?
                    .with_context(|| format!("cursor: {source_name} missing after create"))?
            }
        };
        let record: CursorRecord = from_document(doc)
            .with_context(|| format!("cursor: malformed record for {source_name}"))?;
        Ok(record.value)
    }

    pub fn set_value(&self, source_name: &str, value: i64) -> Result<usize> {
        let record = CursorRecord {
            source_name: source_name.to_string(),
            value,
        };
        self.store
            .upsert(CURSOR_COLLECTION, to_document(&record)?, &Self::query(source_name))
            .with_context(|| format!("cursor: set {source_name} to {value}"))
    }
}

/// Saved post snapshots keyed by source and index.
#[derive(Clone)]
pub struct PostStore {
    store: Arc<dyn DocumentStore>,
}

impl PostStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn unique_query(source_name: &str, index: usize) -> Query {
        Query::new()
            .eq("source_name", source_name)
            .eq("index", index as u64)
    }

    pub fn get(&self, source_name: &str, index: usize) -> Result<Option<SavedPost>> {
        self.store
            .get(POSTS_COLLECTION, &Self::unique_query(source_name, index))?
            .map(from_document)
            .transpose()
            .with_context(|| format!("posts: malformed record {source_name}#{index}"))
    }

    pub fn get_all(&self, source_name: &str) -> Result<Vec<SavedPost>> {
        self.store
            .search(POSTS_COLLECTION, &Query::new().eq("source_name", source_name))?
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("posts: malformed record for {source_name}"))
    }

    /// Saves a snapshot, overwriting any existing one at the same key.
    pub fn create(
        &self,
        source_name: &str,
        index: usize,
        content: &str,
        datetime: &str,
    ) -> Result<usize> {
        let post = SavedPost {
            source_name: source_name.to_string(),
            index,
            content: content.to_string(),
            datetime: datetime.to_string(),
        };
        self.store
            .upsert(
                POSTS_COLLECTION,
                to_document(&post)?,
                &Self::unique_query(source_name, index),
            )
            .with_context(|| format!("posts: save {source_name}#{index}"))
    }

    pub fn delete(&self, source_name: &str, index: usize) -> Result<usize> {
        self.store
            .remove(POSTS_COLLECTION, &Self::unique_query(source_name, index))
            .with_context(|| format!("posts: delete {source_name}#{index}"))
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value).context("encode document")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object document, got {other}"),
    }
}

fn from_document<T: for<'de> Deserialize<'de>>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).context("decode document")
}
