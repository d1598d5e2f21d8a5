//! Persistence of per-page annotation sets.
//!
//! Keys are page URLs. Data written by older builds may sit under the exact
//! URL (query string and all), so loading falls back through progressively
//! looser lookups and migrates what it finds to the normalized key.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::annotation::AnnotationSet;
use crate::error::StoreError;
use crate::page_url::normalize_page_url;

/// Async key-value backend holding one annotation set per key.
pub trait AnnotationStore {
    /// Set stored under `key`, if any. A value of another shape reads as
    /// absent, since other scripts may share the backend.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<AnnotationSet>, StoreError>>;

    /// Replace whatever is stored under `key`.
    fn set(&self, key: &str, set: &AnnotationSet)
    -> impl Future<Output = Result<(), StoreError>>;

    /// Every stored entry as raw JSON. Entries of other shapes may be present.
    fn get_all(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, serde_json::Value>, StoreError>>;
}

/// Load the annotations saved for `page_url`.
///
/// Tries the exact URL, then its normalized form, then scans every key for one
/// that normalizes to the same page. A hit from the scan is rewritten under
/// the normalized key. No data gives an empty set.
///
/// A stored empty set is a hit: it is what deleting the last note leaves
/// behind, and it must shadow older entries for the same page.
pub async fn load_page_annotations<S: AnnotationStore>(
    store: &S,
    page_url: &str,
) -> Result<AnnotationSet, StoreError> {
    if let Some(set) = store.get(page_url).await? {
        tracing::debug!(key = page_url, count = set.len(), "store: loaded by exact url");
        return Ok(set);
    }

    let normalized = normalize_page_url(page_url);
    if normalized != page_url {
        if let Some(set) = store.get(&normalized).await? {
            tracing::debug!(key = %normalized, count = set.len(), "store: loaded by normalized url");
            return Ok(set);
        }
    }

    for (key, value) in store.get_all().await? {
        if key == page_url || key == normalized || normalize_page_url(&key) != normalized {
            continue;
        }
        let Ok(set) = serde_json::from_value::<AnnotationSet>(value) else {
            continue;
        };
        if set.is_empty() {
            continue;
        }
        tracing::info!(from = %key, to = %normalized, "store: migrating annotations");
        store.set(&normalized, &set).await?;
        return Ok(set);
    }

    Ok(AnnotationSet::new())
}

/// Persist `set` for `page_url`, leaving out the pending annotation.
///
/// Written under the normalized URL, and under the exact URL too when the two
/// differ so older readers still find it.
pub async fn save_page_annotations<S: AnnotationStore>(
    store: &S,
    page_url: &str,
    set: &AnnotationSet,
) -> Result<(), StoreError> {
    let persisted = set.persisted();
    let normalized = normalize_page_url(page_url);
    store.set(&normalized, &persisted).await?;
    if normalized != page_url {
        store.set(page_url, &persisted).await?;
    }
    tracing::debug!(key = %normalized, count = persisted.len(), "store: saved annotations");
    Ok(())
}

/// JSON-in-memory store for tests and hosts without extension storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, serde_json::Value>>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an arbitrary JSON value under `key`, bypassing the annotation shape.
    pub fn insert_raw(&self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.borrow_mut().insert(key.into(), value);
    }

    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Make every subsequent `set` fail, as a full quota would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl AnnotationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<AnnotationSet>, StoreError> {
        let Some(value) = self.entries.borrow().get(key).cloned() else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                tracing::debug!(key, error = %e, "store: ignoring foreign entry");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, set: &AnnotationSet) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        let value = serde_json::to_value(set)?;
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        Ok(self.entries.borrow().clone())
    }
}
