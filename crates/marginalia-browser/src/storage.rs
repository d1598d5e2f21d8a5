//! Annotation storage backends.
//!
//! Inside an extension, annotations live in `chrome.storage.local`. Plain
//! pages (demos, tests) fall back to `window.localStorage` via gloo-storage.

use std::collections::BTreeMap;

use gloo_storage::errors::StorageError;
use gloo_storage::{LocalStorage, Storage};
use js_sys::{Object, Reflect};
use marginalia_core::{AnnotationSet, AnnotationStore, StoreError};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

// === chrome.storage.local binding ===
//
// web-sys has no extension API bindings, so the two calls we need are
// declared here. Both return promises under Manifest V3.

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get, catch)]
    fn chrome_storage_get(keys: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set, catch)]
    fn chrome_storage_set(items: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

fn backend_error(e: JsValue) -> StoreError {
    let message = e
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| e.as_string())
        .unwrap_or_else(|| format!("{e:?}"));
    StoreError::Backend(message)
}

fn decode_error(e: serde_wasm_bindgen::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Whether the property path `path` resolves to an object on the global scope.
pub(crate) fn global_path_exists(path: &[&str]) -> bool {
    path.iter()
        .try_fold(JsValue::from(js_sys::global()), |obj, key| {
            Reflect::get(&obj, &JsValue::from_str(key))
                .ok()
                .filter(|v| v.is_object())
        })
        .is_some()
}

/// Whether `chrome.storage.local` is reachable from this context.
pub fn extension_storage_available() -> bool {
    global_path_exists(&["chrome", "storage", "local"])
}

/// `chrome.storage.local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionStore;

impl ExtensionStore {
    async fn fetch(&self, keys: &JsValue) -> Result<JsValue, StoreError> {
        let promise = chrome_storage_get(keys).map_err(backend_error)?;
        JsFuture::from(promise).await.map_err(backend_error)
    }
}

impl AnnotationStore for ExtensionStore {
    async fn get(&self, key: &str) -> Result<Option<AnnotationSet>, StoreError> {
        let result = self.fetch(&JsValue::from_str(key)).await?;
        let value = Reflect::get(&result, &JsValue::from_str(key)).map_err(backend_error)?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        match serde_wasm_bindgen::from_value(value) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                tracing::debug!(key, error = %e, "storage: ignoring foreign entry");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, set: &AnnotationSet) -> Result<(), StoreError> {
        let value = set
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(decode_error)?;
        let items = Object::new();
        Reflect::set(&items, &JsValue::from_str(key), &value).map_err(backend_error)?;
        let promise = chrome_storage_set(&items).map_err(backend_error)?;
        JsFuture::from(promise).await.map_err(backend_error)?;
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        let result = self.fetch(&JsValue::NULL).await?;
        let Some(object) = result.dyn_ref::<Object>() else {
            return Ok(BTreeMap::new());
        };
        let mut entries = BTreeMap::new();
        for key in Object::keys(object).iter() {
            let Some(name) = key.as_string() else {
                continue;
            };
            let value = Reflect::get(object, &key).map_err(backend_error)?;
            match serde_wasm_bindgen::from_value::<serde_json::Value>(value) {
                Ok(json) => {
                    entries.insert(name, json);
                }
                Err(e) => tracing::debug!(key = %name, error = %e, "storage: skipping entry"),
            }
        }
        Ok(entries)
    }
}

/// `window.localStorage`, one JSON string per page key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl AnnotationStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<AnnotationSet>, StoreError> {
        match LocalStorage::get::<AnnotationSet>(key) {
            Ok(set) => Ok(Some(set)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(StorageError::SerdeError(e)) => {
                tracing::debug!(key, error = %e, "storage: ignoring foreign entry");
                Ok(None)
            }
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    async fn set(&self, key: &str, set: &AnnotationSet) -> Result<(), StoreError> {
        LocalStorage::set(key, set).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_all(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        let raw = LocalStorage::raw();
        let mut entries = BTreeMap::new();
        for i in 0..LocalStorage::length() {
            let Ok(Some(key)) = raw.key(i) else {
                continue;
            };
            // Other scripts share localStorage; skip values that are not JSON.
            if let Ok(value) = LocalStorage::get::<serde_json::Value>(&key) {
                entries.insert(key, value);
            }
        }
        Ok(entries)
    }
}

/// Whichever backend this context supports.
#[derive(Debug, Clone, Copy)]
pub enum PageStore {
    Extension(ExtensionStore),
    Local(LocalStore),
}

impl PageStore {
    pub fn detect() -> Self {
        if extension_storage_available() {
            PageStore::Extension(ExtensionStore)
        } else {
            tracing::info!("storage: extension storage unavailable, using localStorage");
            PageStore::Local(LocalStore)
        }
    }
}

impl AnnotationStore for PageStore {
    async fn get(&self, key: &str) -> Result<Option<AnnotationSet>, StoreError> {
        match self {
            PageStore::Extension(s) => s.get(key).await,
            PageStore::Local(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, set: &AnnotationSet) -> Result<(), StoreError> {
        match self {
            PageStore::Extension(s) => s.set(key, set).await,
            PageStore::Local(s) => s.set(key, set).await,
        }
    }

    async fn get_all(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        match self {
            PageStore::Extension(s) => s.get_all().await,
            PageStore::Local(s) => s.get_all().await,
        }
    }
}
