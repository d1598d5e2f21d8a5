//! Extension popup actions: copy or download the active tab's notes.

use chrono::{Local, Utc};
use js_sys::{Array, Object, Reflect};
use marginalia_core::{ExportError, OverlayConfig, export_file_name, export_page};
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url, Window};

use crate::storage::{PageStore, global_path_exists};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query, catch)]
    fn chrome_tabs_query(query: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

/// The page whose notes are exported.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetPage {
    pub url: Option<String>,
    pub title: Option<String>,
}

/// The active tab when running as an extension popup, else this document.
pub async fn target_page(window: &Window) -> Result<TargetPage, JsValue> {
    if global_path_exists(&["chrome", "tabs"]) {
        let query = Object::new();
        Reflect::set(&query, &JsValue::from_str("active"), &JsValue::TRUE)?;
        Reflect::set(&query, &JsValue::from_str("currentWindow"), &JsValue::TRUE)?;
        let tabs = JsFuture::from(chrome_tabs_query(&query)?).await?;
        let tabs: Vec<TargetPage> = serde_wasm_bindgen::from_value(tabs)?;
        return Ok(tabs.into_iter().next().unwrap_or_default());
    }
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    Ok(TargetPage {
        url: Some(window.location().href()?),
        title: Some(document.title()),
    })
}

fn alert(window: &Window, message: &str) {
    if let Err(e) = window.alert_with_message(message) {
        tracing::warn!("export: alert failed: {:?}", e);
    }
}

/// Reader-facing message for an export that produced nothing.
pub fn export_error_message(error: &ExportError) -> &'static str {
    match error {
        ExportError::UnsupportedPage(_) => {
            "Please navigate to a supported article to export annotations."
        }
        ExportError::NothingToExport => "No annotations found for this page.",
        _ => "Unable to read annotations for this page.",
    }
}

/// Render the target page's notes, alerting and returning `None` on failure.
async fn render(window: &Window, config: &OverlayConfig) -> Result<Option<String>, JsValue> {
    let page = target_page(window).await?;
    let url = page.url.unwrap_or_default();
    let title = page.title.unwrap_or_default();
    let store = PageStore::detect();
    let exported_at = Local::now().fixed_offset();

    match export_page(
        &store,
        &title,
        &url,
        config.export_host_filter.as_deref(),
        exported_at,
    )
    .await
    {
        Ok(text) => Ok(Some(text)),
        Err(e) => {
            tracing::info!(%url, "export: {}", e);
            alert(window, export_error_message(&e));
            Ok(None)
        }
    }
}

/// Copy the export text to the clipboard.
pub async fn copy_export(config: &OverlayConfig) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let Some(text) = render(&window, config).await? else {
        return Ok(());
    };

    let clipboard = window.navigator().clipboard();
    match JsFuture::from(clipboard.write_text(&text)).await {
        Ok(_) => alert(&window, "Annotations copied to clipboard!"),
        Err(e) => {
            tracing::warn!("export: clipboard write failed: {:?}", e);
            alert(
                &window,
                "Unable to copy to clipboard. Please try the \"Download as Text File\" option instead.",
            );
        }
    }
    Ok(())
}

/// Save the export text as `annotations-<millis>.txt`.
pub async fn download_export(config: &OverlayConfig) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let Some(text) = render(&window, config).await? else {
        return Ok(());
    };
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let parts = Array::new();
    parts.push(&JsValue::from_str(&text));
    let opts = BlobPropertyBag::new();
    opts.set_type("text/plain");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &opts)?;
    let href = Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&href);
    anchor.set_download(&export_file_name(Utc::now()));
    anchor.click();
    Url::revoke_object_url(&href)?;

    alert(&window, "Annotations downloaded!");
    Ok(())
}
