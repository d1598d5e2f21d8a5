//! WASM bindings for marginalia.
//!
//! Two entry points share one module: the content script calls
//! [`start_content_script`], the extension popup calls [`copy_annotations`]
//! or [`download_annotations`]. Both accept an optional config object using
//! the camelCase field names of `OverlayConfig`.

mod types;

pub use types::*;

use marginalia_browser::{OverlayConfig, OverlayHandle};
use wasm_bindgen::prelude::*;

/// Install the panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );
    let reg = Registry::default().with(wasm_layer);
    // A second module instance on the page keeps the first subscriber.
    let _ = set_global_default(reg);
}

fn parse_config(config: JsValue) -> Result<OverlayConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(OverlayConfig::default());
    }
    Ok(serde_wasm_bindgen::from_value(config)?)
}

/// A running overlay. Keep it alive for the lifetime of the page.
#[wasm_bindgen]
pub struct ContentScript {
    handle: OverlayHandle,
}

#[wasm_bindgen]
impl ContentScript {
    /// Re-run highlight restoration now.
    pub fn restore(&self) -> Option<RestoreSummary> {
        self.handle.restore().map(RestoreSummary::from)
    }

    #[wasm_bindgen(js_name = annotationCount)]
    pub fn annotation_count(&self) -> usize {
        self.handle.annotation_count()
    }

    #[wasm_bindgen(js_name = pageUrl)]
    pub fn page_url(&self) -> Option<String> {
        self.handle.page_url()
    }
}

/// Attach the annotation overlay to the current page.
#[wasm_bindgen(js_name = startContentScript)]
pub fn start_content_script(config: JsValue) -> Result<ContentScript, JsValue> {
    let config = parse_config(config)?;
    let handle = marginalia_browser::start(config)?;
    Ok(ContentScript { handle })
}

/// Popup action: copy the active tab's notes to the clipboard.
#[wasm_bindgen(js_name = copyAnnotations)]
pub async fn copy_annotations(config: JsValue) -> Result<(), JsValue> {
    let config = parse_config(config)?;
    marginalia_browser::copy_export(&config).await
}

/// Popup action: download the active tab's notes as a text file.
#[wasm_bindgen(js_name = downloadAnnotations)]
pub async fn download_annotations(config: JsValue) -> Result<(), JsValue> {
    let config = parse_config(config)?;
    marginalia_browser::download_export(&config).await
}
