//! Browser layer for marginalia page annotations.
//!
//! This crate implements the core DOM traits over `web-sys`, draws the note
//! popups, and persists annotations through extension or local storage. It
//! assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: `BrowserDom`, highlight wrapping on the live document
//! - `selection`: reading the reader's selection as a char-offset range
//! - `popup`: add-note button, note input and note viewer
//! - `overlay`: the content-script controller wiring page events
//! - `storage`: `chrome.storage.local` with a `localStorage` fallback
//! - `export`: copy/download actions for the extension popup
//!
//! # Re-exports
//!
//! This crate re-exports `marginalia-core` for convenience, so consumers
//! only need to depend on `marginalia-browser`.

// Re-export core crate
pub use marginalia_core;
pub use marginalia_core::*;

pub mod dom;
pub mod export;
pub mod overlay;
pub mod popup;
pub mod selection;
pub mod storage;

pub use dom::{BrowserDom, char_to_utf16_offset, utf16_to_char_offset};
pub use export::{TargetPage, copy_export, download_export, export_error_message, target_page};
pub use overlay::{Overlay, OverlayHandle, start};
pub use popup::NoteDisplay;
pub use selection::{SelectionSnapshot, clear_selection, read_selection};
pub use storage::{ExtensionStore, LocalStore, PageStore, extension_storage_available};
