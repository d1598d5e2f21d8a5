//! marginalia-core: text re-anchoring engine for page annotations.
//!
//! This crate provides:
//! - `DomTree` / `HighlightDom` traits for host document abstraction
//! - `MemoryDom` - arena-backed implementation for tests and native hosts
//! - Indexing, locating and span mapping to find saved quotations again
//! - `AnnotationSession` - per-page state and user actions
//! - `AnnotationStore` trait, URL-keyed load/save, and text export

pub mod annotation;
pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod highlight;
pub mod index;
pub mod locate;
pub mod memory;
pub mod normalize;
pub mod page_url;
pub mod session;
pub mod span_map;
pub mod store;

pub use annotation::{Annotation, AnnotationId, AnnotationSet, NoteState};
pub use config::{LocatorConfig, OverlayConfig, RestoreSchedule};
pub use dom::{ContentFilter, DomRange, DomTree, ElementFilter, ElementInfo, HighlightDom, NodeKind};
pub use error::{AnnotateError, DomError, ExportError, StoreError};
pub use export::{ExportDocument, check_exportable, display_time, export_file_name, export_page};
pub use highlight::{AnchorOutcome, RestoreReport, anchor, restore};
pub use index::{TextIndex, TextNodeRecord};
pub use locate::{MatchStrategy, TextMatch, locate, locate_with};
pub use memory::{MemoryDom, NodeId};
pub use normalize::{collapse_whitespace, normalize_quote};
pub use page_url::normalize_page_url;
pub use session::{AnnotationSession, PendingWrite, ViewMode};
pub use smol_str::SmolStr;
pub use span_map::map_offsets_to_dom;
pub use store::{AnnotationStore, MemoryStore, load_page_annotations, save_page_annotations};
