//! Error types for annotation operations.
//!
//! Re-anchoring never surfaces these to the reader; they only propagate out of
//! direct user actions (create, save, delete, export).

use miette::Diagnostic;
use thiserror::Error;

use crate::annotation::AnnotationId;

/// A DOM mutation could not be performed. The tree is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum DomError {
    /// Boundary node is not a text node or no longer attached to the tree.
    #[error("range boundary is not an attached text node")]
    #[diagnostic(code(marginalia::dom::boundary))]
    InvalidBoundary,

    /// Offset lies past the end of its boundary node.
    #[error("offset {offset} is out of bounds for a node of length {len}")]
    #[diagnostic(code(marginalia::dom::offset))]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// Range end precedes its start in document order.
    #[error("range end precedes range start")]
    #[diagnostic(code(marginalia::dom::inverted))]
    InvertedRange,

    /// Range selects no characters.
    #[error("range is empty")]
    #[diagnostic(code(marginalia::dom::empty))]
    EmptyRange,

    /// The host DOM threw while splitting or inserting.
    #[error("host DOM rejected the mutation: {0}")]
    #[diagnostic(code(marginalia::dom::platform))]
    Platform(String),
}

/// The annotation store backend failed.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum StoreError {
    /// Backend-specific failure (quota, extension context gone, ...).
    #[error("storage backend error: {0}")]
    #[diagnostic(code(marginalia::store::backend))]
    Backend(String),

    /// Stored value did not have the annotation shape.
    #[error(transparent)]
    #[diagnostic(code(marginalia::store::serde))]
    Serde(#[from] serde_json::Error),
}

/// Errors from user-initiated annotation actions.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum AnnotateError {
    #[error("failed to create highlight")]
    #[diagnostic(
        code(marginalia::annotate::highlight),
        help("try selecting the text again")
    )]
    Dom(#[from] DomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    /// Selection was empty after trimming.
    #[error("selection contains no text")]
    #[diagnostic(code(marginalia::annotate::empty_selection))]
    EmptySelection,

    #[error("no annotation with id {0}")]
    #[diagnostic(code(marginalia::annotate::unknown))]
    UnknownAnnotation(AnnotationId),
}

/// Errors from the export path.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ExportError {
    #[error("annotations cannot be exported from {0}")]
    #[diagnostic(code(marginalia::export::unsupported_page))]
    UnsupportedPage(String),

    #[error("no annotations found for this page")]
    #[diagnostic(code(marginalia::export::empty))]
    NothingToExport,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}
