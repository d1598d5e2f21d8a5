//! Plain-text export of a page's notes.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::annotation::{Annotation, AnnotationSet};
use crate::error::ExportError;
use crate::page_url::host_matches;
use crate::store::{AnnotationStore, load_page_annotations};

const HEADER_RULE: &str = "==============================";
const ENTRY_RULE: &str = "──────────────────────────────";

/// Everything that goes into one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub title: String,
    pub url: String,
    /// Export time. Its offset is also used to render creation times.
    pub exported_at: DateTime<FixedOffset>,
    /// Saved annotations only, in set order.
    pub annotations: Vec<Annotation>,
}

impl ExportDocument {
    /// Collect the saved annotations of `set`. `None` if there are none.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        exported_at: DateTime<FixedOffset>,
        set: &AnnotationSet,
    ) -> Option<Self> {
        let annotations: Vec<Annotation> = set.persisted().iter().cloned().collect();
        if annotations.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            url: url.into(),
            exported_at,
            annotations,
        })
    }

    pub fn render(&self) -> String {
        let offset = *self.exported_at.offset();
        let mut out = format!(
            "Article: {}\nURL: {}\nDate Exported: {}\n\n{HEADER_RULE}\n\n",
            self.title,
            self.url,
            display_time(&self.exported_at),
        );
        for (i, annotation) in self.annotations.iter().enumerate() {
            let created = annotation.timestamp.with_timezone(&offset);
            out.push_str(&format!(
                "Annotation {}\n{ENTRY_RULE}\nQuote:\n\"{}\"\n\nNote:\n{}\n\nCreated: {}\n\n",
                i + 1,
                annotation.text,
                annotation.note.text(),
                display_time(&created),
            ));
        }
        out
    }
}

/// `M/D/YYYY, h:mm:ss AM` in the time's own offset.
pub fn display_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Download file name for an export made at `now`.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("annotations-{}.txt", now.timestamp_millis())
}

/// Reject tab URLs outside the configured host filter.
pub fn check_exportable(url: &str, host_filter: Option<&str>) -> Result<(), ExportError> {
    match host_filter {
        Some(filter) if !host_matches(url, filter) => {
            Err(ExportError::UnsupportedPage(url.to_string()))
        }
        _ => Ok(()),
    }
}

/// Load the notes stored for `url` and render them.
pub async fn export_page<S: AnnotationStore>(
    store: &S,
    title: &str,
    url: &str,
    host_filter: Option<&str>,
    exported_at: DateTime<FixedOffset>,
) -> Result<String, ExportError> {
    check_exportable(url, host_filter)?;
    let set = load_page_annotations(store, url).await?;
    let document =
        ExportDocument::new(title, url, exported_at, &set).ok_or(ExportError::NothingToExport)?;
    tracing::debug!(count = document.annotations.len(), "export: rendered page notes");
    Ok(document.render())
}
