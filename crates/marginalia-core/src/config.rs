//! Overlay configuration.
//!
//! Every field has a default so hosts can pass a partial object (or nothing).

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Top-level configuration for the annotation overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    /// CSS class put on every highlight wrapper.
    pub highlight_class: SmolStr,
    /// Attribute joining a highlight element to its annotation id.
    pub id_attribute: SmolStr,
    /// Elements whose text is never indexed.
    pub excluded_tags: Vec<SmolStr>,
    /// Preferred content root. Falls back to the body when absent.
    pub content_root_tag: SmolStr,
    /// Chars of surrounding text captured on each side of a new quotation.
    pub context_chars: usize,
    pub locator: LocatorConfig,
    pub restore: RestoreSchedule,
    /// Substring a tab URL's host must contain to allow export.
    pub export_host_filter: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            highlight_class: SmolStr::new_static("marginalia-highlight"),
            id_attribute: SmolStr::new_static("data-anno-id"),
            excluded_tags: vec![SmolStr::new_static("script"), SmolStr::new_static("style")],
            content_root_tag: SmolStr::new_static("article"),
            context_chars: 50,
            locator: LocatorConfig::default(),
            restore: RestoreSchedule::default(),
            export_host_filter: None,
        }
    }
}

/// Tuning for the fuzzy word fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocatorConfig {
    /// Words must be strictly longer than this to be used as anchors.
    pub min_word_len: usize,
    /// Only this many leading qualifying words are tried.
    pub max_words: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_word_len: 3,
            max_words: 3,
        }
    }
}

/// When the restore pipeline re-runs after page ready.
///
/// Fixed delays catch content that loads late. Every run starts from scratch
/// over the current tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreSchedule {
    pub retry_delays_ms: Vec<u32>,
    pub visibility_delay_ms: u32,
    /// Wait after mouseup before reading the selection.
    pub selection_delay_ms: u32,
}

impl Default for RestoreSchedule {
    fn default() -> Self {
        Self {
            retry_delays_ms: vec![1000, 2000, 3000],
            visibility_delay_ms: 500,
            selection_delay_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: OverlayConfig =
            serde_json::from_str(r#"{"highlightClass":"nyt-annotation-highlight"}"#).unwrap();
        assert_eq!(cfg.highlight_class, "nyt-annotation-highlight");
        assert_eq!(cfg.id_attribute, "data-anno-id");
        assert_eq!(cfg.context_chars, 50);
        assert_eq!(cfg.restore.retry_delays_ms, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_nested_partial_config() {
        let cfg: OverlayConfig =
            serde_json::from_str(r#"{"locator":{"maxWords":5},"restore":{"visibilityDelayMs":0}}"#)
                .unwrap();
        assert_eq!(cfg.locator.max_words, 5);
        assert_eq!(cfg.locator.min_word_len, 3);
        assert_eq!(cfg.restore.visibility_delay_ms, 0);
        assert_eq!(cfg.restore.selection_delay_ms, 10);
    }
}
