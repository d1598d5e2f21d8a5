//! Finding a saved quotation in the live page text.
//!
//! Strategies are tried in order: quotation with its captured context, the
//! bare quotation, then single long words from the quotation. The first hit
//! wins. All offsets are chars into the index's normalized full text.

use crate::config::LocatorConfig;
use crate::normalize::{collapse_whitespace, find_char_index, normalize_quote};

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Quotation found together with its surrounding context.
    Context,
    /// First plain occurrence of the quotation.
    Exact,
    /// Only a single word of the quotation was found.
    FuzzyWord,
}

/// A located quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    pub offset: usize,
    /// Normalized quotation length, clamped to the end of the text.
    pub len: usize,
    pub strategy: MatchStrategy,
}

impl TextMatch {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Locate `search` in `full_text` using the default word limits.
pub fn locate(
    full_text: &str,
    search: &str,
    context_before: &str,
    context_after: &str,
) -> Option<TextMatch> {
    locate_with(
        full_text,
        search,
        context_before,
        context_after,
        &LocatorConfig::default(),
    )
}

/// Locate `search` in `full_text`.
///
/// Returns `None` when nothing matches; callers treat that as a silent skip.
pub fn locate_with(
    full_text: &str,
    search: &str,
    context_before: &str,
    context_after: &str,
    config: &LocatorConfig,
) -> Option<TextMatch> {
    let quote = normalize_quote(search);
    if quote.is_empty() {
        return None;
    }
    let quote_len = quote.chars().count();

    if !context_before.is_empty() || !context_after.is_empty() {
        let with_context =
            collapse_whitespace(&format!("{context_before}{quote}{context_after}"));
        if let Some(idx) = find_char_index(full_text, &with_context) {
            let before_len = collapse_whitespace(context_before).chars().count();
            return Some(TextMatch {
                offset: idx + before_len,
                len: quote_len,
                strategy: MatchStrategy::Context,
            });
        }
        tracing::trace!("locate: context match failed, trying bare quotation");
    }

    if let Some(offset) = find_char_index(full_text, &quote) {
        return Some(TextMatch {
            offset,
            len: quote_len,
            strategy: MatchStrategy::Exact,
        });
    }

    let text_len = full_text.chars().count();
    quote
        .split(' ')
        .filter(|word| word.chars().count() > config.min_word_len)
        .take(config.max_words)
        .find_map(|word| find_char_index(full_text, word))
        .map(|offset| {
            tracing::debug!(offset, "locate: falling back to word match");
            TextMatch {
                offset,
                len: quote_len.min(text_len - offset),
                strategy: MatchStrategy::FuzzyWord,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let m = locate("the cat sat on the mat", "sat on", "", "").unwrap();
        assert_eq!(m.offset, 8);
        assert_eq!(m.len, 6);
        assert_eq!(m.strategy, MatchStrategy::Exact);
    }

    #[test]
    fn test_quote_whitespace_normalized() {
        let m = locate("the cat sat on the mat", "  sat\n\ton ", "", "").unwrap();
        assert_eq!((m.offset, m.len), (8, 6));
    }

    #[test]
    fn test_context_picks_second_occurrence() {
        let text = "foo appears here. later foo appears again.";
        let m = locate(text, "foo", "later ", " appears again").unwrap();
        assert_eq!(m.offset, 24);
        assert_eq!(m.strategy, MatchStrategy::Context);
    }

    #[test]
    fn test_context_before_only() {
        let text = "foo one. foo two.";
        let m = locate(text, "foo", "one. ", "").unwrap();
        assert_eq!(m.offset, 9);
    }

    #[test]
    fn test_context_with_raw_whitespace() {
        let text = "a foo. b foo.";
        let m = locate(text, "foo", "b\n  ", "").unwrap();
        assert_eq!(m.offset, 9);
        assert_eq!(m.strategy, MatchStrategy::Context);
    }

    #[test]
    fn test_stale_context_falls_back_to_exact() {
        let m = locate("only foo here", "foo", "rewritten ", "").unwrap();
        assert_eq!(m.offset, 5);
        assert_eq!(m.strategy, MatchStrategy::Exact);
    }

    #[test]
    fn test_fuzzy_word_fallback() {
        let text = "A caption was inserted. Then the dog jumps over it.";
        let m = locate(text, "The quick brown fox jumps", "", "").unwrap();
        assert_eq!(m.offset, text.find("jumps").unwrap());
        assert_eq!(m.strategy, MatchStrategy::FuzzyWord);
        assert_eq!(m.len, text.chars().count() - m.offset);
    }

    #[test]
    fn test_fuzzy_only_tries_first_words() {
        // "lazy" is the fourth qualifying word and is never tried.
        let text = "a lazy afternoon";
        assert_eq!(locate(text, "quick brown jumps lazy", "", ""), None);

        let cfg = LocatorConfig {
            min_word_len: 3,
            max_words: 4,
        };
        let m = locate_with(text, "quick brown jumps lazy", "", "", &cfg).unwrap();
        assert_eq!(m.offset, 2);
    }

    #[test]
    fn test_fuzzy_ignores_short_words() {
        assert_eq!(locate("the fox ran", "fox dog cat", "", ""), None);
    }

    #[test]
    fn test_empty_quote_never_matches() {
        assert_eq!(locate("anything", "   ", "", ""), None);
        assert_eq!(locate("anything", "", "any", ""), None);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let m = locate("naïve café society", "café", "", "").unwrap();
        assert_eq!(m.offset, 6);
    }
}
