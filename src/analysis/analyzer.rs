//! Analyzers combine normalization, segmentation and stop-word removal.

use std::collections::HashSet;
use std::fmt::Debug;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::stop_words::StopWords;
use crate::analysis::token::Token;

/// Turns text into a deterministic sequence of index terms.
///
/// Implementations must be pure: the same input always yields the same
/// tokens, because index-time and query-time analysis have to agree for
/// scores to be meaningful.
pub trait Analyzer: Send + Sync + Debug {
    /// Analyze text into ordered tokens.
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Name of this analyzer (used in logs and snapshots).
    fn name(&self) -> &str;

    /// Analyze text and keep only the term strings.
    fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }
}

/// NFKC-normalize and lowercase.
pub(crate) fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// The default analyzer.
///
/// Applies NFKC normalization and lowercasing, splits on Unicode word
/// boundaries (UAX #29, punctuation and whitespace are dropped) and removes
/// configured stop words. No stemming.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer {
    stop_words: Option<HashSet<String>>,
}

impl StandardAnalyzer {
    /// Create an analyzer that keeps every term.
    pub fn new() -> Self {
        StandardAnalyzer { stop_words: None }
    }

    /// Create an analyzer that drops the given stop words.
    pub fn with_stop_words(stop_words: &StopWords) -> Self {
        StandardAnalyzer {
            stop_words: stop_words.build(),
        }
    }

    fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words
            .as_ref()
            .is_some_and(|words| words.contains(term))
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let normalized = normalize(text);
        normalized
            .unicode_words()
            .enumerate()
            .filter(|(_, word)| !self.is_stop_word(word))
            .map(|(position, word)| Token::new(word, position as u32))
            .collect()
    }

    fn name(&self) -> &str {
        "standard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_punctuation() {
        let analyzer = StandardAnalyzer::new();
        assert_eq!(
            analyzer.terms("The Cat, sat!  On the MAT."),
            vec!["the", "cat", "sat", "on", "the", "mat"]
        );
    }

    #[test]
    fn test_nfkc_normalization() {
        let analyzer = StandardAnalyzer::new();
        // Fullwidth letters fold to ASCII.
        assert_eq!(analyzer.terms("ＲＵＳＴ"), vec!["rust"]);
    }

    #[test]
    fn test_deterministic() {
        let analyzer = StandardAnalyzer::with_stop_words(&StopWords::English);
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(analyzer.analyze(text), analyzer.analyze(text));
    }

    #[test]
    fn test_stop_words_keep_positions() {
        let analyzer = StandardAnalyzer::with_stop_words(&StopWords::English);
        let tokens = analyzer.analyze("the quick fox");
        assert_eq!(tokens, vec![Token::new("quick", 1), Token::new("fox", 2)]);
    }

    #[test]
    fn test_custom_stop_words_are_normalized() {
        let analyzer = StandardAnalyzer::with_stop_words(&StopWords::Custom(vec!["Apple".into()]));
        assert_eq!(analyzer.terms("apple banana"), vec!["banana"]);
    }

    #[test]
    fn test_empty_text() {
        let analyzer = StandardAnalyzer::new();
        assert!(analyzer.analyze("").is_empty());
        assert!(analyzer.analyze("  ,.; ").is_empty());
    }
}
