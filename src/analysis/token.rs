use serde::{Deserialize, Serialize};

/// A single index term produced by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Normalized term text.
    pub text: String,

    /// Word position in the source text, counted before stop-word removal.
    pub position: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32) -> Self {
        Token {
            text: text.into(),
            position,
        }
    }
}
