use serde::{Deserialize, Serialize};

/// A word and its translation, as read from one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordPair {
    pub original: String,
    pub translated: String,
}

impl WordPair {
    #[must_use]
    pub fn new(original: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            translated: translated.into(),
        }
    }
}
