use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One unit of prose/code text produced by splitting a source file.
/// Immutable once stored; identity is assigned by the store at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    /// Position of this chunk within its source file. Ordering is only
    /// meaningful within one file.
    pub sequence_index: usize,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl Chunk {
    #[must_use]
    pub fn new(text: impl Into<String>, source: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            sequence_index,
            extra: HashMap::new(),
        }
    }
}

/// One class/function definition and its source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub text: String,
    pub source: String,
    pub symbol_name: String,
}

/// A retrieval result: stored text plus its stringified metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_new_has_empty_extra() {
        let chunk = Chunk::new("body", "a.txt", 3);
        assert_eq!(chunk.sequence_index, 3);
        assert!(chunk.extra.is_empty());
    }

    #[test]
    fn document_source_helper() {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_owned(), "src/lib.rs".to_owned());
        let doc = Document {
            text: "fn main() {}".into(),
            metadata,
        };
        assert_eq!(doc.source(), Some("src/lib.rs"));
    }

    #[test]
    fn document_without_source() {
        let doc = Document {
            text: "x".into(),
            metadata: HashMap::new(),
        };
        assert!(doc.source().is_none());
    }
}
