use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use quarry_store::SymbolRecord;

use crate::DEFAULT_MAX_FILE_SIZE;
use crate::error::IngestError;
use crate::splitter::TextSplitter;

use super::text::read_text_file;
use super::{BoxFuture, Processor, ProcessorOutput};

/// Longest definition body carried into a symbol record, in lines.
const MAX_SYMBOL_LINES: usize = 60;

static RUST_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+|unsafe\s+|const\s+)*(?:fn|struct|enum|trait)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("rust definition regex is valid")
});

static PYTHON_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?(?:class|def)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)")
        .expect("python definition regex is valid")
});

static JS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|function|interface)\s+(?P<name>[A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .expect("javascript definition regex is valid")
});

static GO_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:func\s+(?:\([^)]*\)\s*)?|type\s+)(?P<name>[A-Za-z_][A-Za-z0-9_]*)")
        .expect("go definition regex is valid")
});

fn definition_regex(extension: &str) -> Option<&'static Regex> {
    match extension {
        "rs" => Some(&RUST_DEF),
        "py" => Some(&PYTHON_DEF),
        "js" | "jsx" | "ts" | "tsx" => Some(&JS_DEF),
        "go" => Some(&GO_DEF),
        _ => None,
    }
}

/// Source-code processor: chunks the file like prose AND extracts top-level
/// class/function definitions as symbol records for the class collection.
pub struct CodeProcessor {
    pub max_file_size: u64,
}

impl Default for CodeProcessor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

fn extract_symbols(content: &str, source: &str, extension: &str) -> Vec<SymbolRecord> {
    let Some(pattern) = definition_regex(extension) else {
        return Vec::new();
    };

    let lines: Vec<&str> = content.lines().collect();
    let starts: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            pattern
                .captures(line)
                .and_then(|c| c.name("name"))
                .map(|m| (i, m.as_str().to_owned()))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, (start, name))| {
            let next_start = starts.get(n + 1).map_or(lines.len(), |(s, _)| *s);
            let end = next_start.min(start + MAX_SYMBOL_LINES).min(lines.len());
            SymbolRecord {
                text: lines[*start..end].join("\n"),
                source: source.to_owned(),
                symbol_name: name.clone(),
            }
        })
        .collect()
}

impl Processor for CodeProcessor {
    fn process(
        &self,
        path: &Path,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> BoxFuture<'_, Result<ProcessorOutput, IngestError>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let content = read_text_file(&path, max_size).await?;
            if content.trim().is_empty() {
                return Ok(ProcessorOutput::default());
            }

            let source = path.display().to_string();
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();

            let splitter = TextSplitter::new(chunk_size, chunk_overlap);
            Ok(ProcessorOutput {
                chunks: splitter.split(&content, &source),
                symbols: extract_symbols(&content, &source, extension),
            })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["rs", "py", "js", "jsx", "ts", "tsx", "go"]
    }
}
