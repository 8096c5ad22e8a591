use std::path::Path;

use crate::DEFAULT_MAX_FILE_SIZE;
use crate::error::IngestError;
use crate::splitter::TextSplitter;

use super::{BoxFuture, Processor, ProcessorOutput};

/// Plain-text processor: reads the file (lossy on invalid UTF-8) and splits
/// it into chunks. Produces no symbols.
pub struct TextProcessor {
    pub max_file_size: u64,
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

pub(super) async fn read_text_file(path: &Path, max_size: u64) -> Result<String, IngestError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(IngestError::FileTooLarge(meta.len()));
    }
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl Processor for TextProcessor {
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
                tracing::debug!(path = %path.display(), "file is empty, nothing to ingest");
                return Ok(ProcessorOutput::default());
            }

            let splitter = TextSplitter::new(chunk_size, chunk_overlap);
            Ok(ProcessorOutput {
                chunks: splitter.split(&content, &path.display().to_string()),
                symbols: Vec::new(),
            })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &[
            "txt", "md", "markdown", "rst", "csv", "json", "yaml", "yml", "toml", "html",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_nonempty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "The sky is blue. Water is wet.").unwrap();

        let out = TextProcessor::default().process(&file, 1000, 200).await.unwrap();
        assert!(!out.chunks.is_empty());
        assert!(out.symbols.is_empty());
        assert!(out.chunks[0].source.ends_with("notes.txt"));
    }

    #[tokio::test]
    async fn empty_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");
        std::fs::write(&file, "").unwrap();

        let out = TextProcessor::default().process(&file, 1000, 200).await.unwrap();
        assert!(out.chunks.is_empty());
        assert!(out.symbols.is_empty());
    }

    #[tokio::test]
    async fn missing_file_errors() {
        let result = TextProcessor::default()
            .process(Path::new("/nonexistent/file.txt"), 1000, 200)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "content").unwrap();

        let processor = TextProcessor { max_file_size: 1 };
        let result = processor.process(&file, 1000, 200).await;
        assert!(matches!(result, Err(IngestError::FileTooLarge(_))));
    }

    #[tokio::test]
    async fn invalid_utf8_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latin.txt");
        std::fs::write(&file, [b'c', b'a', b'f', 0xE9]).unwrap();

        let out = TextProcessor::default().process(&file, 1000, 200).await.unwrap();
        assert_eq!(out.chunks.len(), 1);
        assert!(out.chunks[0].text.starts_with("caf"));
    }

    #[test]
    fn supported_extensions_include_markdown() {
        let processor = TextProcessor::default();
        let exts = processor.supported_extensions();
        assert!(exts.contains(&"md"));
        assert!(exts.contains(&"txt"));
    }
}
