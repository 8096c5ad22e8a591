use std::path::Path;

use crate::DEFAULT_MAX_FILE_SIZE;
use crate::error::IngestError;
use crate::splitter::TextSplitter;

use super::{BoxFuture, Processor, ProcessorOutput};

/// PDF processor: extracts text on a blocking thread, then splits it.
pub struct PdfProcessor {
    pub max_file_size: u64,
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Processor for PdfProcessor {
    fn process(
        &self,
        path: &Path,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> BoxFuture<'_, Result<ProcessorOutput, IngestError>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(IngestError::FileTooLarge(meta.len()));
            }

            let source = path.display().to_string();
            let extract_path = path.clone();
            let content = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&extract_path).map_err(|e| IngestError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| IngestError::Pdf(format!("extraction task panicked: {e}")))??;

            if content.trim().is_empty() {
                tracing::warn!(path = %path.display(), "PDF produced no text");
                return Ok(ProcessorOutput::default());
            }

            let splitter = TextSplitter::new(chunk_size, chunk_overlap);
            Ok(ProcessorOutput {
                chunks: splitter.split(&content, &source),
                symbols: Vec::new(),
            })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
