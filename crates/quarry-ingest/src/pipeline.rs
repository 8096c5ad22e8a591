use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ignore::WalkBuilder;

use quarry_llm::Embedder;
use quarry_store::{Chunk, DualIndexStore, SymbolRecord};

use crate::error::IngestError;
use crate::processor::{CodeProcessor, Processor, TextProcessor};
use crate::source::{DataSource, clone_repository};

/// Counters for one `ingest` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub chunks: usize,
    pub symbols: usize,
}

/// Walks data sources, applies per-extension processors, and writes the
/// accumulated chunks and symbols into the dual index in one batch per
/// collection.
pub struct IngestionPipeline<E: Embedder> {
    store: Arc<DualIndexStore<E>>,
    processors: HashMap<String, Arc<dyn Processor>>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<E: Embedder> IngestionPipeline<E> {
    /// Build a pipeline with the default processor set: plain text, source
    /// code (with symbol extraction), and PDF when that feature is enabled.
    #[must_use]
    pub fn new(store: Arc<DualIndexStore<E>>, chunk_size: usize, chunk_overlap: usize) -> Self {
        let mut pipeline = Self {
            store,
            processors: HashMap::new(),
            chunk_size,
            chunk_overlap,
        };
        pipeline.register(Arc::new(TextProcessor::default()));
        pipeline.register(Arc::new(CodeProcessor::default()));
        #[cfg(feature = "pdf")]
        pipeline.register(Arc::new(crate::processor::PdfProcessor::default()));
        pipeline
    }

    fn register(&mut self, processor: Arc<dyn Processor>) {
        for ext in processor.supported_extensions() {
            self.processors
                .insert((*ext).to_owned(), Arc::clone(&processor));
        }
    }

    /// Override (or add) the processor used for `extension`.
    #[must_use]
    pub fn with_processor(mut self, extension: &str, processor: Arc<dyn Processor>) -> Self {
        self.processors.insert(extension.to_owned(), processor);
        self
    }

    /// Ingest one data source. Per-file processor failures are logged and
    /// skipped; walking or storage failures abort the source.
    ///
    /// For repositories the checkout directory is removed when this call
    /// returns, on success and on failure alike.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be walked or cloned, or if the
    /// final store write fails.
    pub async fn ingest(
        &self,
        source: &DataSource,
        ignore_folders: &[String],
    ) -> Result<IngestReport, IngestError> {
        match source {
            DataSource::Folder { path } => self.ingest_folder(path, ignore_folders).await,
            DataSource::Repository { url, branch } => {
                // The checkout drops (and is deleted) whichever way this exits.
                let checkout = clone_repository(url, branch.as_deref()).await?;
                self.ingest_folder(checkout.path(), ignore_folders).await
            }
        }
    }

    async fn ingest_folder(
        &self,
        root: &Path,
        ignore_folders: &[String],
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut symbols: Vec<SymbolRecord> = Vec::new();

        let ignored: Vec<String> = ignore_folders.to_vec();
        let walker = WalkBuilder::new(root)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !ignored.iter().any(|folder| folder.as_str() == name)
            })
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| IngestError::Walk(e.to_string()))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();

            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let Some(processor) = self.processors.get(extension) else {
                tracing::debug!(path = %path.display(), "no processor for extension, skipping");
                report.files_skipped += 1;
                continue;
            };

            match processor
                .process(path, self.chunk_size, self.chunk_overlap)
                .await
            {
                Ok(output) => {
                    report.files_processed += 1;
                    chunks.extend(output.chunks);
                    symbols.extend(output.symbols);
                }
                Err(e) => {
                    // One bad file must not abort the batch.
                    tracing::warn!(path = %path.display(), "processing failed: {e}");
                    report.files_failed += 1;
                }
            }
        }

        report.chunks = chunks.len();
        report.symbols = symbols.len();

        // One write per collection for the whole source keeps embedding
        // round trips bounded.
        self.store.add_documents(&chunks).await?;
        self.store.add_class_documents(&symbols).await?;

        tracing::info!(
            root = %root.display(),
            files = report.files_processed,
            failed = report.files_failed,
            chunks = report.chunks,
            symbols = report.symbols,
            "ingestion finished"
        );
        Ok(report)
    }
}
