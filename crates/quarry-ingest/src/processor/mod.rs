mod code;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use code::CodeProcessor;
#[cfg(feature = "pdf")]
pub use pdf::PdfProcessor;
pub use text::TextProcessor;

use quarry_store::{Chunk, SymbolRecord};

use crate::error::IngestError;

/// Everything a processor extracted from one file.
#[derive(Debug, Default)]
pub struct ProcessorOutput {
    pub chunks: Vec<Chunk>,
    pub symbols: Vec<SymbolRecord>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-file-type document processor. Implementations report failures
/// through the `Result`; the ingestion pipeline isolates them per file and
/// keeps going.
pub trait Processor: Send + Sync {
    fn process(
        &self,
        path: &Path,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> BoxFuture<'_, Result<ProcessorOutput, IngestError>>;

    fn supported_extensions(&self) -> &[&str];
}
