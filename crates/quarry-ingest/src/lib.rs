//! Knowledge-base ingestion: walk data sources, run per-file-type
//! processors, and write the results into a dual index in one batch.

pub mod error;
pub mod pipeline;
pub mod processor;
pub mod source;
pub mod splitter;

pub use error::IngestError;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use processor::{CodeProcessor, Processor, ProcessorOutput, TextProcessor};
pub use source::DataSource;
pub use splitter::TextSplitter;

#[cfg(feature = "pdf")]
pub use processor::PdfProcessor;

/// Maximum file size a default processor will read: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
