#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large ({0} bytes)")]
    FileTooLarge(u64),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("git clone failed for '{url}': {message}")]
    Clone { url: String, message: String },

    #[error("walk failed: {0}")]
    Walk(String),

    #[error(transparent)]
    Store(#[from] quarry_store::StoreError),
}
