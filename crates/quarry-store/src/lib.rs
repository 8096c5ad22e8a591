//! Dual-index vector storage: a content collection and a symbol collection
//! per logical namespace, bound to one embedding model.

pub mod backend;
pub mod dual;
pub mod error;
pub mod memory;
pub mod qdrant;
pub mod types;

pub use backend::{MetadataFilter, NamespaceLister, ScoredPoint, VectorBackend, VectorPoint};
pub use dual::DualIndexStore;
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;
pub use types::{Chunk, Document, SymbolRecord};
