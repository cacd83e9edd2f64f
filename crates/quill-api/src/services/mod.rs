//! Services behind the HTTP handlers.

pub mod export;
pub mod indexing;
pub mod rag;
pub mod typing;

pub use export::{ExportFormat, ProjectExport};
pub use indexing::{IndexingService, ReindexSummary};
pub use rag::{Answer, RagService, Source};
pub use typing::TypingParams;
