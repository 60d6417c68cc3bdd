//! Service layer: binds the scheduler, RAG, and
//! agent crates to the storage ports, and is the only crate the API/CLI
//! layers call into for business logic.

pub mod ports;
pub mod services;

pub use ports::{
    BatchRepository, ChapterKbConfig, ContentRepository, KbConfigRepository, RecordRepository,
};
pub use services::*;
