pub mod batch_repository;
pub mod content_repository;
pub mod kb_config_repository;
pub mod record_repository;

pub use batch_repository::BatchRepository;
pub use content_repository::ContentRepository;
pub use kb_config_repository::{ChapterKbConfig, KbConfigRepository};
pub use record_repository::RecordRepository;

#[cfg(any(test, feature = "testing"))]
pub use batch_repository::MockBatchRepository;
#[cfg(any(test, feature = "testing"))]
pub use content_repository::MockContentRepository;
#[cfg(any(test, feature = "testing"))]
pub use kb_config_repository::MockKbConfigRepository;
#[cfg(any(test, feature = "testing"))]
pub use record_repository::MockRecordRepository;
