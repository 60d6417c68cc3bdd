pub mod envelope;
pub mod error;
pub mod model;

pub use envelope::Envelope;
pub use error::{CoreError, ErrorCode, Result};
pub use model::*;
