//! External-contract layer: binds the service layer, RAG, and
//! agent runtime into one `AppState`, exposes the response-envelope
//! wrapper functions, the system-status snapshot, and SSE framing for the
//! agent event stream. Carries no business logic of its own.

pub mod app_state;
pub mod endpoints;
pub mod sse;
pub mod system_status;

pub use app_state::AppState;
pub use system_status::{EmbeddingStatusView, RerankStatusView, SystemStatus};
