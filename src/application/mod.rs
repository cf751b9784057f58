// Application layer - use cases and orchestration.
// Services own persistence and call into the pure ledger computations in
// `domain`, always on behalf of an explicit session.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
