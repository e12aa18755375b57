//! Batch session state and the serial conversion orchestrator.

pub mod converter;
pub mod session;

pub use converter::{BatchSummary, Converter};
pub use session::{BatchSession, CancelHandle, SessionCounts};
