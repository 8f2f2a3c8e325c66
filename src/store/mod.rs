//! Persistence for the processed-message history.

pub mod processed;

pub use processed::ProcessedStore;
