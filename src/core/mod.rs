// Public modules
pub mod build;
pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod packager;
pub mod pipeline;
pub mod plan;
pub mod publish;
pub mod ssh;
pub mod stage;
pub mod suite;
pub mod transfer;
pub mod workspace;

// Filesystem locations
pub mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use pipeline::{Pipeline, RunReport, StageReport};
pub use stage::Stage;
