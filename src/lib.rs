pub mod chunking;
pub mod core;
pub mod edgar;
pub mod filing;
pub mod health;
pub mod pipeline;
pub mod remote;
pub mod repo;
pub mod store;

// Re-exports
pub use crate::core::config::AnalystConfig;
pub use crate::core::types::{AnalysisRequest, PipelineError, Stage, StageOutcome};
pub use crate::pipeline::Sequencer;
