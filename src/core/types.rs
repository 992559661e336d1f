use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edgar::report::FormType;

/// One inbound analysis request. All four fields are required; the HTTP
/// boundary rejects requests missing any of them before a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub accession_code: String,
    pub ticker: String,
    pub date: String,
    pub form: FormType,
}

impl AnalysisRequest {
    pub fn new(accession_code: &str, ticker: &str, date: &str, form: FormType) -> Self {
        Self {
            accession_code: accession_code.to_string(),
            ticker: ticker.to_string(),
            date: date.to_string(),
            form,
        }
    }
}

/// Stages the sequencer can complete, in the order it runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Register,
    FinancialHealth,
    Narrative,
    Holdings,
}

/// Aggregate result of a pipeline run. `completed` lists every stage that
/// finished successfully, in call order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub accession_code: String,
    pub completed: Vec<Stage>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing required parameters: {0}")]
    Validation(String),

    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("no existing filing found for {0}")]
    NotFound(String),

    #[error("upstream collaborator failed: {0}")]
    Upstream(String),

    #[error("derivation failed: {0}")]
    Derivation(String),

    #[error("document store error: {0}")]
    Store(String),
}
