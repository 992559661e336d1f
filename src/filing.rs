use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::edgar::report::FormType;
use crate::health::FinancialHealthReport;

/// One record per accession number, partitioned by ticker. Created once by
/// the registration stage; analysis stages only ever append to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingRecord {
    pub id: String,
    pub ticker: String,
    pub date: String,
    pub form: FormType,
    pub analyses: Vec<AnalysisEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_refs: Option<Vec<String>>,
}

impl FilingRecord {
    pub fn new(accession_code: &str, ticker: &str, date: &str, form: FormType) -> Self {
        Self {
            id: accession_code.to_string(),
            ticker: ticker.to_string(),
            date: date.to_string(),
            form,
            analyses: Vec::new(),
            fiscal_period: None,
            fiscal_year: None,
            chunk_refs: None,
        }
    }
}

/// Narrative output from the opaque text-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub company_analysis: String,
    pub risk_analysis: String,
}

/// One appended analysis artifact. Repeated runs append new entries;
/// nothing is deduplicated or merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisEntry {
    FinancialHealth { report: FinancialHealthReport },
    Narrative { report: NarrativeReport },
    Holdings { rows: Vec<Value> },
    HoldingsChunkRefs { chunk_ids: Vec<String>, chunk_count: usize },
}

/// One bounded slice of an oversized holdings dataset, stored as its own
/// document alongside the filing record in the same container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub accession_code: String,
    pub ticker: String,
    pub chunk_index: usize,
    pub payload: Vec<Value>,
}

impl ChunkRecord {
    pub fn new(accession_code: &str, ticker: &str, chunk_index: usize, payload: Vec<Value>) -> Self {
        Self {
            id: chunk_id(accession_code, chunk_index),
            accession_code: accession_code.to_string(),
            ticker: ticker.to_string(),
            chunk_index,
            payload,
        }
    }
}

pub fn chunk_id(accession_code: &str, index: usize) -> String {
    format!("{}::chunk_{}", accession_code, index)
}
