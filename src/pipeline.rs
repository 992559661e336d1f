//! The pipeline sequencer: registers the filing record, then runs the
//! analysis stages gated by form type. Stages run one at a time; the first
//! failure halts the run and propagates verbatim. Writes committed by
//! earlier stages stay committed.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::chunking::{chunk_rows, serialized_size};
use crate::core::types::{AnalysisRequest, PipelineError, Stage, StageOutcome};
use crate::edgar::facts::{FactSource, FactTable};
use crate::filing::{AnalysisEntry, ChunkRecord, FilingRecord, NarrativeReport};
use crate::health;
use crate::repo::FilingRepository;

/// Opaque narrative collaborator. Failures surface as upstream errors.
#[async_trait]
pub trait NarrativeAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<NarrativeReport, PipelineError>;
}

/// Opaque holdings-extraction collaborator returning ordered table rows.
#[async_trait]
pub trait HoldingsExtractor: Send + Sync {
    async fn extract(&self, request: &AnalysisRequest) -> Result<Vec<Value>, PipelineError>;
}

pub struct Sequencer {
    repo: FilingRepository,
    facts: Arc<dyn FactSource>,
    narrative: Arc<dyn NarrativeAnalyzer>,
    holdings: Arc<dyn HoldingsExtractor>,
    chunk_budget_bytes: usize,
}

impl Sequencer {
    pub fn new(
        repo: FilingRepository,
        facts: Arc<dyn FactSource>,
        narrative: Arc<dyn NarrativeAnalyzer>,
        holdings: Arc<dyn HoldingsExtractor>,
        chunk_budget_bytes: usize,
    ) -> Self {
        Self {
            repo,
            facts,
            narrative,
            holdings,
            chunk_budget_bytes,
        }
    }

    /// Runs the full pipeline for one request: register, then the stages
    /// the form type calls for.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<StageOutcome, PipelineError> {
        validate(request)?;
        let mut completed = Vec::new();

        self.register(request).await?;
        completed.push(Stage::Register);

        if request.form.is_periodic_report() {
            log::info!(
                "Triggering financial health analysis for {}",
                request.form
            );
            self.run_financial_health(request).await?;
            completed.push(Stage::FinancialHealth);

            log::info!("Triggering narrative analysis for {}", request.form);
            self.run_narrative(request).await?;
            completed.push(Stage::Narrative);
        } else if request.form.is_holdings_report() {
            log::info!("Triggering holdings analysis for {}", request.form);
            self.run_holdings(request).await?;
            completed.push(Stage::Holdings);
        }

        Ok(StageOutcome {
            accession_code: request.accession_code.clone(),
            completed,
        })
    }

    /// Creates or replaces the base filing record. Idempotent; no merge.
    pub async fn register(&self, request: &AnalysisRequest) -> Result<(), PipelineError> {
        let record = FilingRecord::new(
            &request.accession_code,
            &request.ticker,
            &request.date,
            request.form.clone(),
        );
        self.repo.create_or_replace_filing(&record).await
    }

    /// Derives the financial health report and appends it. The filing
    /// record must already exist; a missing record is a terminal NotFound.
    pub async fn run_financial_health(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FilingRecord, PipelineError> {
        let rows = self.facts.company_facts(&request.ticker).await?;
        let table = FactTable::from_rows(rows, &request.accession_code)?;
        let report = health::derive(&table);
        self.repo
            .append_analysis(
                &request.accession_code,
                &request.ticker,
                AnalysisEntry::FinancialHealth { report },
            )
            .await
    }

    pub async fn run_narrative(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FilingRecord, PipelineError> {
        let report = self.narrative.analyze(request).await?;
        self.repo
            .append_analysis(
                &request.accession_code,
                &request.ticker,
                AnalysisEntry::Narrative { report },
            )
            .await
    }

    /// Extracts the holdings dataset and stores it inline when it fits the
    /// budget, otherwise chunked. Chunk writes are incremental and are not
    /// rolled back if linking fails afterwards.
    pub async fn run_holdings(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FilingRecord, PipelineError> {
        // Pre-existence gate before any write, chunk writes included.
        self.repo
            .read_filing(&request.accession_code, &request.ticker)
            .await?;

        let rows = self.holdings.extract(request).await?;
        let total_bytes = serialized_size(&rows)?;

        if total_bytes <= self.chunk_budget_bytes {
            log::info!(
                "Holdings dataset for {} fits inline ({} bytes)",
                request.accession_code,
                total_bytes
            );
            return self
                .repo
                .append_analysis(
                    &request.accession_code,
                    &request.ticker,
                    AnalysisEntry::Holdings { rows },
                )
                .await;
        }

        log::info!(
            "Holdings dataset for {} is {} bytes, chunking at {} bytes",
            request.accession_code,
            total_bytes,
            self.chunk_budget_bytes
        );
        let chunks = chunk_rows(rows, self.chunk_budget_bytes)?;
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for (index, payload) in chunks.into_iter().enumerate() {
            let chunk = ChunkRecord::new(&request.accession_code, &request.ticker, index, payload);
            self.repo.write_chunk(&chunk).await?;
            chunk_ids.push(chunk.id);
        }
        self.repo
            .link_chunks(&request.accession_code, &request.ticker, chunk_ids)
            .await
    }
}

fn validate(request: &AnalysisRequest) -> Result<(), PipelineError> {
    let mut missing = Vec::new();
    if request.accession_code.is_empty() {
        missing.push("accession_code");
    }
    if request.ticker.is_empty() {
        missing.push("ticker");
    }
    if request.date.is_empty() {
        missing.push("date");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation(missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::report::FormType;

    #[test]
    fn test_validation_names_missing_fields() {
        let request = AnalysisRequest::new("", "ACME", "", FormType::Form10K);
        match validate(&request) {
            Err(PipelineError::Validation(fields)) => {
                assert_eq!(fields, "accession_code, date");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_complete_request_passes_validation() {
        let request = AnalysisRequest::new("X1", "ACME", "2025-01-15", FormType::Form10K);
        assert!(validate(&request).is_ok());
    }
}
