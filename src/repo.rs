//! Read-modify-write operations over filing and chunk records. All writes
//! go through the document-store contract; `NotFound` propagates to callers
//! rather than being recovered into a fresh record.

use serde_json::Value;
use std::sync::Arc;

use crate::core::types::PipelineError;
use crate::filing::{chunk_id, AnalysisEntry, ChunkRecord, FilingRecord};
use crate::store::DocumentStore;

pub struct FilingRepository {
    store: Arc<dyn DocumentStore>,
}

impl FilingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn to_document<T: serde::Serialize>(record: &T) -> Result<Value, PipelineError> {
        serde_json::to_value(record)
            .map_err(|e| PipelineError::Store(format!("serializing record failed: {}", e)))
    }

    fn from_document(document: Value) -> Result<FilingRecord, PipelineError> {
        serde_json::from_value(document)
            .map_err(|e| PipelineError::Store(format!("decoding filing record failed: {}", e)))
    }

    /// Registers a filing. Idempotent: a second call with the same id
    /// overwrites the stored record wholesale, no merge.
    pub async fn create_or_replace_filing(
        &self,
        record: &FilingRecord,
    ) -> Result<(), PipelineError> {
        let document = Self::to_document(record)?;
        self.store.upsert(&record.ticker, document).await
    }

    pub async fn read_filing(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<FilingRecord, PipelineError> {
        match self.store.read(id, partition_key).await? {
            Some(document) => Self::from_document(document),
            None => Err(PipelineError::NotFound(id.to_string())),
        }
    }

    /// Appends one analysis entry to an existing filing record. When the
    /// entry is a financial-health report whose first source row reports a
    /// fiscal period or year, those fields are set on the record; absent
    /// values leave prior ones untouched.
    pub async fn append_analysis(
        &self,
        id: &str,
        partition_key: &str,
        entry: AnalysisEntry,
    ) -> Result<FilingRecord, PipelineError> {
        let mut record = self.read_filing(id, partition_key).await?;

        if let AnalysisEntry::FinancialHealth { report } = &entry {
            let (fp, fy) = report.first_reporting_period();
            if let Some(fp) = fp {
                record.fiscal_period = Some(fp);
            }
            if let Some(fy) = fy {
                record.fiscal_year = Some(fy);
            }
        }

        record.analyses.push(entry);
        let document = Self::to_document(&record)?;
        self.store.replace(id, partition_key, document).await?;
        Ok(record)
    }

    /// Idempotent upsert of a chunk document, keyed by accession and index.
    pub async fn write_chunk(&self, chunk: &ChunkRecord) -> Result<(), PipelineError> {
        let document = Self::to_document(chunk)?;
        self.store.upsert(&chunk.ticker, document).await
    }

    /// Records the ordered chunk id list on the filing: appends a
    /// `holdings_chunk_refs` entry and sets `chunk_refs`.
    pub async fn link_chunks(
        &self,
        id: &str,
        partition_key: &str,
        chunk_ids: Vec<String>,
    ) -> Result<FilingRecord, PipelineError> {
        let mut record = self.read_filing(id, partition_key).await?;
        record.chunk_refs = Some(chunk_ids.clone());
        record.analyses.push(AnalysisEntry::HoldingsChunkRefs {
            chunk_count: chunk_ids.len(),
            chunk_ids,
        });
        let document = Self::to_document(&record)?;
        self.store.replace(id, partition_key, document).await?;
        Ok(record)
    }

    pub async fn read_chunk(
        &self,
        accession_code: &str,
        partition_key: &str,
        index: usize,
    ) -> Result<ChunkRecord, PipelineError> {
        let id = chunk_id(accession_code, index);
        match self.store.read(&id, partition_key).await? {
            Some(document) => serde_json::from_value(document)
                .map_err(|e| PipelineError::Store(format!("decoding chunk record failed: {}", e))),
            None => Err(PipelineError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::report::FormType;
    use crate::filing::NarrativeReport;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn repo() -> FilingRepository {
        FilingRepository::new(Arc::new(MemoryStore::new()))
    }

    fn narrative_entry(text: &str) -> AnalysisEntry {
        AnalysisEntry::Narrative {
            report: NarrativeReport {
                company_analysis: text.to_string(),
                risk_analysis: text.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let repo = repo();
        let record = FilingRecord::new("X1", "ACME", "2025-01-15", FormType::Form10K);
        repo.create_or_replace_filing(&record).await.unwrap();
        repo.create_or_replace_filing(&record).await.unwrap();

        let stored = repo.read_filing("X1", "ACME").await.unwrap();
        assert!(stored.analyses.is_empty());
        assert_eq!(stored.id, "X1");
    }

    #[tokio::test]
    async fn test_read_missing_filing_is_not_found() {
        let err = repo().read_filing("X1", "ACME").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_is_append_only_in_call_order() {
        let repo = repo();
        let record = FilingRecord::new("X1", "ACME", "2025-01-15", FormType::Form10K);
        repo.create_or_replace_filing(&record).await.unwrap();

        for i in 0..3 {
            repo.append_analysis("X1", "ACME", narrative_entry(&format!("run {}", i)))
                .await
                .unwrap();
        }

        let stored = repo.read_filing("X1", "ACME").await.unwrap();
        assert_eq!(stored.analyses.len(), 3);
        match &stored.analyses[2] {
            AnalysisEntry::Narrative { report } => assert_eq!(report.company_analysis, "run 2"),
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_append_to_missing_filing_fails() {
        let err = repo()
            .append_analysis("X1", "ACME", narrative_entry("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_link_chunks_appends_refs_entry() {
        let repo = repo();
        let record = FilingRecord::new("X1", "ACME", "2025-01-15", FormType::Form13FHR);
        repo.create_or_replace_filing(&record).await.unwrap();

        let ids = vec![chunk_id("X1", 0), chunk_id("X1", 1)];
        let updated = repo.link_chunks("X1", "ACME", ids.clone()).await.unwrap();

        assert_eq!(updated.chunk_refs.as_deref(), Some(&ids[..]));
        match &updated.analyses[0] {
            AnalysisEntry::HoldingsChunkRefs {
                chunk_ids,
                chunk_count,
            } => {
                assert_eq!(*chunk_count, 2);
                assert_eq!(chunk_ids, &ids);
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_chunk_round_trip() {
        let repo = repo();
        let chunk = ChunkRecord::new("X1", "ACME", 0, vec![json!({ "cusip": "037833100" })]);
        repo.write_chunk(&chunk).await.unwrap();
        let stored = repo.read_chunk("X1", "ACME", 0).await.unwrap();
        assert_eq!(stored.payload, chunk.payload);
        assert_eq!(stored.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_fiscal_fields_set_from_first_raw_row() {
        use crate::edgar::facts::{FactRow, FactTable};
        use crate::health;

        let repo = repo();
        let record = FilingRecord::new("X1", "ACME", "2025-01-15", FormType::Form10K);
        repo.create_or_replace_filing(&record).await.unwrap();

        let table = FactTable::from_rows(
            vec![FactRow {
                namespace: "us-gaap".to_string(),
                fact: "Assets".to_string(),
                accn: "X1".to_string(),
                end: "2023-12-31".to_string(),
                val: 1000.0,
                fp: Some("Q2".to_string()),
                fy: Some(2024),
                timestamp: 0,
            }],
            "X1",
        )
        .unwrap();
        let report = health::derive(&table);

        let updated = repo
            .append_analysis("X1", "ACME", AnalysisEntry::FinancialHealth { report })
            .await
            .unwrap();
        assert_eq!(updated.fiscal_period.as_deref(), Some("Q2"));
        assert_eq!(updated.fiscal_year, Some(2024));
    }
}
