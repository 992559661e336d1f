use async_trait::async_trait;
use serde_json::Value;

use crate::core::types::PipelineError;

/// Contract over the external document store: point reads and writes keyed
/// by id plus partition key. Not-found on read is a first-class outcome,
/// distinct from I/O failure.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` means the document does not exist.
    async fn read(&self, id: &str, partition_key: &str) -> Result<Option<Value>, PipelineError>;

    /// Create-or-replace by id; no merge.
    async fn upsert(&self, partition_key: &str, document: Value) -> Result<(), PipelineError>;

    /// Replace an existing document. Fails when the document is absent.
    async fn replace(
        &self,
        id: &str,
        partition_key: &str,
        document: Value,
    ) -> Result<(), PipelineError>;
}

pub mod cosmos;
pub mod memory;

pub use self::cosmos::CosmosStore;
pub use self::memory::MemoryStore;
