use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::types::PipelineError;
use crate::store::DocumentStore;

/// In-memory document store used by tests and local runs. Keyed by
/// (partition key, id) like the real container.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn document_id(document: &Value) -> Result<String, PipelineError> {
    document
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::Store("document has no string id".to_string()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, id: &str, partition_key: &str) -> Result<Option<Value>, PipelineError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned())
    }

    async fn upsert(&self, partition_key: &str, document: Value) -> Result<(), PipelineError> {
        let id = document_id(&document)?;
        let mut documents = self.documents.write().await;
        documents.insert((partition_key.to_string(), id), document);
        Ok(())
    }

    async fn replace(
        &self,
        id: &str,
        partition_key: &str,
        document: Value,
    ) -> Result<(), PipelineError> {
        let mut documents = self.documents.write().await;
        let key = (partition_key.to_string(), id.to_string());
        if !documents.contains_key(&key) {
            return Err(PipelineError::NotFound(id.to_string()));
        }
        documents.insert(key, document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.read("X1", "ACME").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_read() {
        let store = MemoryStore::new();
        store
            .upsert("ACME", json!({ "id": "X1", "ticker": "ACME" }))
            .await
            .unwrap();
        let doc = store.read("X1", "ACME").await.unwrap().unwrap();
        assert_eq!(doc["ticker"], "ACME");
    }

    #[tokio::test]
    async fn test_replace_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .replace("X1", "ACME", json!({ "id": "X1" }))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryStore::new();
        store
            .upsert("ACME", json!({ "id": "X1", "v": 1 }))
            .await
            .unwrap();
        store
            .upsert("ACME", json!({ "id": "X1", "v": 2 }))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        let doc = store.read("X1", "ACME").await.unwrap().unwrap();
        assert_eq!(doc["v"], 2);
    }
}
