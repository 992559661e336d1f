use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::core::config::AnalystConfig;
use crate::core::types::PipelineError;
use crate::store::DocumentStore;

/// REST client for the hosted document store. Documents live in one
/// container per database; reads and writes are scoped by partition key.
pub struct CosmosStore {
    client: Client,
    base: Url,
    key: String,
    database: String,
    container: String,
}

impl CosmosStore {
    pub fn from_config(config: &AnalystConfig) -> Result<Self, PipelineError> {
        let base = Url::parse(&config.store_url)
            .map_err(|e| PipelineError::Configuration(format!("invalid STORE_URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            base,
            key: config.store_key.clone(),
            database: config.store_database.clone(),
            container: config.store_container.clone(),
        })
    }

    fn docs_url(&self, id: Option<&str>) -> Result<Url, PipelineError> {
        let mut path = format!(
            "dbs/{}/colls/{}/docs",
            self.database, self.container
        );
        if let Some(id) = id {
            path.push('/');
            path.push_str(id);
        }
        self.base
            .join(&path)
            .map_err(|e| PipelineError::Store(format!("invalid document path: {}", e)))
    }

    fn store_error(context: &str, status: StatusCode) -> PipelineError {
        PipelineError::Store(format!("{} returned status {}", context, status))
    }
}

#[async_trait]
impl DocumentStore for CosmosStore {
    async fn read(&self, id: &str, partition_key: &str) -> Result<Option<Value>, PipelineError> {
        let url = self.docs_url(Some(id))?;
        log::debug!("Reading document {} (partition {})", id, partition_key);
        let response = self
            .client
            .get(url)
            .header("x-store-key", &self.key)
            .query(&[("partitionKey", partition_key)])
            .send()
            .await
            .map_err(|e| PipelineError::Store(format!("read request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let doc = response
                    .json::<Value>()
                    .await
                    .map_err(|e| PipelineError::Store(format!("decoding document failed: {}", e)))?;
                Ok(Some(doc))
            }
            status => Err(Self::store_error("read", status)),
        }
    }

    async fn upsert(&self, partition_key: &str, document: Value) -> Result<(), PipelineError> {
        let url = self.docs_url(None)?;
        let response = self
            .client
            .post(url)
            .header("x-store-key", &self.key)
            .header("x-store-is-upsert", "true")
            .query(&[("partitionKey", partition_key)])
            .json(&document)
            .send()
            .await
            .map_err(|e| PipelineError::Store(format!("upsert request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::store_error("upsert", response.status()));
        }
        Ok(())
    }

    async fn replace(
        &self,
        id: &str,
        partition_key: &str,
        document: Value,
    ) -> Result<(), PipelineError> {
        let url = self.docs_url(Some(id))?;
        let response = self
            .client
            .put(url)
            .header("x-store-key", &self.key)
            .query(&[("partitionKey", partition_key)])
            .json(&document)
            .send()
            .await
            .map_err(|e| PipelineError::Store(format!("replace request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(PipelineError::NotFound(id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(Self::store_error("replace", status)),
        }
    }
}
