//! HTTP-backed collaborator clients. The narrative and holdings analyses
//! run in separate deployments; these clients post the filing identifiers
//! and decode the structured payload the collaborator returns.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::core::config::AnalystConfig;
use crate::core::types::{AnalysisRequest, PipelineError};
use crate::filing::NarrativeReport;
use crate::pipeline::{HoldingsExtractor, NarrativeAnalyzer};

async fn post_request<T: serde::de::DeserializeOwned>(
    client: &Client,
    endpoint: &Url,
    api_key: Option<&str>,
    request: &AnalysisRequest,
) -> Result<T, PipelineError> {
    log::info!("Posting analysis trigger to {}", endpoint);
    let mut builder = client.post(endpoint.as_str()).json(request);
    if let Some(key) = api_key {
        builder = builder.query(&[("code", key)]);
    }
    let response = builder
        .send()
        .await
        .map_err(|e| PipelineError::Upstream(format!("request to {} failed: {}", endpoint, e)))?;

    if !response.status().is_success() {
        return Err(PipelineError::Upstream(format!(
            "{} returned status {}",
            endpoint,
            response.status()
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| PipelineError::Upstream(format!("decoding {} response failed: {}", endpoint, e)))
}

fn endpoint_from(
    url: &Option<String>,
    setting: &str,
) -> Result<Url, PipelineError> {
    let raw = url
        .as_ref()
        .ok_or_else(|| PipelineError::Configuration(format!("{} not set", setting)))?;
    Url::parse(raw)
        .map_err(|e| PipelineError::Configuration(format!("invalid {}: {}", setting, e)))
}

pub struct HttpNarrativeAnalyzer {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpNarrativeAnalyzer {
    pub fn from_config(config: &AnalystConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_from(&config.narrative_url, "NARRATIVE_API_URL")?,
            api_key: config.trigger_api_key.clone(),
        })
    }
}

#[async_trait]
impl NarrativeAnalyzer for HttpNarrativeAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<NarrativeReport, PipelineError> {
        post_request(&self.client, &self.endpoint, self.api_key.as_deref(), request).await
    }
}

pub struct HttpHoldingsExtractor {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpHoldingsExtractor {
    pub fn from_config(config: &AnalystConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_from(&config.holdings_url, "HOLDINGS_API_URL")?,
            api_key: config.trigger_api_key.clone(),
        })
    }
}

#[async_trait]
impl HoldingsExtractor for HttpHoldingsExtractor {
    async fn extract(&self, request: &AnalysisRequest) -> Result<Vec<Value>, PipelineError> {
        post_request(&self.client, &self.endpoint, self.api_key.as_deref(), request).await
    }
}
