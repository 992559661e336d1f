use crate::core::types::PipelineError;

/// Default chunk budget, chosen to sit safely under the document store's
/// 2 MiB per-document ceiling.
pub const DEFAULT_CHUNK_BUDGET_BYTES: usize = 1_992_294;

#[derive(Clone, Debug)]
pub struct AnalystConfig {
    pub store_url: String,
    pub store_key: String,
    pub store_database: String,
    pub store_container: String,
    pub user_agent: String,
    pub chunk_budget_bytes: usize,
    pub narrative_url: Option<String>,
    pub holdings_url: Option<String>,
    pub trigger_api_key: Option<String>,
}

impl AnalystConfig {
    /// Builds the configuration once at process start. Fails before any I/O
    /// is attempted when a required store setting is unset.
    pub fn from_env() -> Result<Self, PipelineError> {
        let store_url = require_env("STORE_URL")?;
        let store_key = require_env("STORE_KEY")?;
        let store_database = require_env("STORE_DATABASE")?;
        let store_container = require_env("STORE_CONTAINER")?;

        let user_agent =
            std::env::var("USER_AGENT").unwrap_or_else(|_| "software@example.com".to_string());

        let chunk_budget_bytes = match std::env::var("CHUNK_BUDGET_BYTES") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                PipelineError::Configuration(format!(
                    "CHUNK_BUDGET_BYTES is not a byte count: {}",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_CHUNK_BUDGET_BYTES,
        };

        Ok(Self {
            store_url,
            store_key,
            store_database,
            store_container,
            user_agent,
            chunk_budget_bytes,
            narrative_url: std::env::var("NARRATIVE_API_URL").ok(),
            holdings_url: std::env::var("HOLDINGS_API_URL").ok(),
            trigger_api_key: std::env::var("TRIGGER_API_KEY").ok(),
        })
    }
}

fn require_env(name: &str) -> Result<String, PipelineError> {
    std::env::var(name).map_err(|_| {
        PipelineError::Configuration(format!("{} environment variable not set", name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_url_is_a_configuration_error() {
        std::env::remove_var("STORE_URL");
        let err = AnalystConfig::from_env().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
