use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::PipelineError;

pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const TICKER_INDEX_URL: &str = "https://www.sec.gov/files/company_tickers.json";

const GAAP_NAMESPACE: &str = "us-gaap";

/// One reported fact for a company: a named concept, its value, and the
/// reporting period it covers. `timestamp` is assigned by the fact table
/// adapter from the period end date; rows fetched from upstream carry 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
    pub namespace: String,
    pub fact: String,
    pub accn: String,
    pub end: String,
    pub val: f64,
    #[serde(default)]
    pub fp: Option<String>,
    #[serde(default)]
    pub fy: Option<i32>,
    #[serde(default)]
    pub timestamp: i64,
}

/// The full fact history for a company, filtered down to one taxonomy
/// namespace and one accession number and ordered by effective date.
#[derive(Debug, Clone)]
pub struct FactTable {
    rows: Vec<FactRow>,
}

impl FactTable {
    /// Filters `rows` to the us-gaap namespace and the target accession
    /// number, assigning each surviving row an epoch-nanosecond timestamp
    /// parsed from its period end date. An unparseable date aborts the
    /// whole table; a partially timestamped table is never returned.
    pub fn from_rows(rows: Vec<FactRow>, accession_code: &str) -> Result<Self, PipelineError> {
        let mut subset = Vec::new();
        for mut row in rows {
            if row.namespace != GAAP_NAMESPACE || row.accn != accession_code {
                continue;
            }
            let date = NaiveDate::parse_from_str(&row.end, "%Y-%m-%d").map_err(|_| {
                PipelineError::Derivation(format!("unable to parse period end date: {}", row.end))
            })?;
            row.timestamp = date
                .and_time(NaiveTime::MIN)
                .and_utc()
                .timestamp_nanos_opt()
                .ok_or_else(|| {
                    PipelineError::Derivation(format!("period end date out of range: {}", row.end))
                })?;
            subset.push(row);
        }
        Ok(Self { rows: subset })
    }

    /// Latest reported value for a fact name. Among rows sharing the
    /// maximum timestamp, the last one in original fetch order wins.
    pub fn latest(&self, fact_name: &str) -> Option<f64> {
        self.latest_row(fact_name).map(|row| row.val)
    }

    pub fn latest_row(&self, fact_name: &str) -> Option<&FactRow> {
        let mut best: Option<&FactRow> = None;
        for row in self.rows.iter().filter(|r| r.fact == fact_name) {
            match best {
                Some(b) if row.timestamp < b.timestamp => {}
                _ => best = Some(row),
            }
        }
        best
    }

    pub fn rows(&self) -> &[FactRow] {
        &self.rows
    }
}

/// Supplies the raw fact history for a company. The pipeline filters to the
/// namespace and accession it cares about.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn company_facts(&self, ticker: &str) -> Result<Vec<FactRow>, PipelineError>;
}

#[derive(Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Deserialize)]
struct UnitEntry {
    end: Option<String>,
    val: Option<f64>,
    accn: Option<String>,
    fp: Option<String>,
    fy: Option<i32>,
}

#[derive(Deserialize)]
struct ConceptEntry {
    units: HashMap<String, Vec<UnitEntry>>,
}

#[derive(Deserialize)]
struct CompanyFactsResponse {
    facts: HashMap<String, HashMap<String, ConceptEntry>>,
}

/// EDGAR-backed fact source. Resolves the ticker to a CIK via the public
/// company index, then flattens the companyfacts JSON into fact rows.
pub struct EdgarFactSource {
    client: Client,
    user_agent: String,
}

impl EdgarFactSource {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.to_string(),
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, PipelineError> {
        log::debug!("Fetching URL: {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate")
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::Upstream(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::Upstream(format!("decoding {} failed: {}", url, e)))
    }

    async fn resolve_cik(&self, ticker: &str) -> Result<u64, PipelineError> {
        let index: HashMap<String, TickerEntry> = self.fetch_json(TICKER_INDEX_URL).await?;
        index
            .values()
            .find(|entry| entry.ticker.eq_ignore_ascii_case(ticker))
            .map(|entry| entry.cik_str)
            .ok_or_else(|| PipelineError::Upstream(format!("ticker not found: {}", ticker)))
    }
}

#[async_trait]
impl FactSource for EdgarFactSource {
    async fn company_facts(&self, ticker: &str) -> Result<Vec<FactRow>, PipelineError> {
        let cik = self.resolve_cik(ticker).await?;
        let url = format!("{}/api/xbrl/companyfacts/CIK{:010}.json", EDGAR_DATA_URL, cik);
        let response: CompanyFactsResponse = self.fetch_json(&url).await?;

        let mut rows = Vec::new();
        for (namespace, concepts) in response.facts {
            for (fact, concept) in concepts {
                for entries in concept.units.into_values() {
                    for entry in entries {
                        let (Some(end), Some(val), Some(accn)) =
                            (entry.end, entry.val, entry.accn)
                        else {
                            continue;
                        };
                        rows.push(FactRow {
                            namespace: namespace.clone(),
                            fact: fact.clone(),
                            accn,
                            end,
                            val,
                            fp: entry.fp,
                            fy: entry.fy,
                            timestamp: 0,
                        });
                    }
                }
            }
        }
        log::debug!("Flattened {} fact rows for {}", rows.len(), ticker);
        Ok(rows)
    }
}
