use analyst::{
    core::config::AnalystConfig,
    core::types::{AnalysisRequest, PipelineError, StageOutcome},
    edgar::facts::EdgarFactSource,
    edgar::report::FormType,
    pipeline::Sequencer,
    remote::{HttpHoldingsExtractor, HttpNarrativeAnalyzer},
    repo::FilingRepository,
    store::CosmosStore,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::{collections::HashMap, str::FromStr, sync::Arc};

struct AppState {
    sequencer: Sequencer,
}

/// Pulls one request field from the query string, falling back to the JSON
/// body. Query parameters take precedence.
fn field(
    name: &str,
    params: &HashMap<String, String>,
    body: &Option<Value>,
) -> Option<String> {
    params.get(name).cloned().or_else(|| {
        body.as_ref()
            .and_then(|b| b.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn parse_request(
    params: &HashMap<String, String>,
    body: &Option<Value>,
) -> Result<AnalysisRequest, (StatusCode, String)> {
    let accession_code = field("accession_code", params, body);
    let ticker = field("ticker", params, body);
    let date = field("date", params, body);
    let form = field("form", params, body);

    match (accession_code, ticker, date, form) {
        (Some(accession_code), Some(ticker), Some(date), Some(form)) => {
            let form = FormType::from_str(&form)
                .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
            Ok(AnalysisRequest {
                accession_code,
                ticker,
                date,
                form,
            })
        }
        _ => Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Missing parameters. Please provide 'accession_code', 'ticker', 'date', and \
                 'form' in the query string or request body. Routed form types: {}.",
                FormType::list_types()
            ),
        )),
    }
}

fn error_response(err: PipelineError) -> (StatusCode, String) {
    let status = match err {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Configuration(_)
        | PipelineError::Derivation(_)
        | PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::error!("Request failed: {}", err);
    (status, err.to_string())
}

async fn process_filing(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<Json<StageOutcome>, (StatusCode, String)> {
    let request = parse_request(&params, &body.map(|Json(v)| v))?;
    log::info!(
        "Received data: Accession Code - {}, Ticker - {}, Date - {}, Form - {}.",
        request.accession_code,
        request.ticker,
        request.date,
        request.form
    );
    let outcome = state
        .sequencer
        .run(&request)
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}

async fn financial_health(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<String, (StatusCode, String)> {
    let request = parse_request(&params, &body.map(|Json(v)| v))?;
    state
        .sequencer
        .run_financial_health(&request)
        .await
        .map_err(error_response)?;
    Ok(format!("Updated filing entry for {}", request.accession_code))
}

async fn narrative(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<String, (StatusCode, String)> {
    let request = parse_request(&params, &body.map(|Json(v)| v))?;
    state
        .sequencer
        .run_narrative(&request)
        .await
        .map_err(error_response)?;
    Ok(format!("Updated filing entry for {}", request.accession_code))
}

async fn holdings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<String, (StatusCode, String)> {
    let request = parse_request(&params, &body.map(|Json(v)| v))?;
    state
        .sequencer
        .run_holdings(&request)
        .await
        .map_err(error_response)?;
    Ok(format!("Updated filing entry for {}", request.accession_code))
}

async fn health() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = AnalystConfig::from_env()?;
    let store = Arc::new(CosmosStore::from_config(&config)?);
    let repo = FilingRepository::new(store);
    let facts = Arc::new(EdgarFactSource::new(&config.user_agent));
    let narrative_client = Arc::new(HttpNarrativeAnalyzer::from_config(&config)?);
    let holdings_client = Arc::new(HttpHoldingsExtractor::from_config(&config)?);

    let sequencer = Sequencer::new(
        repo,
        facts,
        narrative_client,
        holdings_client,
        config.chunk_budget_bytes,
    );
    let state = Arc::new(AppState { sequencer });

    let app = Router::new()
        .route("/health", axum::routing::get(health))
        .route("/filings", post(process_filing))
        .route("/filings/financial-health", post(financial_health))
        .route("/filings/narrative", post(narrative))
        .route("/filings/holdings", post(holdings))
        .with_state(state);

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    log::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
