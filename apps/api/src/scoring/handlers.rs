use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    http::{header::ACCEPT, HeaderMap},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::info;

use crate::context::{thesis_from_upload, PortfolioContext};
use crate::errors::AppError;
use crate::ingest::parse_table_bytes;
use crate::models::scoring::ScoredResult;
use crate::models::table::{CandidateRow, Table};
use crate::scoring::prompts::PromptContext;
use crate::scoring::weights::ScoringWeights;
use crate::state::AppState;

/// Multipart field the front-end uses for the deals file.
pub const UPLOAD_FIELD: &str = "new_deals_file";
pub const HISTORICAL_FIELD: &str = "historical_data_file";
pub const APPLICATIONS_FIELD: &str = "applications_file";
pub const PORTFOLIO_FIELD: &str = "portfolio_file";
pub const THESIS_FIELD: &str = "context_pdf";
/// Thesis text used when a self-contained request brings none.
pub const NO_THESIS_TEXT: &str = "No investment thesis was provided.";

struct Upload {
    name: Option<String>,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

impl Upload {
    fn label(&self) -> &str {
        self.file_name.as_deref().unwrap_or("upload")
    }
}

async fn read_fields(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
            .to_vec();
        fields.push(Upload {
            name,
            file_name,
            bytes,
        });
    }
    Ok(fields)
}

/// The field named `name`, else the first field carrying a file name, else
/// the first field at all.
fn pick_upload(mut fields: Vec<Upload>, name: &str) -> Result<Upload, AppError> {
    let index = fields
        .iter()
        .position(|f| f.name.as_deref() == Some(name))
        .or_else(|| fields.iter().position(|f| f.file_name.is_some()))
        .or((!fields.is_empty()).then_some(0))
        .ok_or_else(|| AppError::Validation("No file was uploaded".into()))?;
    Ok(fields.swap_remove(index))
}

fn take_field(fields: &mut Vec<Upload>, name: &str) -> Option<Upload> {
    let index = fields.iter().position(|f| f.name.as_deref() == Some(name))?;
    Some(fields.remove(index))
}

fn require_field(fields: &mut Vec<Upload>, name: &str) -> Result<Upload, AppError> {
    take_field(fields, name)
        .ok_or_else(|| AppError::Validation(format!("Missing multipart field '{name}'")))
}

fn parse_upload(upload: &Upload) -> Result<Table, AppError> {
    let table = parse_table_bytes(&upload.bytes, upload.file_name.as_deref())?;
    info!("Received '{}' with {} rows", upload.label(), table.len());
    Ok(table)
}

/// Thesis from an optional uploaded document, else `fallback`, else
/// [`NO_THESIS_TEXT`].
async fn resolve_thesis(upload: Option<Upload>, fallback: Option<&str>) -> Result<String, AppError> {
    let Some(upload) = upload.filter(|u| !u.bytes.is_empty()) else {
        return Ok(fallback.unwrap_or(NO_THESIS_TEXT).to_string());
    };
    let text = tokio::task::spawn_blocking(move || {
        thesis_from_upload(&upload.bytes, upload.file_name.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
    .map_err(|e| AppError::Validation(format!("Could not read the thesis document: {e}")))?;
    Ok(text)
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

/// POST /api/analyze
/// Scores every row of the uploaded table. Streams rows as server-sent events
/// when the client accepts `text/event-stream`, otherwise returns a JSON array.
pub async fn handle_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let context = state.context.require()?;
    let upload = pick_upload(read_fields(multipart).await?, UPLOAD_FIELD)?;
    let table = parse_upload(&upload)?;

    if wants_event_stream(&headers) {
        let ctx = PromptContext::from_portfolio(&context);
        let events = state
            .orchestrator
            .clone()
            .run_stream(table, ctx)
            .map(|result| Event::default().json_data(result));
        return Ok(Sse::new(events).into_response());
    }

    let outcome = state
        .orchestrator
        .run_batch(&table, context, state.sink.as_ref())
        .await;
    Ok(Json(outcome.results).into_response())
}

/// POST /api/score-historical-data
/// Scores an uploaded historical table against itself, resuming from and
/// appending to the historical output file. An optional `context_pdf` replaces
/// the loaded thesis for this run.
pub async fn handle_score_historical(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<ScoredResult>>, AppError> {
    let mut fields = read_fields(multipart).await?;
    let upload = require_field(&mut fields, HISTORICAL_FIELD)?;
    let table = parse_upload(&upload)?;
    let loaded_thesis = state.context.thesis().ok();
    let thesis = resolve_thesis(take_field(&mut fields, THESIS_FIELD), loaded_thesis).await?;

    let context = PortfolioContext {
        qualitative: &table,
        quantitative: None,
        thesis: &thesis,
    };
    let outcome = state
        .orchestrator
        .run_batch(&table, context, Some(&state.historical_sink))
        .await;
    Ok(Json(outcome.results))
}

/// POST /api/process-and-score
/// Self-contained run: applications, portfolio and optional thesis all come
/// with the request. Nothing is persisted.
pub async fn handle_process_and_score(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<ScoredResult>>, AppError> {
    let mut fields = read_fields(multipart).await?;
    let applications = parse_upload(&require_field(&mut fields, APPLICATIONS_FIELD)?)?;
    let portfolio = parse_upload(&require_field(&mut fields, PORTFOLIO_FIELD)?)?;
    let thesis = resolve_thesis(take_field(&mut fields, THESIS_FIELD), None).await?;

    let context = PortfolioContext {
        qualitative: &portfolio,
        quantitative: None,
        thesis: &thesis,
    };
    let outcome = state.orchestrator.run_batch(&applications, context, None).await;
    Ok(Json(outcome.results))
}

/// POST /api/rerun-analysis
/// Re-scores one candidate the analyst edited in the front-end.
pub async fn handle_rerun(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ScoredResult>, AppError> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let candidate = match body {
        Value::Object(map) if !map.is_empty() => CandidateRow::new(map),
        Value::Object(_) => return Err(AppError::Validation("Candidate data is empty".into())),
        _ => return Err(AppError::Validation("Candidate must be a JSON object".into())),
    };

    let context = state.context.require()?;
    let result = state.orchestrator.score_single(&candidate, context).await;
    Ok(Json(result))
}

/// GET /api/config/scoring-weights
pub async fn handle_scoring_weights(
    State(state): State<AppState>,
) -> Result<Json<ScoringWeights>, AppError> {
    if let Some(reason) = &state.weights_error {
        return Err(AppError::Config(format!("Scoring weights unavailable: {reason}")));
    }
    Ok(Json(state.orchestrator.weights().clone()))
}
