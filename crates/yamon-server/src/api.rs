use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use std::fmt::Write;
use yamon_common::error::MetricError;
use yamon_common::types::{Counter, Gauge, Metric, MetricEnvelope, MetricKind};
use yamon_storage::{Repository, StorageError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_metrics))
        .route("/ping", get(ping))
        .route("/value/", post(value_json))
        .route("/value/{kind}/{name}", get(value_text))
        .route("/update/", post(update_json))
        .route("/updates/", post(update_batch))
        .route("/update/{kind}/{name}/{value}", post(update_path))
}

/// Handler failure, rendered as a plain-text body with the matching status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, msg).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        if e.is_validation() {
            ApiError::BadRequest(e.to_string())
        } else if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            tracing::error!(error = %e, "Storage operation failed");
            ApiError::Internal("internal error".to_string())
        }
    }
}

impl From<MetricError> for ApiError {
    fn from(e: MetricError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("malformed metric: {e}")))
}

fn store(repo: &dyn Repository, metric: &Metric) -> Result<(), StorageError> {
    match metric {
        Metric::Counter(c) => repo.store_counter(c),
        Metric::Gauge(g) => repo.store_gauge(g),
    }
}

/// `POST /update/{kind}/{name}/{value}`
async fn update_path(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let metric = match kind.parse::<MetricKind>()? {
        MetricKind::Counter => {
            let delta = value.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("counter value is not an integer: {value}"))
            })?;
            Metric::Counter(Counter::new(name, delta))
        }
        MetricKind::Gauge => {
            let v = value.parse::<f64>().map_err(|_| {
                ApiError::BadRequest(format!("gauge value is not a number: {value}"))
            })?;
            Metric::Gauge(Gauge::new(name, v))
        }
    };
    store(state.repo.as_ref(), &metric)?;
    Ok(StatusCode::OK)
}

/// `POST /update/` with one envelope.
async fn update_json(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let envelope: MetricEnvelope = decode(&body)?;
    envelope.verify(state.hash_key.as_ref())?;
    store(state.repo.as_ref(), &envelope.to_metric()?)?;
    Ok(StatusCode::OK)
}

/// `POST /updates/` with an envelope array.
///
/// Every envelope is verified and validated before anything is written, so
/// a bad hash or value rejects the whole batch untouched.
async fn update_batch(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let batch: Vec<MetricEnvelope> = decode(&body)?;

    let mut gauges = Vec::new();
    let mut counters = Vec::new();
    for envelope in &batch {
        envelope.verify(state.hash_key.as_ref())?;
        let metric = envelope.to_metric()?;
        metric.validate()?;
        match metric {
            Metric::Counter(c) => counters.push(c),
            Metric::Gauge(g) => gauges.push(g),
        }
    }

    state.repo.write_bulk_gauges(&gauges)?;
    state.repo.write_bulk_counters(&counters)?;
    tracing::debug!(
        trace_id = %trace_id.0,
        gauges = gauges.len(),
        counters = counters.len(),
        "Batch stored"
    );
    Ok(StatusCode::OK)
}

/// `POST /value/`: looks up the envelope's id and type, answering with the
/// stored value, signed when the server has a key.
async fn value_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MetricEnvelope>, ApiError> {
    let query: MetricEnvelope = decode(&body)?;
    let mut reply = match query.kind {
        MetricKind::Counter => MetricEnvelope::from(&state.repo.retrieve_counter(&query.id)?),
        MetricKind::Gauge => MetricEnvelope::from(&state.repo.retrieve_gauge(&query.id)?),
    };
    if let Some(key) = &state.hash_key {
        reply.sign(key)?;
    }
    Ok(Json(reply))
}

/// `GET /value/{kind}/{name}` as plain text.
async fn value_text(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let kind = kind
        .parse::<MetricKind>()
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    let text = match kind {
        MetricKind::Counter => state.repo.retrieve_counter(&name)?.value.to_string(),
        MetricKind::Gauge => state.repo.retrieve_gauge(&name)?.value.to_string(),
    };
    Ok(text)
}

/// `GET /`: every stored metric, gauges then counters, each sorted by name.
async fn list_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let set = state.repo.list_stored_metrics()?;
    let mut body = String::new();
    for g in &set.gauges {
        let _ = writeln!(body, "{}\t\t{}", g.name, g.value);
    }
    for c in &set.counters {
        let _ = writeln!(body, "{}\t\t{}", c.name, c.value);
    }
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response())
}

async fn ping(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.repo.ping().map_err(|e| {
        tracing::error!(error = %e, "Storage ping failed");
        ApiError::Internal("storage is down".to_string())
    })?;
    Ok(StatusCode::OK)
}
