use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::Rng;
use std::time::Instant;

/// Trace id stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl TraceId {
    fn random() -> Self {
        TraceId(format!("{:016x}", rand::thread_rng().gen::<u64>()))
    }
}

/// Characters of a metric payload echoed into the request log line.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Largest metric payload accepted; a full agent batch is a few kilobytes.
const MAX_REQUEST_BODY: usize = 4 * 1024 * 1024;

/// Leading part of a JSON payload for the log, cut on a char boundary.
fn payload_preview(body: &Bytes) -> String {
    let Ok(text) = std::str::from_utf8(body) else {
        return format!("<{} non-utf8 bytes>", body.len());
    };
    match text.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Logs every exchange under a fresh trace id, echoed back in `X-Trace-Id`.
///
/// POST bodies are buffered so the metric payload can be previewed in the
/// request line; a body over `MAX_REQUEST_BODY` is answered with 413
/// before it reaches a handler.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = TraceId::random();
    req.extensions_mut().insert(trace_id.clone());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let req = if method == Method::POST {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    trace_id = %trace_id.0,
                    path = %path,
                    error = %e,
                    "Rejected unreadable metric payload"
                );
                return with_trace_header(
                    (StatusCode::PAYLOAD_TOO_LARGE, "metric payload too large").into_response(),
                    &trace_id,
                );
            }
        };
        tracing::info!(
            trace_id = %trace_id.0,
            method = %method,
            path = %path,
            bytes = bytes.len(),
            payload = %payload_preview(&bytes),
            ua = %user_agent,
            "--> request"
        );
        Request::from_parts(parts, Body::from(bytes))
    } else {
        tracing::info!(
            trace_id = %trace_id.0,
            method = %method,
            path = %path,
            ua = %user_agent,
            "--> request"
        );
        req
    };

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(trace_id = %trace_id.0, status, elapsed_ms, "<-- response");
    } else if response.status().is_client_error() {
        tracing::warn!(trace_id = %trace_id.0, status, elapsed_ms, "<-- response");
    } else {
        tracing::info!(trace_id = %trace_id.0, status, elapsed_ms, "<-- response");
    }

    with_trace_header(response, &trace_id)
}

fn with_trace_header(mut response: Response, trace_id: &TraceId) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}
