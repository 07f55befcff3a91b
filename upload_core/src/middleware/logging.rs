//! Request tracing for the upload API

use axum::{body::Body, Router};
use http::{header, HeaderMap, Request, Response, StatusCode};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

/// Wraps every route of `router` in a `TraceLayer` using the callbacks below.
pub fn trace_requests<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(make_span)
            .on_request(on_request)
            .on_response(on_response)
            .on_failure(on_failure),
    )
}

pub fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        query = ?request.uri().query(),
        content_type = header_str(headers, header::CONTENT_TYPE),
        body_bytes = header_str(headers, header::CONTENT_LENGTH),
    )
}

fn on_request(request: &Request<Body>, _span: &Span) {
    tracing::debug!("received {} {}", request.method(), request.uri().path());
}

fn on_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status();
    let latency_ms = latency.as_millis();

    match status {
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            tracing::info!(status = status.as_u16(), latency_ms, "upload rejected by constraints");
        }
        s if s.is_success() => {
            tracing::info!(status = s.as_u16(), latency_ms, "request completed");
        }
        s if s.is_client_error() => {
            tracing::warn!(status = s.as_u16(), latency_ms, "client error response");
        }
        s => {
            tracing::error!(status = s.as_u16(), latency_ms, "server error response");
        }
    }
}

fn on_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    tracing::error!(latency_ms = latency.as_millis(), error = %error, "request failed");
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}
