//! Request logging middleware.
//!
//! Generates a UUID v4 for each incoming request and creates a tracing span
//! around it carrying the method, path and client address. Completion is
//! logged with the status code and duration.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Request ID stored in request extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// Middleware that assigns a request ID and logs the request outcome.
///
/// Must be the outermost layer so the span covers everything else.
pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        client = %client,
    );

    request.extensions_mut().insert(RequestId(request_id));
    let start = Instant::now();

    async move {
        let response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), duration_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), duration_ms, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}
