//! Middleware for logging API requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// The number of characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    log_body("Received request", &parts, &String::from_utf8_lossy(&body_bytes));

    let response = next.run(Request::from_parts(parts, body_bytes.into())).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log_body("Sending response", &parts, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, body_bytes.into())
}

async fn read_body(body: Body) -> Result<Bytes, axum::Error> {
    axum::body::to_bytes(body, usize::MAX).await
}

/// The first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if the
/// body is short enough to log in full.
fn truncate_body(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}

fn log_body(message: &str, parts: &impl std::fmt::Debug, body: &str) {
    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!("{message}: {parts:#?}\nbody: {truncated}...");
            tracing::debug!("Full body: {body:?}");
        }
        None => tracing::info!("{message}: {parts:#?}\nbody: {body:?}"),
    }
}
