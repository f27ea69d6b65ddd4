use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::io;

/// Errors surfaced to HTTP clients by the static file handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Io(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            AppError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                StatusCode::FORBIDDEN
            }
            AppError::Io(_) => {
                tracing::error!("Internal error: {:?}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let reason = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Error {code}</title>
</head>
<body>
    <h1>Error {code}</h1>
    <p>{reason}</p>
    <a href="/">Return to index</a>
</body>
</html>"#,
            code = status.as_u16(),
            reason = reason,
        );

        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("/x".into()), StatusCode::NOT_FOUND),
            (
                AppError::Io(io::Error::from(io::ErrorKind::NotFound)),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Io(io::Error::from(io::ErrorKind::PermissionDenied)),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::Io(io::Error::other("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
