//! Static file serving for the root directory tree.
//!
//! Files are served by `ServeDir`, which infers content types, rejects `..`
//! traversal and appends `index.html` to directory requests. A directory
//! without an index falls through to [`listing::directory_listing`]. The
//! certificate and key are hidden from clients even when they live inside the
//! served root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    handler::Handler,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use super::listing;
use crate::config::{ServerConfig, CACHE_CONTROL_DEV};
use crate::error::AppError;
use crate::middleware::request_id_layer;

/// Read-only view of the served tree, shared by all connections.
#[derive(Debug)]
pub struct StaticFiles {
    root: PathBuf,
    /// Root-relative paths never served or listed
    hidden: Vec<PathBuf>,
}

impl StaticFiles {
    pub fn new(config: &ServerConfig) -> Self {
        let hidden = [&config.cert_path, &config.key_path]
            .into_iter()
            .filter_map(|path| path.strip_prefix(&config.root).ok())
            .map(Path::to_path_buf)
            .collect();

        Self {
            root: config.root.clone(),
            hidden,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a root-relative path.
    ///
    /// Percent-decodes the path and drops empty and `.` segments. Returns
    /// `None` for `..`, absolute or prefixed components, or invalid UTF-8.
    pub fn relative_path(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(request_path).ok()?;

        let mut relative = PathBuf::new();
        for segment in decoded.split('/') {
            for component in Path::new(segment).components() {
                match component {
                    Component::Normal(part) => relative.push(part),
                    Component::CurDir => {}
                    Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                        return None
                    }
                }
            }
        }
        Some(relative)
    }

    /// Compared case-insensitively: on APFS or NTFS `Server.KEY` opens `server.key`.
    pub fn is_hidden(&self, relative: &Path) -> bool {
        let relative = relative.to_string_lossy().to_lowercase();
        self.hidden
            .iter()
            .any(|hidden| hidden.to_string_lossy().to_lowercase() == relative)
    }
}

/// Build the router serving `config.root`.
pub fn create_router(config: &ServerConfig) -> Router {
    let files = Arc::new(StaticFiles::new(config));

    let serve_dir = ServeDir::new(files.root())
        .append_index_html_on_directories(true)
        .fallback(listing::directory_listing.with_state(files.clone()));

    Router::new()
        .fallback_service(serve_dir)
        .layer(middleware::from_fn_with_state(files, hide_reserved_files))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_DEV),
        ))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

/// Answer 404 for the certificate and key files.
async fn hide_reserved_files(
    State(files): State<Arc<StaticFiles>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if let Some(relative) = files.relative_path(path) {
        if files.is_hidden(&relative) {
            tracing::debug!(path = %path, "Refusing to serve certificate material");
            return AppError::NotFound(path.to_string()).into_response();
        }
    }
    next.run(request).await
}
