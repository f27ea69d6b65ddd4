//! HTML index for directories that have no `index.html`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::Uri,
    response::Html,
};

use super::static_files::StaticFiles;
use crate::error::AppError;

/// One directory entry as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    is_dir: bool,
}

/// Fallback for requests `ServeDir` could not satisfy.
///
/// Renders a listing when the path is a directory, otherwise 404.
pub async fn directory_listing(
    State(files): State<Arc<StaticFiles>>,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    let request_path = uri.path();
    let not_found = || AppError::NotFound(request_path.to_string());

    let relative = files.relative_path(request_path).ok_or_else(not_found)?;
    if !request_path.ends_with('/') {
        return Err(not_found());
    }

    let dir = files.root().join(&relative);
    let metadata = match tokio::fs::metadata(&dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(not_found());
    }

    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if files.is_hidden(&relative.join(&name)) {
            continue;
        }
        // Follows symlinks, so a link to a directory lists as a directory
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(Entry { name, is_dir });
    }

    let display_path = urlencoding::decode(request_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| request_path.to_string());

    tracing::debug!(path = %display_path, entries = entries.len(), "Rendering directory listing");

    Ok(Html(render(&display_path, entries)))
}

fn render(display_path: &str, mut entries: Vec<Entry>) -> String {
    entries.sort_by_key(|entry| entry.name.to_lowercase());

    let title = format!("Directory listing for {}", escape_html(display_path));

    let mut html = String::with_capacity(512 + entries.len() * 64);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n<hr>\n<ul>\n", title));

    for entry in &entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{}\">{}{}</a></li>\n",
            urlencoding::encode(&entry.name),
            suffix,
            escape_html(&entry.name),
            suffix
        ));
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
