//! Media download endpoint
//!
//! Resolves a message identifier against the media reference cache and
//! streams the bytes fetched through the protocol session. A missing cache
//! entry means the reference expired (process restart) or never existed —
//! a plain 404, never an error.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use super::ApiState;

/// `GET /api/download/{message_id}` — fetch the media of a cached reference
pub async fn download_media(
    State(state): State<Arc<ApiState>>,
    Path(message_id): Path<String>,
) -> Response {
    let Some(media) = state.media.get(&message_id).await else {
        return (StatusCode::NOT_FOUND, "media not found or expired").into_response();
    };

    match state.session.download(&media).await {
        Ok(data) => {
            let content_type = sniff_content_type(&data, media.mimetype.as_deref());
            ([(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        Err(e) => {
            tracing::warn!(id = %message_id, error = %e, "media download failed");
            (
                StatusCode::BAD_GATEWAY,
                format!("failed to download media: {e}"),
            )
                .into_response()
        }
    }
}

/// Detect a content type from magic bytes, falling back to the declared
/// mimetype and then to a generic octet stream
fn sniff_content_type(data: &[u8], declared: Option<&str>) -> String {
    detect_from_magic_bytes(data).map_or_else(
        || {
            declared
                .unwrap_or("application/octet-stream")
                .to_string()
        },
        String::from,
    )
}

/// Detect well-known media types from magic bytes
fn detect_from_magic_bytes(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("image/png");
    }

    // GIF: GIF87a or GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    // OGG: OggS
    if data.starts_with(b"OggS") {
        return Some("audio/ogg");
    }

    // PDF: %PDF
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }

    // MP4/M4A: ....ftyp
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Some("video/mp4");
    }

    None
}
