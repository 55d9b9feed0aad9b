//! Serving the persisted camera image with revalidation.

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};

use crate::constants::CAMERA_CACHE_CONTROL;
use crate::error::CanvasError;
use crate::image_fetcher::sniff_mime;

/// Identifies one version of the camera file.
///
/// Every new picture overwrites the same path, so size and mtime are enough to tell them apart.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CameraStamp {
    etag: String,
    modified: Option<Duration>,
}

impl CameraStamp {
    pub(crate) fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|at| at.duration_since(UNIX_EPOCH).ok());
        let etag = format!(
            "W/\"{}-{}\"",
            metadata.len(),
            modified.map(|at| at.as_nanos()).unwrap_or_default()
        );
        Self { etag, modified }
    }

    /// True when the client's copy is this version.
    ///
    /// `If-None-Match` wins when present. `If-Modified-Since` only has second precision.
    pub(crate) fn is_current(&self, headers: &HeaderMap) -> bool {
        if let Some(value) = headers.get(IF_NONE_MATCH) {
            return value.to_str().is_ok_and(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .any(|tag| tag == "*" || tag == self.etag)
            });
        }
        let Some(modified) = self.modified else {
            return false;
        };
        headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_http_date(value).ok())
            .and_then(|since| since.duration_since(UNIX_EPOCH).ok())
            .is_some_and(|since| modified.as_secs() <= since.as_secs())
    }

    fn stamp(&self, builder: Builder) -> Builder {
        let builder = builder
            .header(CACHE_CONTROL, CAMERA_CACHE_CONTROL)
            .header(ETAG, self.etag.as_str());
        match self.modified {
            Some(modified) => builder.header(LAST_MODIFIED, fmt_http_date(UNIX_EPOCH + modified)),
            None => builder,
        }
    }
}

/// Serves the persisted camera image, or a 304 when the client already has it.
pub(crate) async fn camera_image_response(
    path: &Path,
    headers: &HeaderMap,
) -> Result<Response, CanvasError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CanvasError::NotFound(path.display().to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    let stamp = CameraStamp::from_metadata(&metadata);
    if stamp.is_current(headers) {
        return stamp
            .stamp(Response::builder().status(StatusCode::NOT_MODIFIED))
            .body(Body::empty())
            .map_err(CanvasError::from);
    }

    let bytes = tokio::fs::read(path).await?;
    stamp
        .stamp(
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, sniff_mime(&bytes)),
        )
        .body(Body::from(bytes))
        .map_err(CanvasError::from)
}
