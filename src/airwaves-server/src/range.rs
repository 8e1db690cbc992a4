//! Byte-range serving of cached audio files.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
pub const AUDIO_CACHE_CONTROL: &str = "private, max-age=0, must-revalidate";

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Never zero; ranges are inclusive.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse `bytes=<start>-[<end>]` against a file of `size` bytes.
///
/// Anything unsatisfiable or malformed yields `None`, which callers treat as
/// "serve the whole file". Suffix and multi-part ranges are not supported.
pub fn parse_range(header: Option<&str>, size: u64) -> Option<ByteRange> {
    let spec = header?.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = position(start)?;
    let end = match end.trim() {
        "" => size.checked_sub(1)?,
        explicit => position(explicit)?,
    };
    if start > end || end >= size {
        return None;
    }
    Some(ByteRange { start, end })
}

/// Bare ASCII digits only; `u64::from_str` alone would also take a leading `+`.
fn position(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Stream `path`, honouring `range_header` when it is satisfiable.
pub async fn serve_file(path: &Path, range_header: Option<&str>) -> std::io::Result<Response> {
    let mut file = File::open(path).await?;
    let size = file.metadata().await?.len();

    let Some(range) = parse_range(range_header, size) else {
        if range_header.is_some() {
            tracing::debug!(range = ?range_header, size, "ignoring unsatisfiable range");
        }
        let body = Body::from_stream(ReaderStream::new(file));
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, AUDIO_CONTENT_TYPE.to_string()),
                (header::CONTENT_LENGTH, size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (header::CACHE_CONTROL, AUDIO_CACHE_CONTROL.to_string()),
            ],
            body,
        )
            .into_response());
    };

    file.seek(SeekFrom::Start(range.start)).await?;
    let body = Body::from_stream(ReaderStream::new(file.take(range.length())));
    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, AUDIO_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, range.length().to_string()),
            (
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, size),
            ),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CACHE_CONTROL, AUDIO_CACHE_CONTROL.to_string()),
        ],
        body,
    )
        .into_response())
}
