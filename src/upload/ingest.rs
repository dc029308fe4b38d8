//! Form ingestor
//!
//! Extracts the single file field from a `multipart/form-data` submission
//! into an in-memory [`UploadedFile`]. No temporary files are written; the
//! parser's whole-stream size limit rejects oversized submissions before
//! they are fully buffered.

use super::UploadedFile;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

/// Name of the form field carrying the file
pub const FILE_FIELD: &str = "imageUpload";

/// Fallback filename for submissions that do not carry one
const DEFAULT_FILENAME: &str = "upload.bin";

/// Fallback content type for parts without one
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Ingest errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Expected a multipart/form-data body")]
    NotMultipart,

    #[error("Missing file field 'imageUpload'")]
    MissingFile,

    #[error("File exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Malformed multipart body: {0}")]
    Malformed(String),
}

/// Parse a multipart body and buffer the `imageUpload` field in memory.
///
/// Other form fields may ride along with the submission; they are skipped.
/// A submission without the file field is rejected before any sink is
/// opened, as is anything larger than `max_bytes`.
pub async fn ingest<S, O, E>(
    body: S,
    content_type: Option<&str>,
    max_bytes: u64,
) -> Result<UploadedFile, IngestError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    let content_type = content_type.ok_or(IngestError::NotMultipart)?;
    let boundary =
        multer::parse_boundary(content_type).map_err(|_| IngestError::NotMultipart)?;

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(max_bytes));
    let mut multipart = multer::Multipart::with_constraints(body, boundary, constraints);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multer_error(e, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or(DEFAULT_FILENAME).to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let buffer = field
            .bytes()
            .await
            .map_err(|e| map_multer_error(e, max_bytes))?;

        tracing::debug!(
            filename = %filename,
            content_type = %content_type,
            bytes = buffer.len(),
            "Ingested file field"
        );

        return Ok(UploadedFile {
            buffer,
            filename,
            content_type,
        });
    }

    Err(IngestError::MissingFile)
}

fn map_multer_error(err: multer::Error, limit: u64) -> IngestError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            IngestError::TooLarge { limit }
        }
        other => IngestError::Malformed(other.to_string()),
    }
}
