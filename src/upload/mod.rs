//! Upload pipeline
//!
//! One linear flow per request: the ingestor buffers the submitted file in
//! memory, the bridge streams it into a remote upload sink and settles with
//! the sink's single outcome. Nothing touches local disk and nothing is
//! shared between requests.

use bytes::Bytes;

pub mod bridge;
pub mod ingest;

pub use bridge::BridgeError;
pub use ingest::IngestError;

/// A file submission buffered fully in memory
///
/// Owned exclusively by the request that received it; discarded when the
/// response is finalized.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub buffer: Bytes,
    pub filename: String,
    pub content_type: String,
}

impl UploadedFile {
    /// Byte length of the buffered file
    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Whether the buffered file is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_file_len() {
        let file = UploadedFile {
            buffer: Bytes::from_static(b"hello"),
            filename: "hello.txt".into(),
            content_type: "text/plain".into(),
        };
        assert_eq!(file.len(), 5);
        assert!(!file.is_empty());
    }
}
