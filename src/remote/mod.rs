//! Remote media host client
//!
//! Opens upload sinks against the media host's HTTP API. Each sink is backed
//! by a driver task that streams the sink's chunks as the body of a single
//! POST and reports the result through the sink's completion channel.
//!
//! # Example
//!
//! ```no_run
//! use formrelay::remote::{MediaHostClient, MediaHostConfig};
//! use formrelay::remote::sink::SinkOpener;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MediaHostConfig {
//!     endpoint: "https://media.example.com".to_string(),
//!     api_key: Some("key".to_string()),
//!     api_secret: None,
//! };
//! let client = MediaHostClient::new(config)?;
//!
//! let sink = client.open_sink("cat.png", "image/png", 4).await?;
//! sink.data.send(bytes::Bytes::from_static(b"\x89PNG")).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub mod sink;

pub use sink::{SinkOpener, SinkOutcome, UploadSink};

/// Remote client errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Remote service rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from remote service: {0}")]
    ResponseError(String),
}

/// Media host client configuration
#[derive(Debug, Clone)]
pub struct MediaHostConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// Receipt returned by the media host for a stored file
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteReceipt {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Media host client
pub struct MediaHostClient {
    config: MediaHostConfig,
    http_client: reqwest::Client,
}

impl MediaHostClient {
    /// Create a new media host client
    pub fn new(config: MediaHostConfig) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the configured endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build the upload request, minus the body.
    ///
    /// Content-Length is set explicitly from the buffered size so the server
    /// side can reject a short stream instead of storing a truncated file.
    fn build_upload_request(
        &self,
        filename: &str,
        content_type: &str,
        length: u64,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .post(self.upload_url())
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, length);

        if let Some(ref api_key) = self.config.api_key {
            request = request.header("x-api-key", api_key.as_str());

            if let Some(ref api_secret) = self.config.api_secret {
                let timestamp = chrono::Utc::now().timestamp();
                let signature = sign_upload(api_secret, timestamp, filename, length);
                request = request
                    .header("x-upload-timestamp", timestamp)
                    .header("x-upload-signature", signature);
            }
        }

        request
    }
}

#[async_trait]
impl SinkOpener for MediaHostClient {
    #[tracing::instrument(
        name = "remote.open_sink",
        skip(self),
        fields(
            upload.filename = %filename,
            upload.content_type = %content_type,
            upload.bytes = length
        )
    )]
    async fn open_sink(
        &self,
        filename: &str,
        content_type: &str,
        length: u64,
    ) -> Result<UploadSink, RemoteError> {
        let (data_tx, data_rx) = mpsc::channel::<Bytes>(sink::DATA_CHANNEL_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel::<SinkOutcome>(1);

        let request = self.build_upload_request(filename, content_type, length);

        tokio::spawn(async move {
            let outcome = drive_upload(request, data_rx).await;
            // A closed completion channel means the originating request was
            // cancelled and nobody is left to observe the outcome.
            if completion_tx.send(outcome).await.is_err() {
                tracing::debug!("Upload outcome discarded: request side went away");
            }
        });

        Ok(UploadSink {
            data: data_tx,
            completion: completion_rx,
        })
    }
}

/// Send the upload request, consuming the sink's data channel as the body.
async fn drive_upload(
    request: reqwest::RequestBuilder,
    data_rx: mpsc::Receiver<Bytes>,
) -> SinkOutcome {
    let stream = ReceiverStream::new(data_rx).map(Ok::<Bytes, std::convert::Infallible>);

    match request.body(reqwest::Body::wrap_stream(stream)).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<RemoteReceipt>().await {
                Ok(receipt) => {
                    tracing::info!(
                        remote.id = %receipt.id,
                        remote.url = %receipt.url,
                        "Remote upload completed"
                    );
                    SinkOutcome::success(receipt)
                }
                Err(e) => SinkOutcome::failure(RemoteError::ResponseError(e.to_string())),
            }
        }
        Ok(response) => {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, "Remote service rejected upload");
            SinkOutcome::failure(RemoteError::Rejected { status, message })
        }
        Err(e) => SinkOutcome::failure(RemoteError::RequestError(e.to_string())),
    }
}

/// HMAC-SHA256 signature over the request's identifying fields
fn sign_upload(secret: &str, timestamp: i64, filename: &str, length: u64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}\n{}\n{}", timestamp, filename, length).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(endpoint: &str) -> MediaHostClient {
        MediaHostClient::new(MediaHostConfig {
            endpoint: endpoint.into(),
            api_key: None,
            api_secret: None,
        })
        .unwrap()
    }

    #[test]
    fn test_upload_url_joins_path() {
        let client = test_client("https://media.example.com");
        assert_eq!(client.upload_url(), "https://media.example.com/upload");

        let client = test_client("https://media.example.com/");
        assert_eq!(client.upload_url(), "https://media.example.com/upload");
    }

    #[test]
    fn test_sign_upload_is_deterministic() {
        let a = sign_upload("secret", 1700000000, "cat.png", 1024);
        let b = sign_upload("secret", 1700000000, "cat.png", 1024);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex-encoded SHA-256 output

        let other = sign_upload("secret", 1700000000, "dog.png", 1024);
        assert_ne!(a, other);
    }

    #[test]
    fn test_receipt_deserialization() {
        let receipt: RemoteReceipt = serde_json::from_str(
            r#"{"id":"abc","url":"http://x/abc","bytes":3,"metadata":{"format":"png"}}"#,
        )
        .unwrap();
        assert_eq!(receipt.id, "abc");
        assert_eq!(receipt.url, "http://x/abc");
        assert_eq!(receipt.bytes, Some(3));
        assert_eq!(
            receipt.metadata.get("format").and_then(|v| v.as_str()),
            Some("png")
        );
    }

    #[test]
    fn test_receipt_deserialization_minimal() {
        let receipt: RemoteReceipt =
            serde_json::from_str(r#"{"id":"abc","url":"http://x/abc"}"#).unwrap();
        assert_eq!(receipt.bytes, None);
        assert!(receipt.metadata.is_empty());
    }
}
