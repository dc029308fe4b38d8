//! HTTP server module
//!
//! Accepts form submissions and drives the upload pipeline: ingest the file
//! field, relay it through the remote sink, finalize the response. Each
//! connection is served on its own task; requests share nothing but the
//! read-only configuration and the sink opener.
//!
//! # Endpoints
//!
//! * `GET /` - static upload form page
//! * `POST /single-file` - relay the `imageUpload` field to the media host,
//!   302 back to `/` on success
//! * `GET /health` - health check
//!
//! Every pipeline outcome, success or failure, finalizes the response
//! exactly once; a failed relay surfaces as an error status instead of a
//! hanging request.

use crate::config::Config;
use crate::metrics;
use crate::remote::{MediaHostClient, MediaHostConfig, SinkOpener};
use crate::router::{RequestParser, Route, RouterError};
use crate::upload::bridge::{self, BridgeError};
use crate::upload::ingest::{self, IngestError};
use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Failed to initialize remote client: {0}")]
    ClientError(String),
}

/// Static upload form page served at `/`
const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>formrelay</title>
</head>
<body>
  <h1>Upload a file</h1>
  <form action="/single-file" method="post" enctype="multipart/form-data">
    <input type="file" name="imageUpload" required>
    <button type="submit">Upload</button>
  </form>
</body>
</html>
"#;

/// HTTP Server for Formrelay
///
/// # Fields
///
/// * `config` - Server configuration (shared across connections)
/// * `opener` - Sink opener uploads are relayed through
/// * `listener` - TCP listener for accepting connections
/// * `local_addr` - The actual address the server is bound to
pub struct Server {
    config: Arc<Config>,
    opener: Arc<dyn SinkOpener>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Create a server with a media host client built from the configuration.
    ///
    /// Binds immediately; with port 0 the OS assigns an available port.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let client = MediaHostClient::new(MediaHostConfig {
            endpoint: config.remote.endpoint.clone(),
            api_key: config.remote.api_key.clone(),
            api_secret: config.remote.api_secret.clone(),
        })
        .map_err(|e| ServerError::ClientError(e.to_string()))?;

        Self::bind_with_opener(config, Arc::new(client)).await
    }

    /// Create a server with an externally supplied sink opener.
    ///
    /// The integration tests use this to script remote outcomes without a
    /// live media host.
    pub async fn bind_with_opener(
        config: Config,
        opener: Arc<dyn SinkOpener>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            config: Arc::new(config),
            opener,
            listener,
            local_addr,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the server
    ///
    /// Accepts incoming connections and spawns a task to handle each one.
    /// Connection errors are logged but don't stop the server; this method
    /// only returns on a fatal accept error.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Listening on {}", self.local_addr);

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let config = Arc::clone(&self.config);
            let opener = Arc::clone(&self.opener);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let config = Arc::clone(&config);
                    let opener = Arc::clone(&opener);
                    async move { handle_request(req, config, opener).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Handle HTTP request
async fn handle_request(
    req: Request<Incoming>,
    config: Arc<Config>,
    opener: Arc<dyn SinkOpener>,
) -> Result<Response<String>, hyper::Error> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let route = match RequestParser::parse(&method, &path) {
        Ok(route) => route,
        Err(RouterError::NotFound(_)) => {
            return Ok(error_response(StatusCode::NOT_FOUND, "Not Found".to_string()));
        }
        Err(RouterError::MethodNotAllowed(_)) => {
            return Ok(error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed".to_string(),
            ));
        }
    };

    match route {
        Route::FormPage => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(UPLOAD_FORM.to_string())
            .expect("Failed to build form page response")),
        Route::Health => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body("ok".to_string())
            .expect("Failed to build health check response")),
        Route::SingleFile => Ok(handle_single_file(req, config, opener).await),
    }
}

/// Drive one submission through the pipeline and finalize the response.
///
/// Linear flow: ingest, open sink, relay, finalize. Both branches of the
/// awaited relay outcome are matched here, so no failure goes unobserved
/// and the response is finalized on exactly one path.
async fn handle_single_file(
    req: Request<Incoming>,
    config: Arc<Config>,
    opener: Arc<dyn SinkOpener>,
) -> Response<String> {
    let request_id = uuid::Uuid::new_v4();
    let start_time = Instant::now();

    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let file = match ingest::ingest(
        req.into_body().into_data_stream(),
        content_type.as_deref(),
        config.upload.max_file_size,
    )
    .await
    {
        Ok(file) => file,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Submission rejected at ingest");
            metrics::record_ingest_rejected(ingest_reason(&e));
            return error_response(ingest_status(&e), format!("Upload rejected: {}", e));
        }
    };

    info!(
        request_id = %request_id,
        filename = %file.filename,
        content_type = %file.content_type,
        bytes = file.len(),
        "File ingested"
    );

    let sink = match opener
        .open_sink(&file.filename, &file.content_type, file.len())
        .await
    {
        Ok(sink) => sink,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to open remote sink");
            metrics::record_upload_failure();
            metrics::record_error("sink_open");
            return error_response(StatusCode::BAD_GATEWAY, format!("Upload failed: {}", e));
        }
    };

    let outcome = bridge::relay(&file, sink).await;
    metrics::record_upload_duration(start_time.elapsed().as_secs_f64());

    match outcome {
        Ok(receipt) => {
            metrics::record_upload_success(file.len());
            info!(
                request_id = %request_id,
                remote_id = %receipt.id,
                remote_url = %receipt.url,
                duration_ms = start_time.elapsed().as_millis(),
                "Upload relayed"
            );
            redirect_response("/")
        }
        Err(e) => {
            metrics::record_upload_failure();
            metrics::record_error(bridge_reason(&e));
            error!(
                request_id = %request_id,
                error = %e,
                duration_ms = start_time.elapsed().as_millis(),
                "Upload relay failed"
            );
            error_response(StatusCode::BAD_GATEWAY, format!("Upload failed: {}", e))
        }
    }
}

fn ingest_status(err: &IngestError) -> StatusCode {
    match err {
        IngestError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn ingest_reason(err: &IngestError) -> &'static str {
    match err {
        IngestError::NotMultipart => "not_multipart",
        IngestError::MissingFile => "missing_file",
        IngestError::TooLarge { .. } => "too_large",
        IngestError::Malformed(_) => "malformed",
    }
}

fn bridge_reason(err: &BridgeError) -> &'static str {
    match err {
        BridgeError::Transport(_) => "remote_transport",
        BridgeError::EmptyOutcome => "empty_outcome",
    }
}

fn redirect_response(location: &str) -> Response<String> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(String::new())
        .expect("Failed to build redirect response")
}

fn error_response(status: StatusCode, message: String) -> Response<String> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(message)
        .expect("Failed to build error response")
}
