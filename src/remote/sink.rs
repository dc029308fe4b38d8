//! Upload sink shape
//!
//! A sink is the writable end of one remote upload attempt: a bounded data
//! channel the bridge feeds chunks into, and a completion channel on which
//! the transport delivers its single outcome signal once the stream ends.

use super::{RemoteError, RemoteReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Capacity of a sink's data channel, in chunks. A full channel suspends the
/// feeding side until the transport drains it.
pub const DATA_CHANNEL_CAPACITY: usize = 16;

/// Completion signal delivered by the transport when the byte stream ends.
///
/// Models the callback pair `(error, result-or-null)`: either field may be
/// absent, including both at once. Interpreting the combinations is the
/// bridge's job, not the transport's.
#[derive(Debug)]
pub struct SinkOutcome {
    pub error: Option<RemoteError>,
    pub receipt: Option<RemoteReceipt>,
}

impl SinkOutcome {
    /// A successful completion carrying the remote receipt
    pub fn success(receipt: RemoteReceipt) -> Self {
        Self {
            error: None,
            receipt: Some(receipt),
        }
    }

    /// A failed completion carrying the transport error
    pub fn failure(error: RemoteError) -> Self {
        Self {
            error: Some(error),
            receipt: None,
        }
    }

    /// The degenerate completion with neither receipt nor error
    pub fn empty() -> Self {
        Self {
            error: None,
            receipt: None,
        }
    }
}

/// An open upload sink
///
/// Dropping `data` without sending anything further marks end-of-stream.
/// The completion channel has capacity 1; a well-behaved transport sends
/// exactly one signal, and only the first one is ever observed.
pub struct UploadSink {
    pub data: mpsc::Sender<Bytes>,
    pub completion: mpsc::Receiver<SinkOutcome>,
}

/// Factory for upload sinks, one per file
#[async_trait]
pub trait SinkOpener: Send + Sync {
    /// Open a sink for a single upload attempt
    async fn open_sink(
        &self,
        filename: &str,
        content_type: &str,
        length: u64,
    ) -> Result<UploadSink, RemoteError>;
}
