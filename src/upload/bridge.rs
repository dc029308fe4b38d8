//! Stream bridge
//!
//! The core of the relay: expose the buffered file as a chunked byte stream,
//! feed it into an upload sink, and settle exactly once with the sink's
//! outcome.
//!
//! A transport can misbehave in two ways the bridge has to absorb: its
//! completion channel can close without ever delivering a signal, and it can
//! deliver more than one. The first case becomes an explicit empty-outcome
//! failure instead of a hang; the second is resolved by taking only the
//! first signal.

use super::UploadedFile;
use crate::remote::sink::{SinkOutcome, UploadSink};
use crate::remote::{RemoteError, RemoteReceipt};
use thiserror::Error;

/// Size of the slices fed into the sink's data channel
pub const CHUNK_SIZE: usize = 65536;

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Upload transport failed: {0}")]
    Transport(#[source] RemoteError),

    #[error("Remote sink completed with neither result nor error")]
    EmptyOutcome,
}

/// Relay a buffered file through an upload sink.
///
/// The buffer is sliced into [`CHUNK_SIZE`] chunks (cheap `Bytes` views, no
/// copying) and sent through the sink's bounded data channel; a slow sink
/// keeps the send suspended until it has drained earlier chunks. Once the
/// stream ends, the first completion signal decides the outcome:
///
/// - a receipt resolves the relay, even if an error was delivered alongside;
/// - an error without a receipt fails it;
/// - a signal carrying neither, or a completion channel that closes without
///   any signal, fails it with [`BridgeError::EmptyOutcome`].
///
/// One attempt per call; retry policy belongs to the transport, not here.
pub async fn relay(file: &UploadedFile, sink: UploadSink) -> Result<RemoteReceipt, BridgeError> {
    let UploadSink {
        data,
        mut completion,
    } = sink;

    let mut offset = 0;
    while offset < file.buffer.len() {
        let end = usize::min(offset + CHUNK_SIZE, file.buffer.len());
        if data.send(file.buffer.slice(offset..end)).await.is_err() {
            // The sink hung up mid-stream. Not terminal by itself; the
            // completion signal carries the actual outcome.
            tracing::debug!(offset, "Sink closed its data channel early");
            break;
        }
        offset = end;
    }
    // End of stream
    drop(data);

    // First signal wins; the receiver is consumed after one recv, so later
    // signals are never observed.
    match completion.recv().await {
        Some(SinkOutcome {
            receipt: Some(receipt),
            ..
        }) => Ok(receipt),
        Some(SinkOutcome {
            error: Some(error), ..
        }) => Err(BridgeError::Transport(error)),
        Some(SinkOutcome { .. }) => Err(BridgeError::EmptyOutcome),
        None => Err(BridgeError::EmptyOutcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    fn test_file(data: &[u8]) -> UploadedFile {
        UploadedFile {
            buffer: Bytes::copy_from_slice(data),
            filename: "test.bin".into(),
            content_type: "application/octet-stream".into(),
        }
    }

    fn receipt(id: &str) -> RemoteReceipt {
        RemoteReceipt {
            id: id.into(),
            url: format!("http://x/{}", id),
            bytes: None,
            metadata: Default::default(),
        }
    }

    /// A sink that drains the data channel, then emits the scripted
    /// outcomes in order. Returns the collected bytes on join.
    fn scripted_sink(outcomes: Vec<SinkOutcome>) -> (UploadSink, JoinHandle<Vec<u8>>) {
        let (data_tx, mut data_rx) = mpsc::channel::<Bytes>(4);
        let (completion_tx, completion_rx) = mpsc::channel::<SinkOutcome>(1);

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(chunk) = data_rx.recv().await {
                received.extend_from_slice(&chunk);
            }
            for outcome in outcomes {
                // The bridge drops its receiver after the first signal; a
                // misbehaving transport's extra signals just fail to send.
                if completion_tx.send(outcome).await.is_err() {
                    break;
                }
            }
            received
        });

        (
            UploadSink {
                data: data_tx,
                completion: completion_rx,
            },
            handle,
        )
    }

    #[tokio::test]
    async fn test_relay_success() {
        let file = test_file(b"hello sink");
        let (sink, handle) = scripted_sink(vec![SinkOutcome::success(receipt("abc"))]);

        let result = relay(&file, sink).await;
        let got = assert_ok!(result);
        assert_eq!(got.id, "abc");

        let received = handle.await.unwrap();
        assert_eq!(received, b"hello sink");
    }

    #[tokio::test]
    async fn test_relay_transport_error() {
        let file = test_file(b"doomed");
        let (sink, _handle) = scripted_sink(vec![SinkOutcome::failure(
            RemoteError::RequestError("connection reset".into()),
        )]);

        let result = relay(&file, sink).await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_relay_empty_outcome() {
        let file = test_file(b"nothing comes back");
        let (sink, _handle) = scripted_sink(vec![SinkOutcome::empty()]);

        let result = relay(&file, sink).await;
        assert!(matches!(result, Err(BridgeError::EmptyOutcome)));
    }

    #[tokio::test]
    async fn test_relay_settles_when_sink_never_signals() {
        let file = test_file(b"silence");
        // No scripted outcomes: the completion sender drops after draining.
        let (sink, _handle) = scripted_sink(vec![]);

        let result = tokio::time::timeout(Duration::from_secs(5), relay(&file, sink))
            .await
            .expect("relay must settle, not hang");
        assert!(matches!(result, Err(BridgeError::EmptyOutcome)));
    }

    #[tokio::test]
    async fn test_relay_first_signal_wins() {
        let file = test_file(b"double signal");
        let (sink, _handle) = scripted_sink(vec![
            SinkOutcome::success(receipt("first")),
            SinkOutcome::failure(RemoteError::RequestError("late failure".into())),
        ]);

        let result = relay(&file, sink).await;
        let got = assert_ok!(result);
        assert_eq!(got.id, "first");
    }

    #[tokio::test]
    async fn test_relay_receipt_wins_over_error_in_same_signal() {
        let file = test_file(b"both fields set");
        let (sink, _handle) = scripted_sink(vec![SinkOutcome {
            error: Some(RemoteError::RequestError("spurious".into())),
            receipt: Some(receipt("kept")),
        }]);

        let got = assert_ok!(relay(&file, sink).await);
        assert_eq!(got.id, "kept");
    }

    #[tokio::test]
    async fn test_relay_empty_file() {
        let file = test_file(b"");
        let (sink, handle) = scripted_sink(vec![SinkOutcome::success(receipt("empty"))]);

        let got = assert_ok!(relay(&file, sink).await);
        assert_eq!(got.id, "empty");
        assert!(handle.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relay_chunks_large_buffer_intact() {
        // Several multiples of CHUNK_SIZE plus a ragged tail
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let file = test_file(&data);
        let (sink, handle) = scripted_sink(vec![SinkOutcome::success(receipt("big"))]);

        assert_ok!(relay(&file, sink).await);

        let received = handle.await.unwrap();
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_relay_survives_sink_closing_data_channel_early() {
        let file = test_file(&[7u8; CHUNK_SIZE * 2]);

        // Sink that refuses the stream outright, then reports a failure.
        let (data_tx, data_rx) = mpsc::channel::<Bytes>(1);
        let (completion_tx, completion_rx) = mpsc::channel::<SinkOutcome>(1);
        drop(data_rx);
        completion_tx
            .send(SinkOutcome::failure(RemoteError::Rejected {
                status: 507,
                message: "out of space".into(),
            }))
            .await
            .unwrap();

        let sink = UploadSink {
            data: data_tx,
            completion: completion_rx,
        };

        let result = tokio::time::timeout(Duration::from_secs(5), relay(&file, sink))
            .await
            .expect("relay must settle, not hang");
        let err = assert_err!(result);
        assert!(matches!(err, BridgeError::Transport(RemoteError::Rejected { status: 507, .. })));
    }
}
