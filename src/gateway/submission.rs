//! Rate-limited document submission.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::transport::{HttpTransport, Transport};
use crate::document::Document;
use crate::error::{GatewayError, Result};
use crate::ratelimit::PermitPool;

/// Submits documents, admitting each one through a shared permit pool.
///
/// Every call that is admitted consumes one permit and issues exactly one
/// outbound request. Permits are never refunded, including when encoding or
/// sending fails afterwards.
pub struct SubmissionGateway<T: Transport = HttpTransport> {
    /// The permit pool gating outbound requests
    pool: Arc<PermitPool>,
    /// The outbound transport
    transport: T,
}

impl<T: Transport> SubmissionGateway<T> {
    /// Create a gateway over the given pool and transport.
    pub fn new(pool: Arc<PermitPool>, transport: T) -> Self {
        Self { pool, transport }
    }

    /// The permit pool this gateway admits through.
    pub fn pool(&self) -> &Arc<PermitPool> {
        &self.pool
    }

    /// The transport requests are sent with.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit a document to the creation endpoint.
    pub async fn create_document(&self, document: &Document, signature: &str) -> Result<String> {
        self.submit(document, signature).await
    }

    /// Wait for a permit, encode `document` and send it with `signature`.
    ///
    /// Returns the raw response body. No retry is attempted on failure.
    #[instrument(skip(self, document, signature))]
    pub async fn submit<D>(&self, document: &D, signature: &str) -> Result<String>
    where
        D: Serialize + ?Sized + Sync,
    {
        ensure_signature(signature)?;

        self.pool.acquire().await;
        let body = encode(document)?;

        self.transport.send(body, signature).await
    }

    /// As [`SubmissionGateway::submit`], but gives up when `cancel` fires.
    ///
    /// Cancellation while waiting for a permit yields
    /// [`GatewayError::AcquisitionCancelled`] and consumes nothing; cancellation
    /// while the request is in flight yields [`GatewayError::Cancelled`].
    #[instrument(skip(self, document, signature, cancel))]
    pub async fn submit_cancellable<D>(
        &self,
        document: &D,
        signature: &str,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        D: Serialize + ?Sized + Sync,
    {
        ensure_signature(signature)?;

        self.pool.acquire_cancellable(cancel).await?;
        let body = encode(document)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Submission cancelled while sending");
                Err(GatewayError::Cancelled)
            }
            response = self.transport.send(body, signature) => response,
        }
    }
}

fn ensure_signature(signature: &str) -> Result<()> {
    if signature.is_empty() {
        warn!("Rejected submission with empty signature");
        return Err(GatewayError::InvalidSignature);
    }
    Ok(())
}

fn encode<D: Serialize + ?Sized>(document: &D) -> Result<Vec<u8>> {
    serde_json::to_vec(document).map_err(|e| {
        warn!(error = %e, "Failed to encode document, permit is not refunded");
        GatewayError::Encoding(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Records every request and answers with a fixed body.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Vec<u8>, String, Instant)>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl RecordingTransport {
        fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, body: Vec<u8>, signature: &str) -> Result<String> {
            self.sent
                .lock()
                .push((body, signature.to_string(), Instant::now()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            Ok("accepted".to_string())
        }
    }

    fn gateway(capacity: u32, transport: RecordingTransport) -> Arc<SubmissionGateway<RecordingTransport>> {
        let pool = Arc::new(PermitPool::new(Duration::from_secs(1), capacity).unwrap());
        Arc::new(SubmissionGateway::new(pool, transport))
    }

    fn document(id: &str) -> Document {
        Document {
            doc_id: Some(id.to_string()),
            ..Document::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_returns_raw_body() {
        let gateway = gateway(1, RecordingTransport::default());

        let response = gateway.create_document(&document("a"), "sig").await.unwrap();

        assert_eq!(response, "accepted");
        let sent = gateway.transport().sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "sig");
        let body: serde_json::Value = serde_json::from_slice(&sent[0].0).unwrap();
        assert_eq!(body["doc_id"], "a");
        drop(sent);

        assert_eq!(gateway.pool().available(), 0);
        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_submission_waits_for_next_window() {
        let gateway = gateway(2, RecordingTransport::default());
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..3 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                gateway.create_document(&document(&i.to_string()), "sig").await
            }));
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(gateway.transport().sent_count(), 2);

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "accepted");
        }

        let sent = gateway.transport().sent.lock();
        let mut offsets: Vec<Duration> = sent.iter().map(|(_, _, at)| *at - start).collect();
        offsets.sort();
        assert_eq!(offsets[0], Duration::ZERO);
        assert_eq!(offsets[1], Duration::ZERO);
        assert_eq!(offsets[2], Duration::from_secs(1));
        drop(sent);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoding_failure_consumes_permit_without_sending() {
        let gateway = gateway(2, RecordingTransport::default());

        // JSON object keys must be strings.
        let mut malformed = HashMap::new();
        malformed.insert((1u8, 2u8), "value");

        let err = gateway.submit(&malformed, "sig").await.unwrap_err();

        assert!(matches!(err, GatewayError::Encoding(_)));
        assert_eq!(gateway.transport().sent_count(), 0);
        assert_eq!(gateway.pool().available(), 1);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_not_retried() {
        let transport = RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        };
        let gateway = gateway(3, transport);

        let err = gateway.create_document(&document("a"), "sig").await.unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(gateway.transport().sent_count(), 1);
        assert_eq!(gateway.pool().available(), 2);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_signature_is_rejected_before_acquiring() {
        let gateway = gateway(1, RecordingTransport::default());

        let err = gateway.create_document(&document("a"), "").await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidSignature));
        assert_eq!(gateway.pool().available(), 1);
        assert_eq!(gateway.transport().sent_count(), 0);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_permit() {
        let gateway = gateway(1, RecordingTransport::default());
        gateway.create_document(&document("first"), "sig").await.unwrap();

        let cancel = CancellationToken::new();
        let pending = {
            let gateway = gateway.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                gateway
                    .submit_cancellable(&document("second"), "sig", &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::AcquisitionCancelled));
        assert_eq!(gateway.transport().sent_count(), 1);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_sending() {
        let transport = RecordingTransport {
            delay: Some(Duration::from_secs(30)),
            ..RecordingTransport::default()
        };
        let gateway = gateway(1, transport);

        let cancel = CancellationToken::new();
        let pending = {
            let gateway = gateway.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                gateway
                    .submit_cancellable(&document("slow"), "sig", &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gateway.transport().sent_count(), 1);
        cancel.cancel();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
        assert_eq!(gateway.pool().available(), 0);

        gateway.pool().shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_blocked_submission_waiting() {
        let gateway = gateway(1, RecordingTransport::default());
        gateway.create_document(&document("first"), "sig").await.unwrap();

        let pending = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.create_document(&document("second"), "sig").await })
        };
        tokio::task::yield_now().await;

        gateway.pool().shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!pending.is_finished());
        assert_eq!(gateway.transport().sent_count(), 1);
        pending.abort();
    }
}
