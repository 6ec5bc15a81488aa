//! Retrying transport call.
//!
//! One logical request becomes up to `1 + max_retries` transport attempts.
//! An attempt is retried when it fails with a retryable error or completes
//! with a 5xx status, as long as budget remains. The last attempt's outcome
//! is returned as-is: a final 5xx is a response, not an error.
//!
//! Every attempt runs under its own child of the call's cancellation token.
//! A per-attempt timeout cancels that child and counts as a retryable
//! failure. With [`Read::Body`] the timeout covers the body as well as the
//! headers. Cancelling the call token aborts the attempt in flight or the
//! backoff sleep between attempts, and is never retried.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ClientError;
use crate::config::RetryPolicy;
use crate::request::PreparedRequest;
use crate::transport::{Transport, TransportBody, TransportResponse};

/// How much of the response an attempt waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Read {
    /// Resolve at the headers and hand back the live body.
    Headers,
    /// Buffer the whole body inside the attempt.
    Body,
}

/// Send `request`, retrying per `policy`.
pub(crate) async fn send_with_retry(
    transport: &dyn Transport,
    request: &PreparedRequest,
    policy: &RetryPolicy,
    timeout: Option<Duration>,
    read: Read,
    cancel: &CancellationToken,
) -> Result<TransportResponse, ClientError> {
    let mut backoff = policy.backoff();

    loop {
        let outcome = send_once(transport, request, timeout, read, cancel).await;

        let retry_reason = match &outcome {
            Ok(response) if response.status.is_server_error() => {
                Some(format!("status {}", response.status))
            }
            Err(err) if err.is_retryable() => Some(err.to_string()),
            _ => None,
        };
        let reason = match retry_reason {
            Some(reason) if backoff.can_retry() => reason,
            _ => return outcome,
        };
        // Release the failed attempt's connection before sleeping.
        drop(outcome);

        let delay = backoff.next_delay();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            reason = %reason,
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "retrying after transient failure"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = reason;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Aborted),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn send_once(
    transport: &dyn Transport,
    request: &PreparedRequest,
    timeout: Option<Duration>,
    read: Read,
    cancel: &CancellationToken,
) -> Result<TransportResponse, ClientError> {
    if cancel.is_cancelled() {
        return Err(ClientError::Aborted);
    }

    let attempt = cancel.child_token();
    let exchange = transport.send(request.attempt(attempt.clone()));
    let send = async move {
        let response = exchange.await?;
        match read {
            Read::Headers => Ok::<_, ClientError>(response),
            Read::Body => {
                let bytes = response.body.collect().await?;
                Ok(TransportResponse {
                    body: TransportBody::full(bytes),
                    ..response
                })
            }
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Aborted),
        result = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .unwrap_or(Err(ClientError::Timeout(limit))),
                None => send.await,
            }
        } => result,
    };

    if result.is_err() {
        attempt.cancel();
    }
    result
}
