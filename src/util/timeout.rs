//! Timeout and cancellation guards for the driver's suspension points.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PalaverError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, PalaverError>>,
) -> Result<T, PalaverError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(PalaverError::Timeout(duration.as_millis() as u64)),
    }
}

/// Race a future against cancellation and an optional timeout.
///
/// Cancellation wins ties so a cancelled run never reports a timeout.
pub async fn guarded<T>(
    cancel: &CancellationToken,
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T, PalaverError>>,
) -> Result<T, PalaverError> {
    let work = async {
        match timeout {
            Some(duration) => with_timeout(duration, future).await,
            None => future.await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PalaverError::Cancelled),
        result = work => result,
    }
}
