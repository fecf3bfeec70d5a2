//! Calling out to external collaborators with a deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::{LarderError, Result};

/// Deadline applied to collaborator calls unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Await `call`, turning both its failure and a timeout into
/// [`LarderError::ExternalService`] for `service`.
pub async fn call_with_timeout<T, F>(service: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!(service, error = %format!("{e:#}"), "external call failed");
            Err(LarderError::ExternalService {
                service: service.to_owned(),
                message: format!("{e:#}"),
            })
        }
        Err(_) => {
            tracing::warn!(
                service,
                timeout_ms = timeout.as_millis() as u64,
                "external call timed out"
            );
            Err(LarderError::ExternalService {
                service: service.to_owned(),
                message: format!("no response within {}s", timeout.as_secs_f64()),
            })
        }
    }
}
