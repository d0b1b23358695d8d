use std::future::Future;
use std::time::Duration;

use crate::domain::errors::DomainError;

/// Run an I/O step under `limit`; elapsing yields [`DomainError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    limit: Duration,
    operation: &str,
    step: F,
) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => Err(DomainError::Timeout(format!(
            "{} timed out after {} ms",
            operation,
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_step_times_out() {
        let result: Result<(), DomainError> = with_deadline(
            Duration::from_millis(10),
            "sleep",
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(DomainError::Timeout(message)) if message.starts_with("sleep")));
    }

    #[tokio::test]
    async fn fast_step_passes_through() {
        let result = with_deadline(Duration::from_secs(1), "echo", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
