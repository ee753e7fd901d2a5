//! Timeout enforcement.
//!
//! Every network operation (probe, forwarded request) runs under its own
//! deadline; exceeding it is a failure, never left pending.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `fut` with a hard deadline.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| Elapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pending_work_times_out() {
        let result = with_timeout(Duration::from_millis(50), std::future::pending::<()>()).await;
        assert_eq!(result, Err(Elapsed(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn finished_work_passes_through() {
        assert_eq!(with_timeout(Duration::from_secs(1), async { 7 }).await, Ok(7));
    }
}
