//! Per-attempt deadline enforcement
//!
//! Races a pending provider call against a timer. Exactly one of the two is
//! observed: when the timer wins the operation future is dropped, so a late
//! reply can never be written into an outcome that was already returned.
//! Dropping stops the wait only; the remote side may keep generating.

use std::future::Future;
use std::time::Duration;

/// Default per-candidate deadline in milliseconds
///
/// Bounds user-perceived latency when several candidates have to be tried in
/// sequence (three stalled candidates cost at most ~24s).
pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 8_000;

/// Outcome of an operation run under a deadline
#[derive(Debug, thiserror::Error)]
pub enum DeadlineError<E> {
    /// Timer fired before the operation completed
    #[error("{label} did not respond in time")]
    Elapsed { label: String, deadline: Duration },

    /// Operation completed first with its own failure
    #[error("{0}")]
    Failed(E),
}

impl<E> DeadlineError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, Self::Elapsed { .. })
    }
}

/// Run `operation` with a hard deadline
///
/// If the operation finishes first its result (success or failure) is passed
/// through unchanged and the timer is cancelled. If the deadline passes first
/// the result is `DeadlineError::Elapsed` with a message naming `label`.
pub async fn with_deadline<F, T, E>(
    operation: F,
    label: &str,
    deadline: Duration,
) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result.map_err(DeadlineError::Failed),
        Err(_elapsed) => {
            tracing::warn!(
                label = %label,
                deadline_ms = deadline.as_millis() as u64,
                "Operation exceeded deadline, abandoning wait"
            );
            Err(DeadlineError::Elapsed {
                label: label.to_string(),
                deadline,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_passes_through() {
        let result: Result<u32, DeadlineError<String>> =
            with_deadline(async { Ok(7) }, "fast", Duration::from_millis(100)).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_failure_passes_through_unchanged() {
        let result: Result<u32, DeadlineError<String>> = with_deadline(
            async { Err("boom".to_string()) },
            "failing",
            Duration::from_millis(100),
        )
        .await;

        match result {
            Err(DeadlineError::Failed(e)) => assert_eq!(e, "boom"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_times_out_with_label() {
        let result: Result<u32, DeadlineError<String>> = with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            },
            "GPT-4.1",
            Duration::from_millis(8_000),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_elapsed());
        assert_eq!(err.to_string(), "GPT-4.1 did not respond in time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_operation_never_completes_after_timeout() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result: Result<(), DeadlineError<String>> = with_deadline(
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
            "slow",
            Duration::from_secs(1),
        )
        .await;
        assert!(result.unwrap_err().is_elapsed());

        // The future was dropped; advancing past its sleep must not run it
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_timeout_is_several_seconds() {
        assert_eq!(DEFAULT_MODEL_TIMEOUT_MS, 8_000);
    }
}
