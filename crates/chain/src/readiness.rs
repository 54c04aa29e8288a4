//! Combining per-shard ready futures.

use futures::future::{try_join_all, BoxFuture, FutureExt, Shared};
use std::fmt;
use txchain_core::{ReadinessError, ReadyFuture};

/// All of one transaction's per-shard ready futures, folded into one.
///
/// Completes `Ok` once every shard has staged the transaction. Completes with
/// the first failure as soon as any shard fails, without waiting for the
/// remaining shards.
///
/// Cloning is cheap and every clone observes the same outcome, so the chain
/// can hand one copy to its reset continuation and others to any number of
/// waiting routing requests. The underlying futures are driven by whichever
/// clone is polled.
#[derive(Clone)]
pub struct CombinedReadiness {
    inner: Shared<BoxFuture<'static, Result<(), ReadinessError>>>,
    shard_count: usize,
}

impl CombinedReadiness {
    /// Combine per-shard ready futures.
    ///
    /// An empty set completes immediately. The chain never builds one: a
    /// transaction that touched no shard goes straight back to idle.
    pub fn combine(futures: Vec<ReadyFuture>) -> Self {
        let shard_count = futures.len();
        let inner = async move { try_join_all(futures).await.map(|_| ()) }
            .boxed()
            .shared();

        Self { inner, shard_count }
    }

    /// Number of shard futures this was built from.
    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Outcome, if some clone has already driven this to completion.
    pub fn peek(&self) -> Option<&Result<(), ReadinessError>> {
        self.inner.peek()
    }

    /// Whether the combined outcome is known.
    pub fn is_complete(&self) -> bool {
        self.peek().is_some()
    }

    /// Wait for every shard to finish staging.
    pub async fn wait(self) -> Result<(), ReadinessError> {
        self.inner.await
    }
}

impl fmt::Debug for CombinedReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.peek() {
            None => "pending",
            Some(Ok(())) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("CombinedReadiness")
            .field("shard_count", &self.shard_count)
            .field("outcome", &outcome)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txchain_test_helpers::{ready_failed, ready_ok, ReadyTrigger};
    use txchain_types::ShardName;

    #[tokio::test]
    async fn test_empty_combination_is_ready() {
        let combined = CombinedReadiness::combine(Vec::new());
        assert_eq!(combined.shard_count(), 0);
        assert_eq!(combined.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_all_shards_succeed() {
        let (alpha, alpha_ready) = ReadyTrigger::pending("alpha");
        let (beta, beta_ready) = ReadyTrigger::pending("beta");
        let combined = CombinedReadiness::combine(vec![alpha_ready, beta_ready, ready_ok()]);
        assert_eq!(combined.shard_count(), 3);

        let waiter = tokio::spawn(combined.clone().wait());
        alpha.succeed();
        tokio::task::yield_now().await;
        assert!(!combined.is_complete());

        beta.succeed();
        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert_eq!(combined.peek(), Some(&Ok(())));
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let (_slow, slow_ready) = ReadyTrigger::pending("slow");
        let (fast, fast_ready) = ReadyTrigger::pending("fast");
        let combined = CombinedReadiness::combine(vec![slow_ready, fast_ready]);

        fast.fail("disk full");

        // The slow shard never answers, yet the failure is reported.
        let outcome = combined.wait().await;
        assert_eq!(
            outcome,
            Err(ReadinessError::Rejected {
                shard: ShardName::new("fast"),
                reason: "disk full".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_every_clone_sees_the_failure() {
        let combined = CombinedReadiness::combine(vec![ready_ok(), ready_failed("beta", "boom")]);

        let first = combined.clone().wait().await;
        let second = combined.wait().await;
        assert_eq!(first, second);
        assert!(first.is_err());
    }

    #[tokio::test]
    async fn test_dropped_trigger_is_abandoned() {
        let (trigger, ready) = ReadyTrigger::pending("gamma");
        drop(trigger);

        let outcome = CombinedReadiness::combine(vec![ready]).wait().await;
        assert_eq!(
            outcome,
            Err(ReadinessError::Abandoned {
                shard: ShardName::new("gamma"),
            })
        );
    }
}
