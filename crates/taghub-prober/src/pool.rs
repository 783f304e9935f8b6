//! Bounded probe pool shared by the article and author runs.
//!
//! At most `pool_size` probes are in flight. Up to `queue_capacity` more
//! wait for a worker; anything beyond that is not probed and completes as
//! `Failure(Rejected)`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::ProbeError;
use crate::probe::Probe;
use crate::prober::ProberConfig;
use crate::state::{FailureReason, ProbeOutcome, ProbeState};

/// Completed targets of one pool run.
pub(crate) struct PoolRun<T> {
    /// Every target whose task finished, in `Completed` state
    pub completed: Vec<(T, ProbeState)>,
    /// Tasks that panicked; their targets are lost
    pub lost: usize,
}

/// Probe every `(target, url)` pair. Must be called inside a Tokio runtime.
pub(crate) async fn probe_all<T>(
    probe: &Arc<dyn Probe>,
    config: &ProberConfig,
    targets: Vec<(T, String)>,
) -> Result<PoolRun<T>, ProbeError>
where
    T: Send + 'static,
{
    let workers = Arc::new(Semaphore::new(config.pool_size));
    let admission = Arc::new(Semaphore::new(config.pool_size + config.queue_capacity));
    let mut tasks = JoinSet::new();
    let mut run = PoolRun {
        completed: Vec::with_capacity(targets.len()),
        lost: 0,
    };

    for (target, url) in targets {
        let Ok(slot) = admission.clone().try_acquire_owned() else {
            warn!(url = %url, "Probe pool full, failing fast");
            let state =
                ProbeState::Pending.complete(ProbeOutcome::Failure(FailureReason::Rejected))?;
            run.completed.push((target, state));
            continue;
        };

        let workers = workers.clone();
        let probe = probe.clone();
        let timeout = config.timeout;
        tasks.spawn(async move {
            let _slot = slot;
            // Closed only if the semaphore is dropped, which cannot happen here
            let _worker = workers.acquire_owned().await.ok();
            let outcome = probe_once(probe.as_ref(), &url, timeout).await;
            (target, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((target, outcome)) => {
                let state = ProbeState::Pending.start()?.complete(outcome)?;
                run.completed.push((target, state));
            }
            Err(e) => {
                error!(error = %e, "Probe task failed");
                run.lost += 1;
            }
        }
    }
    Ok(run)
}

async fn probe_once(probe: &dyn Probe, url: &str, timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(timeout, probe.status_of(url)).await {
        Ok(Ok(status)) => ProbeOutcome::from_status(status),
        Ok(Err(message)) => ProbeOutcome::Failure(FailureReason::Error(message)),
        Err(_) => ProbeOutcome::Failure(FailureReason::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowOk;

    #[async_trait]
    impl Probe for SlowOk {
        async fn status_of(&self, url: &str) -> Result<u16, String> {
            if url.ends_with("/hang") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(200)
        }
    }

    fn config(pool_size: usize, queue_capacity: usize) -> ProberConfig {
        ProberConfig {
            pool_size,
            queue_capacity,
            timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_every_target_completes() {
        let probe: Arc<dyn Probe> = Arc::new(SlowOk);
        let targets = (0..6)
            .map(|i| (i, format!("http://h.example.com/{}", i)))
            .chain([(6, "http://h.example.com/hang".to_string())])
            .collect();

        let run = probe_all(&probe, &config(2, 2), targets).await.unwrap();
        assert_eq!(run.lost, 0);
        assert_eq!(run.completed.len(), 7);

        let rejected = run
            .completed
            .iter()
            .filter(|(_, s)| s.outcome() == Some(&ProbeOutcome::Failure(FailureReason::Rejected)))
            .count();
        assert_eq!(rejected, 3);
        assert!(run
            .completed
            .iter()
            .all(|(_, s)| matches!(s, ProbeState::Completed(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let probe: Arc<dyn Probe> = Arc::new(SlowOk);
        let targets = vec![("slow", "http://h.example.com/hang".to_string())];

        let run = probe_all(&probe, &config(1, 0), targets).await.unwrap();
        assert_eq!(
            run.completed[0].1.outcome(),
            Some(&ProbeOutcome::Failure(FailureReason::Timeout))
        );
    }
}
