use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::ExecutorError;

/// Execute a single batch of tasks in parallel
///
/// # Arguments
///
/// * `task_ids` - Task ids of this batch, in start order
/// * `max_concurrency` - Maximum number of concurrent tasks (at least 1)
/// * `executor_fn` - Builds the future for one task; it is polled only once
///   a permit is held
///
/// # Returns
///
/// Task results in completion order
pub async fn execute_batch_parallel<R, F, Fut>(
    task_ids: &[String],
    max_concurrency: usize,
    executor_fn: F,
) -> Result<Vec<R>, ExecutorError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<R, ExecutorError>>,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for id in task_ids {
        let sem = sem.clone();
        let task = executor_fn(id.clone());

        futs.push(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|_| ExecutorError::Runner("semaphore closed unexpectedly".into()))?;

            task.await
        });
    }

    let mut results = Vec::with_capacity(task_ids.len());

    while let Some(res) = futs.next().await {
        results.push(res?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();

        let results = execute_batch_parallel(&ids, 2, |id| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ExecutorError>(id)
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_is_propagated() {
        let ids = vec!["a".to_string()];
        let err = execute_batch_parallel(&ids, 1, |id| async move {
            Err::<(), _>(ExecutorError::TaskNotFound(id))
        })
        .await
        .unwrap_err();
        assert_eq!(err, ExecutorError::TaskNotFound("a".into()));
    }
}
