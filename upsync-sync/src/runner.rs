//! Concurrency-limited task runner.
//!
//! A sliding window over an ordered task list: at most `limit` futures are
//! outstanding, and every completion admits the next queued task. Results
//! come back in submission order whatever the completion order.
//!
//! The first error stops admission. Futures already in flight are still
//! driven to completion (there is no cancellation), then that first error is
//! returned. Work done by finished tasks is never rolled back.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::{stream::FuturesUnordered, StreamExt};

/// Run `f` over every task with at most `limit` futures outstanding.
///
/// `f` is only called when a task is admitted, so a task that is never
/// admitted is never started.
pub async fn run_limited<T, R, E, F, Fut>(
    tasks: Vec<T>,
    limit: NonZeroUsize,
    mut f: F,
) -> Result<Vec<R>, E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = tasks.len();
    let mut queue = tasks.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();
    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut first_error: Option<E> = None;

    for (index, task) in queue.by_ref().take(limit.get()) {
        in_flight.push(tagged(index, f(task)));
    }

    while let Some((index, outcome)) = in_flight.next().await {
        match outcome {
            Ok(value) => results[index] = Some(value),
            Err(err) => {
                if first_error.is_none() {
                    tracing::debug!(task = index, "task failed; no further tasks admitted");
                    first_error = Some(err);
                }
            }
        }

        if first_error.is_none() {
            if let Some((next, task)) = queue.next() {
                in_flight.push(tagged(next, f(task)));
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(results.into_iter().flatten().collect()),
    }
}

async fn tagged<Fut: Future>(index: usize, fut: Fut) -> (usize, Fut::Output) {
    (index, fut.await)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    /// Start/finish bookkeeping shared by instrumented tasks.
    #[derive(Default)]
    struct Gauge {
        running: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
        started: Mutex<Vec<usize>>,
    }

    impl Gauge {
        fn enter(&self, id: usize) {
            self.started.lock().unwrap().push(id);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn started(&self) -> Vec<usize> {
            self.started.lock().unwrap().clone()
        }
    }

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Sleeps `delay_ms`, then succeeds with `id * 10` or fails.
    async fn instrumented(
        gauge: Arc<Gauge>,
        id: usize,
        delay_ms: u64,
        fail: bool,
    ) -> Result<usize, String> {
        gauge.enter(id);
        sleep(Duration::from_millis(delay_ms)).await;
        gauge.leave();
        if fail {
            Err(format!("task {id} failed"))
        } else {
            Ok(id * 10)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_submission_order() {
        let gauge = Arc::new(Gauge::default());
        let delays = [40, 10, 30, 20];
        let out = run_limited((0..4).collect(), limit(4), |id: usize| {
            instrumented(gauge.clone(), id, delays[id], false)
        })
        .await
        .expect("all succeed");
        assert_eq!(out, vec![0, 10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn never_more_than_limit_in_flight() {
        let gauge = Arc::new(Gauge::default());
        let out = run_limited((0..12).collect(), limit(3), |id: usize| {
            instrumented(gauge.clone(), id, 5 + (id as u64 % 4) * 7, false)
        })
        .await
        .expect("all succeed");

        assert_eq!(out.len(), 12);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_instead_of_batching() {
        // Task 0 is slow. With fixed batches of 2, task 2 would wait for it;
        // with a sliding window it starts as soon as task 1 is done.
        let gauge = Arc::new(Gauge::default());
        let delays = [100, 10, 10, 10];
        let started_at = tokio::time::Instant::now();
        run_limited((0..4).collect(), limit(2), |id: usize| {
            instrumented(gauge.clone(), id, delays[id], false)
        })
        .await
        .expect("all succeed");
        assert!(started_at.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn limit_of_one_is_sequential() {
        let gauge = Arc::new(Gauge::default());
        run_limited((0..5).collect(), limit(1), |id: usize| {
            instrumented(gauge.clone(), id, 5, false)
        })
        .await
        .expect("all succeed");
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
        assert_eq!(gauge.started(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_above_task_count_fans_out() {
        let gauge = Arc::new(Gauge::default());
        run_limited((0..4).collect(), limit(64), |id: usize| {
            instrumented(gauge.clone(), id, 5, false)
        })
        .await
        .expect("all succeed");
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_admission_but_drains_in_flight() {
        let gauge = Arc::new(Gauge::default());
        let delays = [50, 10, 10, 10, 10, 10];
        let err = run_limited((0..6).collect(), limit(2), |id: usize| {
            instrumented(gauge.clone(), id, delays[id], id == 1)
        })
        .await
        .unwrap_err();

        assert_eq!(err, "task 1 failed");
        // Only the first window was ever admitted.
        let mut started = gauge.started();
        started.sort_unstable();
        assert_eq!(started, vec![0, 1]);
        // Task 0 was in flight when task 1 failed and still ran to the end.
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn first_observed_failure_wins() {
        let gauge = Arc::new(Gauge::default());
        let delays = [30, 10, 20];
        let err = run_limited((0..3).collect(), limit(3), |id: usize| {
            instrumented(gauge.clone(), id, delays[id], id != 0)
        })
        .await
        .unwrap_err();
        assert_eq!(err, "task 1 failed");
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_task_list_succeeds() {
        let out: Vec<()> = run_limited(Vec::<()>::new(), limit(3), |_| async {
            Ok::<(), String>(())
        })
        .await
        .expect("empty");
        assert!(out.is_empty());
    }
}
