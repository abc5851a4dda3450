use seatwatch::core::jobs::job_fn;
use seatwatch::{AppError, Job};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Payload fixtures for exercising the queue
pub struct TestJobs;

impl TestJobs {
    /// Sleeps for `delay`, then returns `value`.
    pub fn sleeping(delay: Duration, value: Value) -> Arc<dyn Job> {
        job_fn("sleeping", move |_ctx| {
            let value = value.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        })
    }

    /// Like `sleeping`, but counts how many times it actually ran.
    pub fn counting(runs: Arc<AtomicUsize>, delay: Duration, value: Value) -> Arc<dyn Job> {
        job_fn("counting", move |_ctx| {
            let runs = Arc::clone(&runs);
            let value = value.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        })
    }

    /// Tracks the highest number of simultaneous executions.
    pub fn concurrency_probe(
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        delay: Duration,
    ) -> Arc<dyn Job> {
        job_fn("probe", move |_ctx| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now_running, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(json!({ "ok": true }))
            }
        })
    }

    /// Records the instant each execution began.
    pub fn start_recorder(starts: Arc<Mutex<Vec<Instant>>>) -> Arc<dyn Job> {
        job_fn("recorder", move |_ctx| {
            let starts = Arc::clone(&starts);
            async move {
                starts.lock().unwrap().push(Instant::now());
                Ok(json!({ "ok": true }))
            }
        })
    }

    pub fn failing(message: &'static str) -> Arc<dyn Job> {
        job_fn("failing", move |_ctx| async move {
            Err(AppError::JobFailed(message.to_string()))
        })
    }

    /// Fails with `message` on the first run, then returns `value`.
    pub fn failing_once(
        runs: Arc<AtomicUsize>,
        message: &'static str,
        value: Value,
    ) -> Arc<dyn Job> {
        job_fn("flaky", move |_ctx| {
            let runs = Arc::clone(&runs);
            let value = value.clone();
            async move {
                if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::JobFailed(message.to_string()))
                } else {
                    Ok(value)
                }
            }
        })
    }

    pub fn panicking() -> Arc<dyn Job> {
        job_fn("panicking", |_ctx| async {
            if true {
                panic!("payload blew up");
            }
            Ok(json!(null))
        })
    }

    pub fn returning_nothing() -> Arc<dyn Job> {
        job_fn("empty", |_ctx| async { Ok(Value::Null) })
    }
}
