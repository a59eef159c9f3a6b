//! Preemption and cancellation of same-key jobs through the public executor API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use transwatch::executor::{JobRequest, JobState, ProcessExecutor};

fn job(cancels: &Arc<AtomicUsize>) -> JobRequest {
    let counter = Arc::clone(cancels);
    JobRequest::new(
        "sh",
        vec!["-c".to_string(), "sleep 0.3; echo done".to_string()],
    )
    .with_on_cancel(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(flavor = "multi_thread")]
/// What: A second request during the debounce window replaces the first.
///
/// Inputs:
/// - Two identical jobs submitted 20ms apart with a 200ms debounce
///
/// Output:
/// - The first settles as canceled with its hook fired once; only the
///   second produces output.
async fn debouncing_job_is_replaced() {
    let executor = Arc::new(ProcessExecutor::new(
        std::env::temp_dir(),
        Duration::from_millis(200),
    ));
    let first_cancels = Arc::new(AtomicUsize::new(0));
    let second_cancels = Arc::new(AtomicUsize::new(0));

    let first = {
        let executor = Arc::clone(&executor);
        let request = job(&first_cancels);
        tokio::spawn(async move { executor.run(request).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = executor.run(job(&second_cancels)).await;

    let first = first.await.expect("first task joins");
    assert!(first.expect_err("first preempted").is_canceled());
    assert_eq!(first_cancels.load(Ordering::SeqCst), 1);

    let output = second.expect("second completes");
    assert_eq!(output.stdout.trim(), "done");
    assert_eq!(second_cancels.load(Ordering::SeqCst), 0);
    assert_eq!(executor.active_jobs(), 0);
}

#[tokio::test(flavor = "multi_thread")]
/// What: A running process is killed when a same-key request arrives.
///
/// Inputs:
/// - Long-running job past its debounce, then the same command again
///
/// Output:
/// - The first run settles as canceled well before its sleep would end.
async fn running_job_is_killed_by_newer_request() {
    let executor = Arc::new(ProcessExecutor::new(
        std::env::temp_dir(),
        Duration::from_millis(10),
    ));
    let cancels = Arc::new(AtomicUsize::new(0));
    let long = || {
        let counter = Arc::clone(&cancels);
        JobRequest::new("sh", vec!["-c".to_string(), "sleep 10".to_string()]).with_on_cancel(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    };

    let started = Instant::now();
    let first_request = long();
    let key = first_request.key();
    let first = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(first_request).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.state(key), Some(JobState::Running));

    let second = {
        let executor = Arc::clone(&executor);
        let request = long();
        tokio::spawn(async move { executor.run(request).await })
    };
    let first = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("first settles promptly")
        .expect("first task joins");
    assert!(first.expect_err("killed").is_canceled());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(cancels.load(Ordering::SeqCst), 1);

    executor.cancel_all();
    let second = tokio::time::timeout(Duration::from_secs(5), second)
        .await
        .expect("second settles after cancel_all")
        .expect("second task joins");
    assert!(second.expect_err("canceled").is_canceled());
    assert_eq!(cancels.load(Ordering::SeqCst), 2);
}
