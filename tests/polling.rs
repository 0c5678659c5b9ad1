use astra_data_api::{CancellationToken, PollingWaiter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[tokio::test]
async fn times_out_close_to_the_deadline() {
    let waiter = PollingWaiter::new(Duration::from_millis(10), Duration::from_millis(50));
    let calls = AtomicUsize::new(0);
    let started = Instant::now();
    let err = waiter
        .wait_until("never true", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("never true"));
    assert!(elapsed >= Duration::from_millis(45), "returned too early: {elapsed:?}");
    // The last nap is clamped to the deadline, so only scheduler noise remains.
    assert!(elapsed < Duration::from_millis(120), "overshot: {elapsed:?}");
    assert!(calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn condition_met_on_first_check_does_not_sleep() {
    let waiter = PollingWaiter::new(Duration::from_secs(60), Duration::from_secs(600));
    let started = Instant::now();
    waiter.wait_until("ready", None, || async { Ok(true) }).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn cancellation_interrupts_a_long_sleep() {
    let waiter = PollingWaiter::new(Duration::from_secs(30), Duration::from_secs(60)).with_jitter(true);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let started = Instant::now();
    let err = waiter.wait_until("cancelled", Some(&token), || async { Ok(false) }).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn blocking_wait_propagates_predicate_errors() {
    let waiter = PollingWaiter::new(Duration::from_millis(5), Duration::from_millis(500));
    let mut calls = 0;
    let err = waiter
        .wait_until_blocking("fails on third check", None, || {
            calls += 1;
            if calls == 3 {
                return Err(astra_data_api::DataApiError::Cancelled);
            }
            Ok(false)
        })
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls, 3);
}
