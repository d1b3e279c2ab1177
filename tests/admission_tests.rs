//! Concurrency limiter and rate limiter behavior under simulated time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use switchyard::admission::{ConcurrencyLimiter, RateLimiter};
use switchyard::config::{RateLimitConfig, RouteLimits};
use switchyard::error::{ErrorKind, SwitchyardError};

fn limits(max_concurrent: i64, max_queue_size: usize) -> RouteLimits {
    RouteLimits {
        enabled: true,
        max_concurrent,
        max_queue_size,
        queue_timeout_ms: 0,
    }
}

#[tokio::test(start_paused = true)]
async fn waiters_are_admitted_in_arrival_order() {
    let limiter = ConcurrencyLimiter::new("run", &limits(1, 8));
    let order = Arc::new(Mutex::new(Vec::new()));
    let held = limiter.acquire(&CancellationToken::new()).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..3 {
        let limiter = limiter.clone();
        let order = order.clone();
        tasks.push(tokio::spawn(async move {
            let slot = limiter.acquire(&CancellationToken::new()).await.unwrap();
            order.lock().unwrap().push(i);
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(slot);
        }));
        // Let each waiter enqueue before the next one arrives.
        tokio::task::yield_now().await;
    }
    assert_eq!(limiter.queued(), 3);
    assert_eq!(limiter.in_flight(), 1);

    drop(held);
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test]
async fn zero_queue_rejects_with_server_busy() {
    let limiter = ConcurrencyLimiter::new("stream", &limits(1, 0));
    let cancel = CancellationToken::new();
    let _held = limiter.acquire(&cancel).await.unwrap();

    let err = limiter.acquire(&cancel).await.unwrap_err();
    assert!(matches!(err, SwitchyardError::ServerBusy { ref route } if route == "stream"));
    assert_eq!(err.kind(), ErrorKind::ServerBusy);
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn released_slot_goes_straight_to_the_next_waiter() {
    let limiter = ConcurrencyLimiter::new("run", &limits(1, 1));
    let held = limiter.acquire(&CancellationToken::new()).await.unwrap();

    let waiter = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.acquire(&CancellationToken::new()).await })
    };
    tokio::task::yield_now().await;

    held.release();
    let slot = waiter.await.unwrap().unwrap();
    assert_eq!(limiter.in_flight(), 1);
    drop(slot);
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn burst_of_one_at_sixty_per_minute() {
    let limiter = RateLimiter::new(&RateLimitConfig {
        enabled: true,
        requests_per_minute: 60,
        burst: 1,
        trust_proxy_headers: false,
    });

    limiter.check("client").unwrap();
    let err = limiter.check("client").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    tokio::time::advance(Duration::from_millis(500)).await;
    match limiter.check("client").unwrap_err() {
        SwitchyardError::RateLimited { retry_after_ms, .. } => assert_eq!(retry_after_ms, 500),
        other => panic!("unexpected error: {other}"),
    }

    tokio::time::advance(Duration::from_millis(500)).await;
    limiter.check("client").unwrap();
}
