//! Retry and provider fallback through the public orchestrator.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{orchestrator, spec, RecordingObserver, ScriptedProvider};
use switchyard::error::{ErrorKind, SwitchyardError};
use switchyard::util::RetryPolicy;

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1000),
        multiplier: 2.0,
        rate_limit_schedule: vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(20),
        ],
    }
}

#[tokio::test(start_paused = true)]
async fn third_candidate_answers_after_two_exhausted() {
    let a = ScriptedProvider::failing("a", 500);
    let b = ScriptedProvider::failing("b", 502);
    let c = ScriptedProvider::new("c");
    c.push_text("from c");

    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = orchestrator(&[a.clone(), b.clone(), c.clone()], policy())
        .with_observer(observer.clone());

    let started = Instant::now();
    let response = orchestrator
        .run(&spec(&["a:m", "b:m", "c:m"], "hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.content, "from c");
    assert_eq!(response.provider, "c");
    assert_eq!(a.call_count(), 3);
    assert_eq!(b.call_count(), 3);
    assert_eq!(c.call_count(), 1);
    // (max_attempts - 1) sleeps of 1s then 2s on each failing candidate.
    assert_eq!(started.elapsed(), Duration::from_secs(6));

    let delays: Vec<_> = observer
        .attempts
        .lock()
        .unwrap()
        .iter()
        .map(|(provider, attempt, _, delay)| (provider.clone(), *attempt, *delay))
        .collect();
    assert_eq!(
        delays,
        vec![
            ("a".to_string(), 1, Some(Duration::from_secs(1))),
            ("a".to_string(), 2, Some(Duration::from_secs(2))),
            ("a".to_string(), 3, None),
            ("b".to_string(), 1, Some(Duration::from_secs(1))),
            ("b".to_string(), 2, Some(Duration::from_secs(2))),
            ("b".to_string(), 3, None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limit_schedule_is_consumed_then_candidate_abandoned() {
    let throttled = ScriptedProvider::failing("throttled", 429);
    let backup = ScriptedProvider::new("backup");
    backup.push_text("ok");

    let orchestrator = orchestrator(&[throttled.clone(), backup.clone()], policy());
    let started = Instant::now();
    let response = orchestrator
        .run(
            &spec(&["throttled:m", "backup:m"], "hi"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.provider, "backup");
    // One initial attempt plus one per schedule entry.
    assert_eq!(throttled.call_count(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(35));
}

#[tokio::test(start_paused = true)]
async fn exhausting_every_candidate_reports_the_last_one() {
    let a = ScriptedProvider::failing("a", 500);
    let b = ScriptedProvider::failing("b", 503);
    let orchestrator = orchestrator(&[a, b], policy());

    let err = orchestrator
        .run(&spec(&["a:one", "b:two"], "hi"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderExecutionError);
    match err {
        SwitchyardError::ProviderExecution {
            provider, model, ..
        } => {
            assert_eq!(provider, "b");
            assert_eq!(model, "two");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_stops_fallback() {
    let a = ScriptedProvider::failing("a", 500);
    let b = ScriptedProvider::new("b");
    b.push_text("never");
    let orchestrator = orchestrator(&[a.clone(), b.clone()], policy());

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        })
    };

    let err = orchestrator
        .run(&spec(&["a:m", "b:m"], "hi"), &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, SwitchyardError::ClientAborted));
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn per_candidate_retry_overrides_apply() {
    let a = ScriptedProvider::failing("a", 500);
    let b = ScriptedProvider::new("b");
    b.push_text("ok");
    let orchestrator = orchestrator(&[a.clone(), b], policy());

    let mut spec = spec(&["a:m", "b:m"], "hi");
    spec.candidates[0].retry = Some(switchyard::types::RetryOverrides {
        max_attempts: Some(1),
        ..Default::default()
    });
    orchestrator.run(&spec, &CancellationToken::new()).await.unwrap();
    assert_eq!(a.call_count(), 1);
}

#[tokio::test]
async fn oversized_retry_override_is_a_validation_error() {
    let a = ScriptedProvider::new("a");
    a.push_text("unused");
    let orchestrator = orchestrator(&[a.clone()], policy());

    let mut spec = spec(&["a:m"], "hi");
    spec.candidates[0].retry = Some(switchyard::types::RetryOverrides {
        rate_limit_schedule_secs: Some(vec![1e300]),
        ..Default::default()
    });
    let err = tokio::spawn(async move { orchestrator.run(&spec, &CancellationToken::new()).await })
        .await
        .expect("run must not panic")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(a.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn huge_multiplier_backs_off_at_the_delay_cap() {
    let a = ScriptedProvider::failing("a", 500);
    let b = ScriptedProvider::new("b");
    b.push_text("ok");
    let orchestrator = orchestrator(&[a.clone(), b], policy());

    let mut spec = spec(&["a:m", "b:m"], "hi");
    spec.candidates[0].retry = Some(switchyard::types::RetryOverrides {
        multiplier: Some(1e300),
        ..Default::default()
    });
    let started = Instant::now();
    let response = orchestrator.run(&spec, &CancellationToken::new()).await.unwrap();

    assert_eq!(response.provider, "b");
    assert_eq!(a.call_count(), 3);
    assert_eq!(
        started.elapsed(),
        Duration::from_secs(1) + switchyard::util::retry::MAX_RETRY_DELAY
    );
}
