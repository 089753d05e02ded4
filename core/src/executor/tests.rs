//! Timing tests for the phase executors

use super::*;
use crate::test_support::{capabilities, MockInvoker};

use std::sync::Arc;
use std::time::Instant;

fn constant(duration: Duration, rps: u64) -> Phase {
    Phase::constant("test", Duration::ZERO, duration, rps)
}

fn ramping(duration: Duration, start: u64, end: u64, step: i64) -> Phase {
    Phase::ramping("test", Duration::ZERO, duration, start, end, step)
}

// ============================================================================
// ConstantExecutor
// ============================================================================

#[tokio::test]
async fn test_constant_execute() {
    let (caps, invoker, sink) = capabilities(MockInvoker::new());
    let executor = ConstantExecutor::new(caps, None);

    let start = Instant::now();
    let stats = executor
        .execute(&CancellationToken::new(), &constant(Duration::from_secs(2), 2))
        .await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "took {elapsed:?}");
    assert_eq!(stats.end, PhaseEnd::Completed);

    let drained = executor.drain(Duration::from_secs(1)).await;
    assert_eq!(drained.abandoned, 0);

    // ticks at 0.0s, 0.5s, 1.0s, 1.5s
    let calls = invoker.call_count();
    assert!((3..=5).contains(&calls), "expected ~4 calls, got {calls}");
    assert_eq!(sink.collected(), calls);
    assert_eq!(stats.dispatched as usize, calls);
}

#[tokio::test]
async fn test_constant_high_rate_uses_bursts() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = ConstantExecutor::new(caps, None);

    let stats = executor
        .execute(&CancellationToken::new(), &constant(Duration::from_millis(500), 1000))
        .await;
    executor.drain(Duration::from_secs(1)).await;

    // 10ms ticks, 10 per tick
    assert!(stats.ticks <= 51, "ticks {}", stats.ticks);
    let calls = invoker.call_count();
    assert!((300..=520).contains(&calls), "expected ~500 calls, got {calls}");
}

#[tokio::test]
async fn test_constant_stop() {
    let (caps, _invoker, _sink) =
        capabilities(MockInvoker::new().with_delay(Duration::from_millis(100)));
    let executor = Arc::new(ConstantExecutor::new(caps, None));

    let running = Arc::clone(&executor);
    let handle = tokio::spawn(async move {
        running
            .execute(&CancellationToken::new(), &constant(Duration::from_secs(5), 1))
            .await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    executor.stop();

    let stats = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("executor did not stop")
        .expect("executor panicked");
    assert_eq!(stats.end, PhaseEnd::Stopped);
}

#[tokio::test]
async fn test_repeated_stop_is_safe() {
    let (caps, _invoker, _sink) = capabilities(MockInvoker::new());
    let executor = ConstantExecutor::new(caps, None);

    executor.stop();
    executor.stop();
    executor.stop();

    let start = Instant::now();
    let stats = executor
        .execute(&CancellationToken::new(), &constant(Duration::from_secs(5), 1))
        .await;
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(stats.end, PhaseEnd::Stopped);
}

#[tokio::test]
async fn test_constant_parent_cancellation() {
    let (caps, _invoker, _sink) = capabilities(MockInvoker::new());
    let executor = ConstantExecutor::new(caps, None);

    let parent = CancellationToken::new();
    let deadline = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        deadline.cancel();
    });

    let start = Instant::now();
    let stats = executor
        .execute(&parent, &constant(Duration::from_secs(5), 5))
        .await;

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.end, PhaseEnd::Cancelled);
}

#[tokio::test]
async fn test_constant_zero_rate_idles() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = ConstantExecutor::new(caps, None);

    let stats = executor
        .execute(&CancellationToken::new(), &constant(Duration::from_millis(300), 0))
        .await;

    assert_eq!(stats.end, PhaseEnd::Completed);
    assert_eq!(stats.ticks, 0);
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_constant_in_flight_limit() {
    let (caps, invoker, _sink) =
        capabilities(MockInvoker::new().with_delay(Duration::from_secs(2)));
    let executor = ConstantExecutor::new(caps, Some(5));

    let stats = executor
        .execute(&CancellationToken::new(), &constant(Duration::from_millis(500), 100))
        .await;

    assert_eq!(stats.dispatched, 5);
    assert!(stats.shed > 0);
    assert_eq!(executor.in_flight(), 5);

    let drained = executor.drain(Duration::from_secs(5)).await;
    assert_eq!(drained.completed, 5);
    assert_eq!(invoker.call_count(), 5);
}

// ============================================================================
// RampingExecutor
// ============================================================================

#[tokio::test]
async fn test_ramping_increment() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let start = Instant::now();
    let stats = executor
        .execute(&CancellationToken::new(), &ramping(Duration::from_secs(3), 1, 3, 1))
        .await;
    let elapsed = start.elapsed();
    executor.drain(Duration::from_secs(1)).await;

    assert!(elapsed >= Duration::from_millis(2900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "took {elapsed:?}");
    assert_eq!(stats.end, PhaseEnd::Completed);
    assert_eq!(stats.peak_rps, 3);

    // second 1: 1, second 2: 2, second 3: 3
    let calls = invoker.call_count();
    assert!((4..=8).contains(&calls), "expected ~6 calls, got {calls}");
}

/// Runs a ramp on paused time and returns `(calls, ticks)`
async fn ramp_counts(phase: Phase) -> (usize, u64) {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let stats = executor.execute(&CancellationToken::new(), &phase).await;
    let drained = executor.drain(Duration::from_secs(1)).await;
    assert_eq!(drained.abandoned, 0);
    assert_eq!(stats.end, PhaseEnd::Completed);

    (invoker.call_count(), stats.ticks)
}

#[tokio::test(start_paused = true)]
async fn test_ramping_up_one_burst_per_boundary() {
    // 1 + 2 + 3 + 4 + 5 requests over five seconds
    let counts = ramp_counts(ramping(Duration::from_millis(4900), 1, 10, 1)).await;
    assert_eq!(counts, (15, 15));
}

#[tokio::test(start_paused = true)]
async fn test_ramping_down_one_burst_per_boundary() {
    // 5 + 4 + 3 + 2 + 1 requests over five seconds
    let counts = ramp_counts(ramping(Duration::from_millis(4900), 5, 1, -1)).await;
    assert_eq!(counts, (15, 15));
}

#[tokio::test(start_paused = true)]
async fn test_ramping_first_change_keeps_target_rate() {
    // second 0 at 1 RPS, second 1 at 2 RPS
    let counts = ramp_counts(ramping(Duration::from_millis(1900), 1, 2, 1)).await;
    assert_eq!(counts, (3, 3));
}

#[tokio::test]
async fn test_ramping_decrement() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let stats = executor
        .execute(&CancellationToken::new(), &ramping(Duration::from_secs(3), 3, 1, -1))
        .await;
    executor.drain(Duration::from_secs(1)).await;

    assert_eq!(stats.end, PhaseEnd::Completed);
    assert_eq!(stats.peak_rps, 3);

    let calls = invoker.call_count();
    assert!((4..=8).contains(&calls), "expected ~6 calls, got {calls}");
}

#[tokio::test]
async fn test_ramping_zero_start() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    executor
        .execute(&CancellationToken::new(), &ramping(Duration::from_secs(2), 0, 2, 1))
        .await;
    executor.drain(Duration::from_secs(1)).await;

    assert!(invoker.call_count() >= 1);
}

#[tokio::test]
async fn test_ramping_exhaustion_ends_phase() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let start = Instant::now();
    let stats = executor
        .execute(&CancellationToken::new(), &ramping(Duration::from_secs(5), 2, 0, -3))
        .await;
    let elapsed = start.elapsed();
    executor.drain(Duration::from_secs(1)).await;

    // 2 -> -1 on the second rate tick, one second in
    assert_eq!(stats.end, PhaseEnd::RateExhausted);
    assert!(elapsed >= Duration::from_millis(900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    assert!(invoker.call_count() >= 1);
}

#[tokio::test]
async fn test_ramping_stop() {
    let (caps, _invoker, _sink) =
        capabilities(MockInvoker::new().with_delay(Duration::from_millis(100)));
    let executor = Arc::new(RampingExecutor::new(caps, None));

    let running = Arc::clone(&executor);
    let handle = tokio::spawn(async move {
        running
            .execute(&CancellationToken::new(), &ramping(Duration::from_secs(5), 1, 5, 1))
            .await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    executor.stop();
    executor.stop();

    let stats = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("executor did not stop")
        .expect("executor panicked");
    assert_eq!(stats.end, PhaseEnd::Stopped);
}

#[tokio::test]
async fn test_ramping_parent_timeout() {
    let (caps, _invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let parent = CancellationToken::new();
    let deadline = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        deadline.cancel();
    });

    let start = Instant::now();
    let stats = executor
        .execute(&parent, &ramping(Duration::from_secs(5), 1, 5, 1))
        .await;

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.end, PhaseEnd::Cancelled);
}

#[tokio::test]
async fn test_ramping_high_rate_restarts_ticker() {
    let (caps, invoker, _sink) = capabilities(MockInvoker::new());
    let executor = RampingExecutor::new(caps, None);

    let stats = executor
        .execute(&CancellationToken::new(), &ramping(Duration::from_millis(2500), 100, 300, 100))
        .await;
    executor.drain(Duration::from_secs(1)).await;

    // 100 for a second, 200 for a second, 300 for half a second
    assert_eq!(stats.peak_rps, 300);
    let calls = invoker.call_count();
    assert!((350..=500).contains(&calls), "expected ~450 calls, got {calls}");
}

// ============================================================================
// executor_for
// ============================================================================

#[tokio::test]
async fn test_executor_for_matches_kind() {
    let (caps, _invoker, _sink) = capabilities(MockInvoker::new());
    let phase = ramping(Duration::from_millis(100), 1, 5, 1);

    let executor = executor_for(phase.kind, caps, &DispatchConfig::default());
    let stats = executor.execute(&CancellationToken::new(), &phase).await;
    assert_eq!(stats.kind, PhaseKind::Ramping);
}
