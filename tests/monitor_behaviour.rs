//! Behavioural scenarios for the availability monitor.
//!
//! All timing assertions run under tokio's paused clock, so sleeps resolve
//! instantly while still advancing `Instant` by the full cadence.

use std::time::Duration;

use skyhook::test_support::ScriptedProvider;
use skyhook::{
    AttemptReport, AvailabilityMonitor, CapacityProber, GpuKind, Location, MonitorError,
    MonitorOutcome, MonitorPlan, ProviderError, ResourceShape, default_locations,
};
use tokio::time::Instant;

fn plan(max_attempts: u32, interval_secs: u64, locations: Vec<Location>) -> MonitorPlan {
    MonitorPlan {
        shape: ResourceShape::new(GpuKind::B300, 4),
        interval: Duration::from_secs(interval_secs),
        max_attempts,
        locations,
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_run_sleeps_between_attempts_but_not_after_the_last() {
    let provider = ScriptedProvider::new();
    let monitor = AvailabilityMonitor::new(provider.clone());
    let started = Instant::now();

    let outcome = monitor
        .watch(&plan(3, 30, vec![Location::from("FIN-01")]), |_| {})
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    assert!(matches!(outcome, MonitorOutcome::Exhausted { attempts: 3 }));
    assert_eq!(provider.probe_log().len(), 3);
    // Two sleeps for three attempts; no sleep after the final one.
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn capacity_found_mid_budget_stops_the_loop() {
    let provider = ScriptedProvider::new();
    provider.push_probe(Ok(false));
    provider.push_probe(Ok(true));
    let monitor = AvailabilityMonitor::new(provider.clone());
    let started = Instant::now();

    let outcome = monitor
        .watch(&plan(5, 30, vec![Location::from("FIN-01")]), |_| {})
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    let MonitorOutcome::Found {
        attempt, location, ..
    } = outcome
    else {
        panic!("expected capacity to be found");
    };
    assert_eq!(attempt, 2);
    assert_eq!(location, Location::from("FIN-01"));
    assert_eq!(provider.probe_log().len(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn scan_respects_location_order_and_short_circuits() {
    let provider = ScriptedProvider::new();
    provider.push_probe(Ok(false));
    provider.push_probe(Ok(true));
    let monitor = AvailabilityMonitor::new(provider.clone());

    let outcome = monitor
        .watch(&plan(1, 30, default_locations()), |_| {})
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    let MonitorOutcome::Found { location, .. } = outcome else {
        panic!("expected capacity to be found");
    };
    assert_eq!(location, Location::from("FIN-02"));
    assert_eq!(
        provider.probed_locations(),
        vec![Location::from("FIN-01"), Location::from("FIN-02")],
    );
}

#[tokio::test(start_paused = true)]
async fn per_location_errors_do_not_abort_the_scan() {
    let provider = ScriptedProvider::new();
    provider.push_probe(Err(ProviderError::Transport(String::from(
        "connection reset",
    ))));
    provider.push_probe(Ok(true));
    let monitor = AvailabilityMonitor::new(provider.clone());

    let outcome = monitor
        .watch(&plan(1, 30, default_locations()), |_| {})
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    let MonitorOutcome::Found { location, .. } = outcome else {
        panic!("a failing location must not hide capacity in the next one");
    };
    assert_eq!(location, Location::from("FIN-02"));
}

#[tokio::test(start_paused = true)]
async fn scan_where_every_location_errors_reports_no_capacity() {
    let provider = ScriptedProvider::new();
    for _ in 0..3 {
        provider.push_probe(Err(ProviderError::Transport(String::from(
            "connection reset",
        ))));
    }
    let prober = CapacityProber::new(provider.clone());
    let shape = ResourceShape::new(GpuKind::B300, 4);
    let sku = shape
        .sku()
        .unwrap_or_else(|| panic!("shape should resolve to a SKU"));

    let outcome = prober.probe_any(shape, &sku, &default_locations()).await;

    assert!(!outcome.available);
    assert!(outcome.location.is_none());
    // Every location was still consulted before reporting absence.
    assert_eq!(provider.probed_locations(), default_locations());
}

#[tokio::test(start_paused = true)]
async fn observer_sees_every_attempt_with_stable_numbering() {
    let provider = ScriptedProvider::new();
    let monitor = AvailabilityMonitor::new(provider);
    let mut reports: Vec<(u32, u32, bool)> = Vec::new();

    let outcome = monitor
        .watch(
            &plan(2, 30, vec![Location::from("FIN-01")]),
            |report: &AttemptReport| {
                reports.push((report.attempt, report.max_attempts, report.outcome.available));
            },
        )
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    assert!(matches!(outcome, MonitorOutcome::Exhausted { attempts: 2 }));
    assert_eq!(reports, vec![(1, 2, false), (2, 2, false)]);
}

#[tokio::test(start_paused = true)]
async fn unresolvable_shape_fails_before_any_remote_call() {
    let provider = ScriptedProvider::new();
    let monitor = AvailabilityMonitor::new(provider.clone());
    let bad_plan = MonitorPlan {
        shape: ResourceShape::new(GpuKind::B300, 3),
        interval: Duration::from_secs(30),
        max_attempts: 5,
        locations: default_locations(),
    };

    let result = monitor.watch(&bad_plan, |_| {}).await;

    assert!(matches!(
        result,
        Err(MonitorError::UnknownResourceShape { .. })
    ));
    assert!(provider.probe_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_attempt_budget_exhausts_immediately() {
    let provider = ScriptedProvider::new();
    let monitor = AvailabilityMonitor::new(provider.clone());
    let started = Instant::now();

    let outcome = monitor
        .watch(&plan(0, 30, default_locations()), |_| {})
        .await
        .unwrap_or_else(|err| panic!("watch should not fail: {err}"));

    assert!(matches!(outcome, MonitorOutcome::Exhausted { attempts: 0 }));
    assert!(provider.probe_log().is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
}
