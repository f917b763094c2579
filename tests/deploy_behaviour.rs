//! End-to-end scenarios for deploy-on-availability and readiness waits.

use std::time::Duration;

use skyhook::test_support::{ScriptedProvider, instance, ssh_key};
use skyhook::{
    CreateRequest, DeployError, DeployOrchestrator, DeployPlan, GpuKind, InstanceId,
    LifecycleController, LifecycleError, LifecycleState, Location, MonitorPlan, ProviderError,
    ResourceShape, default_locations,
};
use tokio::time::Instant;

fn deploy_plan(shape: ResourceShape, max_attempts: u32, wait_ready: bool) -> DeployPlan {
    DeployPlan {
        monitor: MonitorPlan {
            shape,
            interval: Duration::from_secs(30),
            max_attempts,
            locations: default_locations(),
        },
        create: CreateRequest {
            shape,
            image: String::from("ubuntu-24.04-cuda-12.8-open-docker"),
            hostname: None,
            volume_ids: Vec::new(),
            script_id: None,
        },
        wait_ready,
        ready_timeout: Duration::from_secs(60),
        poll_interval: Duration::from_secs(10),
    }
}

#[tokio::test(start_paused = true)]
async fn deploys_into_the_first_location_with_capacity() {
    let shape = ResourceShape::new(GpuKind::B300, 4);
    let provider = ScriptedProvider::new();
    provider.set_ssh_keys(vec![ssh_key("key-1")]);
    provider.push_probe(Ok(false)); // FIN-01
    provider.push_probe(Ok(true)); // FIN-02
    provider.push_create(Ok(instance("inst-1", LifecycleState::Pending)));
    provider.push_read_states(
        &instance("inst-1", LifecycleState::Pending),
        &[
            LifecycleState::Pending,
            LifecycleState::Pending,
            LifecycleState::Running,
        ],
    );
    let orchestrator = DeployOrchestrator::new(provider.clone(), "spot-gpu");
    let started = Instant::now();

    let deployment = orchestrator
        .deploy(&deploy_plan(shape, 5, true), |_| {})
        .await
        .unwrap_or_else(|err| panic!("deploy should succeed: {err}"));

    assert_eq!(deployment.attempt, 1);
    assert_eq!(deployment.availability.location, Some(Location::from("FIN-02")));
    assert_eq!(deployment.instance.state, LifecycleState::Running);

    let created = provider.created();
    let Some(spec) = created.first() else {
        panic!("exactly one create call expected");
    };
    assert_eq!(spec.sku.as_str(), "4B300.120V");
    assert_eq!(spec.location, Location::from("FIN-02"));
    assert!(spec.spot);
    assert!(
        spec.hostname.starts_with("spot-gpu-4x-"),
        "unexpected hostname: {}",
        spec.hostname
    );

    // Two readiness sleeps before the running read.
    assert_eq!(provider.read_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn losing_the_capacity_race_is_reported_as_race_lost() {
    let shape = ResourceShape::new(GpuKind::B300, 1);
    let provider = ScriptedProvider::new();
    provider.set_ssh_keys(vec![ssh_key("key-1")]);
    provider.push_probe(Ok(true)); // FIN-01
    provider.push_create(Err(ProviderError::Api {
        status: 409,
        message: String::from("instance type not available"),
    }));
    let orchestrator = DeployOrchestrator::new(provider, "spot-gpu");

    let result = orchestrator.deploy(&deploy_plan(shape, 1, true), |_| {}).await;

    let Err(DeployError::RaceLost { location, .. }) = result else {
        panic!("expected a race-lost failure, got {result:?}");
    };
    assert_eq!(location, Location::from("FIN-01"));
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_reject_the_claim_without_creating() {
    let shape = ResourceShape::new(GpuKind::B300, 1);
    let provider = ScriptedProvider::new();
    provider.push_probe(Ok(true));
    let orchestrator = DeployOrchestrator::new(provider.clone(), "spot-gpu");

    let result = orchestrator.deploy(&deploy_plan(shape, 1, true), |_| {}).await;

    assert!(matches!(
        result,
        Err(DeployError::Rejected(LifecycleError::NoCredential))
    ));
    assert!(provider.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn instance_entering_error_state_is_never_ready() {
    let shape = ResourceShape::new(GpuKind::B300, 1);
    let provider = ScriptedProvider::new();
    provider.set_ssh_keys(vec![ssh_key("key-1")]);
    provider.push_probe(Ok(true));
    provider.push_create(Ok(instance("inst-1", LifecycleState::Pending)));
    provider.push_read_states(
        &instance("inst-1", LifecycleState::Pending),
        &[LifecycleState::Pending, LifecycleState::Error],
    );
    let orchestrator = DeployOrchestrator::new(provider, "spot-gpu");

    let result = orchestrator.deploy(&deploy_plan(shape, 1, true), |_| {}).await;

    let Err(DeployError::NeverReady { instance: lost, source }) = result else {
        panic!("expected a never-ready failure, got {result:?}");
    };
    assert_eq!(lost.id, InstanceId::from("inst-1"));
    assert!(matches!(
        source,
        LifecycleError::EnteredErrorState { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_surfaces_the_attempt_count() {
    let shape = ResourceShape::new(GpuKind::B300, 1);
    let provider = ScriptedProvider::new();
    provider.set_ssh_keys(vec![ssh_key("key-1")]);
    let orchestrator = DeployOrchestrator::new(provider.clone(), "spot-gpu");

    let result = orchestrator.deploy(&deploy_plan(shape, 2, true), |_| {}).await;

    assert!(matches!(result, Err(DeployError::Exhausted { attempts: 2 })));
    assert!(provider.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn skipping_the_readiness_wait_returns_the_creation_snapshot() {
    let shape = ResourceShape::new(GpuKind::B300, 1);
    let provider = ScriptedProvider::new();
    provider.set_ssh_keys(vec![ssh_key("key-1")]);
    provider.push_probe(Ok(true));
    provider.push_create(Ok(instance("inst-1", LifecycleState::Pending)));
    let orchestrator = DeployOrchestrator::new(provider.clone(), "spot-gpu");

    let deployment = orchestrator
        .deploy(&deploy_plan(shape, 1, false), |_| {})
        .await
        .unwrap_or_else(|err| panic!("deploy should succeed: {err}"));

    assert_eq!(deployment.instance.state, LifecycleState::Pending);
    assert_eq!(provider.read_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn readiness_wait_times_out_on_the_polling_cadence() {
    let provider = ScriptedProvider::new();
    let id = InstanceId::from("inst-1");
    provider.push_read_states(
        &instance("inst-1", LifecycleState::Pending),
        &[LifecycleState::Pending, LifecycleState::Pending],
    );
    let controller = LifecycleController::new(provider.clone(), "spot-gpu");
    let started = Instant::now();

    let result = controller
        .await_ready(&id, Duration::from_secs(20), Duration::from_secs(10))
        .await;

    let Err(LifecycleError::Timeout { waited_secs, .. }) = result else {
        panic!("expected a timeout, got {result:?}");
    };
    // Elapsed time is summed from the cadence, so a 20s budget with a 10s
    // poll makes exactly two reads.
    assert_eq!(waited_secs, 20);
    assert_eq!(provider.read_count(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}
