//! Deploy-on-availability orchestration.
//!
//! Chains the availability monitor and the lifecycle controller into one
//! caller-invocable operation: wait for capacity, immediately try to claim
//! it at the discovered location, then optionally wait for the claimed
//! instance to become usable. The phases can fail independently, and each
//! partial-failure state maps to its own error variant so a caller can
//! tell "capacity never appeared" from "someone else claimed it first"
//! from "we claimed it but it never came up".

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::lifecycle::{CreateRequest, LifecycleController, LifecycleError};
use crate::monitor::{AttemptReport, AvailabilityMonitor, MonitorError, MonitorOutcome, MonitorPlan};
use crate::probe::AvailabilityOutcome;
use crate::provider::{Instance, Location, Provider};

/// Parameters for one deploy-on-availability run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeployPlan {
    /// Monitoring parameters (shape, cadence, budget, locations).
    pub monitor: MonitorPlan,
    /// Creation parameters applied once capacity is found.
    pub create: CreateRequest,
    /// Whether to block until the instance reports running.
    pub wait_ready: bool,
    /// Readiness budget, used when `wait_ready` is set.
    pub ready_timeout: Duration,
    /// Readiness poll cadence, used when `wait_ready` is set.
    pub poll_interval: Duration,
}

/// Successful result of a deploy-on-availability run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Deployment {
    /// Attempt on which capacity was found.
    pub attempt: u32,
    /// Availability details, including the location deployed into.
    pub availability: AvailabilityOutcome,
    /// The created instance. Ready when the plan asked to wait, otherwise
    /// a snapshot taken right after creation.
    pub instance: Instance,
}

/// Errors raised by deploy-on-availability, one variant per phase.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The watch could not start (unresolvable shape).
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    /// The monitoring budget ran out before capacity appeared. Retryable
    /// with a larger budget.
    #[error("no spot capacity appeared within {attempts} checks")]
    Exhausted {
        /// Probe passes performed before giving up.
        attempts: u32,
    },
    /// Creation failed a local precondition (missing credential, invalid
    /// request) after capacity was found. Not a race; the caller must fix
    /// the account or request before retrying.
    #[error("capacity found but the create request was rejected: {0}")]
    Rejected(#[source] LifecycleError),
    /// Capacity was found but the provider refused the claim. Another
    /// caller may have taken it between probe and create; retryable by
    /// re-running the watch.
    #[error("capacity at {location} was claimed before the instance could be created")]
    RaceLost {
        /// Location where capacity was observed.
        location: Location,
        /// Provider failure from the create call.
        #[source]
        source: LifecycleError,
    },
    /// The instance was created but never became usable. The instance
    /// still exists; the caller decides whether to keep waiting or tear
    /// it down.
    #[error("instance {hostname} was created but did not become ready", hostname = .instance.hostname)]
    NeverReady {
        /// Snapshot of the created instance.
        instance: Box<Instance>,
        /// Timeout or terminal-state failure from the readiness wait.
        #[source]
        source: LifecycleError,
    },
}

/// Runs the two-phase watch-then-claim flow over a shared provider.
#[derive(Clone, Debug)]
pub struct DeployOrchestrator<P> {
    monitor: AvailabilityMonitor<P>,
    lifecycle: LifecycleController<P>,
}

impl<P: Provider + Clone> DeployOrchestrator<P> {
    /// Creates an orchestrator. Both phases get their own handle to the
    /// same provider transport.
    #[must_use]
    pub fn new(provider: P, hostname_prefix: impl Into<String>) -> Self {
        Self {
            monitor: AvailabilityMonitor::new(provider.clone()),
            lifecycle: LifecycleController::new(provider, hostname_prefix),
        }
    }

    /// Executes the plan, invoking `on_attempt` per monitor attempt.
    ///
    /// Interrupting the returned future at any sleep boundary leaves no
    /// local state behind; re-running the plan is always safe, though an
    /// instance created before an interrupt keeps existing (the provider
    /// is the source of truth).
    ///
    /// # Errors
    ///
    /// Returns a [`DeployError`] naming the phase that failed; see the
    /// variant docs for retryability.
    pub async fn deploy<F>(
        &self,
        plan: &DeployPlan,
        on_attempt: F,
    ) -> Result<Deployment, DeployError>
    where
        F: FnMut(&AttemptReport),
    {
        let (attempt, location, availability) =
            match self.monitor.watch(&plan.monitor, on_attempt).await? {
                MonitorOutcome::Found {
                    attempt,
                    location,
                    outcome,
                } => (attempt, location, outcome),
                MonitorOutcome::Exhausted { attempts } => {
                    return Err(DeployError::Exhausted { attempts });
                }
            };

        info!(attempt, %location, "capacity found; claiming");

        let instance = match self.lifecycle.create(&plan.create, &location).await {
            Ok(instance) => instance,
            Err(err @ LifecycleError::Provider(_)) => {
                return Err(DeployError::RaceLost {
                    location,
                    source: err,
                });
            }
            Err(err) => return Err(DeployError::Rejected(err)),
        };

        if !plan.wait_ready {
            return Ok(Deployment {
                attempt,
                availability,
                instance,
            });
        }

        match self
            .lifecycle
            .await_ready(&instance.id, plan.ready_timeout, plan.poll_interval)
            .await
        {
            Ok(ready) => Ok(Deployment {
                attempt,
                availability,
                instance: ready,
            }),
            Err(err) => Err(DeployError::NeverReady {
                instance: Box::new(instance),
                source: err,
            }),
        }
    }
}
