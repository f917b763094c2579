//! Bounded polling for spot capacity.
//!
//! The monitor drives the capacity prober on a fixed cadence until capacity
//! appears or the check budget runs out. Attempt counting is 1-based and
//! inclusive: `max_attempts` is the total number of probe passes, not the
//! number of retries after an initial probe, and no sleep follows the final
//! attempt. The inter-attempt sleep is the cancellation point: dropping the
//! future at that boundary aborts the watch without waiting on a remote
//! call.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use crate::probe::{AvailabilityOutcome, CapacityProber};
use crate::provider::{Location, Provider};
use crate::shape::ResourceShape;

/// Parameters for one monitoring run. A plan is a value, copied per run;
/// concurrent watches never share mutable state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitorPlan {
    /// Shape to watch for.
    pub shape: ResourceShape,
    /// Pause between attempts.
    pub interval: Duration,
    /// Total probe passes to make before giving up.
    pub max_attempts: u32,
    /// Ordered locations to scan on each attempt.
    pub locations: Vec<Location>,
}

/// Progress report handed to the attempt observer after each probe pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttemptReport {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Total attempt budget for the run.
    pub max_attempts: u32,
    /// Outcome of this pass.
    pub outcome: AvailabilityOutcome,
}

/// Terminal result of a monitoring run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MonitorOutcome {
    /// Capacity appeared before the budget ran out.
    Found {
        /// Attempt on which capacity was found.
        attempt: u32,
        /// Location that reported capacity first.
        location: Location,
        /// Availability details for the winning pass.
        outcome: AvailabilityOutcome,
    },
    /// The attempt budget was exhausted without finding capacity.
    Exhausted {
        /// Number of probe passes performed.
        attempts: u32,
    },
}

/// Errors raised before any probing starts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MonitorError {
    /// The requested shape has no SKU; polling for it would never succeed,
    /// so the run fails before the first remote call.
    #[error("no instance type exists for {shape}")]
    UnknownResourceShape {
        /// Shape that failed to resolve.
        shape: ResourceShape,
    },
}

/// Polls for spot availability on a fixed cadence.
#[derive(Clone, Debug)]
pub struct AvailabilityMonitor<P> {
    prober: CapacityProber<P>,
}

impl<P: Provider> AvailabilityMonitor<P> {
    /// Creates a monitor over the given provider transport.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            prober: CapacityProber::new(provider),
        }
    }

    /// Runs the watch loop, invoking `on_attempt` after every probe pass.
    ///
    /// The observer fires for each attempt regardless of the final result,
    /// so callers can surface incremental progress. A `max_attempts` of
    /// zero exhausts immediately without probing.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownResourceShape`] when the plan's shape
    /// does not resolve to a SKU.
    pub async fn watch<F>(
        &self,
        plan: &MonitorPlan,
        mut on_attempt: F,
    ) -> Result<MonitorOutcome, MonitorError>
    where
        F: FnMut(&AttemptReport),
    {
        let Some(sku) = plan.shape.sku() else {
            return Err(MonitorError::UnknownResourceShape { shape: plan.shape });
        };

        for attempt in 1..=plan.max_attempts {
            let outcome = self
                .prober
                .probe_any(plan.shape, &sku, &plan.locations)
                .await;

            info!(
                attempt,
                max_attempts = plan.max_attempts,
                shape = %plan.shape,
                available = outcome.available,
                "availability check"
            );
            on_attempt(&AttemptReport {
                attempt,
                max_attempts: plan.max_attempts,
                outcome: outcome.clone(),
            });

            if let Some(location) = outcome.location.clone() {
                return Ok(MonitorOutcome::Found {
                    attempt,
                    location,
                    outcome,
                });
            }

            if attempt < plan.max_attempts {
                sleep(plan.interval).await;
            }
        }

        Ok(MonitorOutcome::Exhausted {
            attempts: plan.max_attempts,
        })
    }
}
