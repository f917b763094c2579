//! Instance lifecycle control: create, wait for ready, act.
//!
//! The controller owns the transition of a single instance from requested
//! to ready or failed. It trusts its caller for confirmation of
//! destructive actions; the CLI boundary is responsible for asking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use crate::provider::{
    CreateInstance, Instance, InstanceAction, InstanceId, LifecycleState, Location, Provider,
    ProviderError,
};
use crate::shape::ResourceShape;

/// Description recorded with every instance this tool creates.
const CREATED_BY: &str = "Created by skyhook";

/// Process-local discriminator so repeated creates in one process never
/// collide on a generated hostname.
static HOSTNAME_SEQ: AtomicU64 = AtomicU64::new(1);

/// Caller-level creation request. Optional fields fall back to configured
/// defaults at the boundary before this struct is built; the controller
/// itself only generates the hostname when it was omitted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateRequest {
    /// Logical shape to provision.
    pub shape: ResourceShape,
    /// OS image label.
    pub image: String,
    /// Explicit hostname; generated from the configured prefix when `None`.
    pub hostname: Option<String>,
    /// Existing volumes to attach at creation.
    pub volume_ids: Vec<String>,
    /// Startup script to attach.
    pub script_id: Option<String>,
}

impl CreateRequest {
    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] when the image is empty.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.image.trim().is_empty() {
            return Err(LifecycleError::Validation(String::from("image")));
        }
        Ok(())
    }
}

/// Errors raised by the lifecycle controller.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LifecycleError {
    /// The requested shape has no SKU. Non-retryable; the caller must
    /// change the request. Raised before any remote call.
    #[error("no instance type exists for {shape}")]
    UnknownResourceShape {
        /// Shape that failed to resolve.
        shape: ResourceShape,
    },
    /// No SSH credential is registered for the account. Non-retryable
    /// until the account state changes.
    #[error("no SSH keys registered; add one in the provider console before creating instances")]
    NoCredential,
    /// A required request field is missing or empty.
    #[error("invalid create request: missing {0}")]
    Validation(String),
    /// The instance reached a terminal-failure state while being waited
    /// on. Non-retryable; the caller must intervene (typically recreate).
    #[error("instance {instance_id} entered state {state} while waiting for ready")]
    EnteredErrorState {
        /// Instance that failed.
        instance_id: InstanceId,
        /// Terminal state reported by the provider.
        state: LifecycleState,
    },
    /// The readiness budget ran out. Retryable with a larger budget.
    #[error("instance {instance_id} not ready after {waited_secs}s")]
    Timeout {
        /// Instance that was being waited on.
        instance_id: InstanceId,
        /// Accumulated wait in seconds.
        waited_secs: u64,
    },
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Drives a single instance through its life cycle via a [`Provider`].
#[derive(Clone, Debug)]
pub struct LifecycleController<P> {
    provider: P,
    hostname_prefix: String,
}

impl<P: Provider> LifecycleController<P> {
    /// Creates a controller. `hostname_prefix` seeds generated hostnames
    /// for requests that omit one.
    #[must_use]
    pub fn new(provider: P, hostname_prefix: impl Into<String>) -> Self {
        Self {
            provider,
            hostname_prefix: hostname_prefix.into(),
        }
    }

    /// Creates a spot instance at `location`.
    ///
    /// Preconditions are checked in order, each before any later work:
    /// the shape must resolve to a SKU, and at least one SSH credential
    /// must exist for the account. All registered keys are attached.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnknownResourceShape`],
    /// [`LifecycleError::NoCredential`], [`LifecycleError::Validation`],
    /// or a wrapped [`ProviderError`] when the creation call fails.
    pub async fn create(
        &self,
        request: &CreateRequest,
        location: &Location,
    ) -> Result<Instance, LifecycleError> {
        request.validate()?;
        let Some(sku) = request.shape.sku() else {
            return Err(LifecycleError::UnknownResourceShape {
                shape: request.shape,
            });
        };

        let keys = self.provider.list_ssh_keys().await?;
        if keys.is_empty() {
            return Err(LifecycleError::NoCredential);
        }

        let hostname = request
            .hostname
            .clone()
            .unwrap_or_else(|| self.next_hostname(request.shape.count));

        let spec = CreateInstance {
            sku: sku.clone(),
            image: request.image.clone(),
            hostname,
            description: String::from(CREATED_BY),
            ssh_key_ids: keys.into_iter().map(|key| key.id).collect(),
            location: location.clone(),
            spot: true,
            volume_ids: request.volume_ids.clone(),
            script_id: request.script_id.clone(),
        };

        info!(%sku, location = %location, hostname = %spec.hostname, "creating spot instance");
        let instance = self.provider.create_instance(&spec).await?;
        info!(instance_id = %instance.id, "instance created");
        Ok(instance)
    }

    /// Polls the instance until it is running or a budget/terminal state
    /// is hit.
    ///
    /// Elapsed time is tracked by summing `poll_interval` per iteration
    /// rather than measuring wall-clock deltas, so the effective timeout
    /// is a multiple of the interval and a coarse bound, not an exact one.
    /// Each sleep is a cancellation point.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::EnteredErrorState`] as soon as a
    /// terminal-failure state is read, [`LifecycleError::Timeout`] once the
    /// accumulated wait reaches `timeout`, or a wrapped [`ProviderError`]
    /// when a read fails.
    pub async fn await_ready(
        &self,
        id: &InstanceId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Instance, LifecycleError> {
        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            let instance = self.provider.get_instance(id).await?;
            match instance.state {
                LifecycleState::Running => {
                    info!(instance_id = %id, "instance is ready");
                    return Ok(instance);
                }
                state if state.is_terminal_failure() => {
                    return Err(LifecycleError::EnteredErrorState {
                        instance_id: id.clone(),
                        state,
                    });
                }
                state => {
                    info!(instance_id = %id, %state, "instance not ready yet");
                }
            }
            sleep(poll_interval).await;
            elapsed = elapsed.saturating_add(poll_interval);
        }

        Err(LifecycleError::Timeout {
            instance_id: id.clone(),
            waited_secs: elapsed.as_secs(),
        })
    }

    /// Performs a lifecycle action. No confirmation happens here; callers
    /// gate destructive actions before invoking this.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`ProviderError`] when the action call fails.
    pub async fn act(&self, id: &InstanceId, action: InstanceAction) -> Result<(), LifecycleError> {
        info!(instance_id = %id, %action, "performing instance action");
        self.provider.perform_action(id, action).await?;
        Ok(())
    }

    /// Reads a fresh snapshot of one instance.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`ProviderError`] when the read fails.
    pub async fn get(&self, id: &InstanceId) -> Result<Instance, LifecycleError> {
        Ok(self.provider.get_instance(id).await?)
    }

    /// Lists instances, optionally filtered by provider state string.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`ProviderError`] when the list call fails.
    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Instance>, LifecycleError> {
        Ok(self.provider.list_instances(status).await?)
    }

    fn next_hostname(&self, gpu_count: u32) -> String {
        let seq = HOSTNAME_SEQ.fetch_add(1, Ordering::Relaxed);
        format!("{}-{gpu_count}x-{seq}", self.hostname_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::GpuKind;
    use crate::test_support::ScriptedProvider;

    fn request(shape: ResourceShape) -> CreateRequest {
        CreateRequest {
            shape,
            image: String::from("ubuntu-24.04-cuda-12.8-open-docker"),
            hostname: None,
            volume_ids: Vec::new(),
            script_id: None,
        }
    }

    #[tokio::test]
    async fn create_fails_fast_on_unresolvable_shape() {
        let provider = ScriptedProvider::new();
        let controller = LifecycleController::new(provider.clone(), "spot-gpu");
        let result = controller
            .create(
                &request(ResourceShape::new(GpuKind::H200, 8)),
                &Location::from("FIN-01"),
            )
            .await;
        assert!(matches!(
            result,
            Err(LifecycleError::UnknownResourceShape { .. })
        ));
        // Precondition failure must precede any remote call.
        assert_eq!(provider.ssh_key_queries(), 0);
    }

    #[tokio::test]
    async fn create_requires_a_registered_credential() {
        let provider = ScriptedProvider::new();
        let controller = LifecycleController::new(provider, "spot-gpu");
        let result = controller
            .create(
                &request(ResourceShape::new(GpuKind::B300, 1)),
                &Location::from("FIN-01"),
            )
            .await;
        assert!(matches!(result, Err(LifecycleError::NoCredential)));
    }

    #[tokio::test]
    async fn create_rejects_empty_image() {
        let provider = ScriptedProvider::new();
        let controller = LifecycleController::new(provider, "spot-gpu");
        let mut req = request(ResourceShape::new(GpuKind::B300, 1));
        req.image = String::from("  ");
        let result = controller.create(&req, &Location::from("FIN-01")).await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
    }

    #[test]
    fn generated_hostnames_do_not_collide() {
        let controller = LifecycleController::new(ScriptedProvider::new(), "spot-gpu");
        let first = controller.next_hostname(4);
        let second = controller.next_hostname(4);
        assert!(first.starts_with("spot-gpu-4x-"), "hostname: {first}");
        assert_ne!(first, second);
    }
}
