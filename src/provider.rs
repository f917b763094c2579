//! Provider abstraction for the instance and capacity APIs.
//!
//! The core components (prober, monitor, lifecycle controller) all take a
//! [`Provider`] at construction, so they can be exercised against a
//! substitute transport in tests. No component holds hidden global state;
//! concurrent callers may share one provider and issue overlapping calls.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

use crate::shape::Sku;

macro_rules! newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw provider string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the underlying string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Provider-assigned instance identifier. Assigned exactly once at
    /// creation and never changes for the lifetime of the instance.
    InstanceId
);
newtype!(
    /// Code identifying an independent fault/availability domain
    /// (for example `FIN-01`). Capacity in one location is uncorrelated
    /// with capacity in another.
    Location
);

/// Lifecycle state of an instance as reported by the provider.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LifecycleState {
    /// Requested but not yet running (provisioning, booting, queued).
    Pending,
    /// Up and reachable; terminal success for readiness waits.
    Running,
    /// The provider reported an error; terminal failure.
    Error,
    /// Provisioning failed; terminal failure.
    Failed,
    /// The instance was terminated; terminal failure for readiness waits.
    Terminated,
    /// A state string this client does not recognise; treated as
    /// still-in-progress by readiness waits.
    Unknown,
}

impl LifecycleState {
    /// Maps a provider state string onto the lifecycle enum. Unrecognised
    /// strings become [`LifecycleState::Unknown`] rather than an error so a
    /// provider-side vocabulary change never breaks polling.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "error" => Self::Error,
            "failed" => Self::Failed,
            "terminated" => Self::Terminated,
            "pending" | "provisioning" | "ordered" | "starting" | "booting" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    /// Returns true when no further progress is possible without caller
    /// intervention.
    #[must_use]
    pub const fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Error | Self::Failed | Self::Terminated)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Snapshot of an instance as last read from the provider. Every field
/// except [`Instance::id`] may be stale between reads; the lifecycle
/// controller re-reads rather than patching fields locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Authoritative provider-assigned identifier.
    pub id: InstanceId,
    /// Display name chosen at creation.
    pub hostname: String,
    /// Lifecycle state at last read.
    pub state: LifecycleState,
    /// Concrete SKU the instance was created against.
    pub sku: Sku,
    /// Public address, once the provider has assigned one.
    pub public_ip: Option<IpAddr>,
    /// Location the instance runs in.
    pub location: Option<Location>,
    /// Startup script attached at creation, if any.
    pub script_id: Option<String>,
}

/// SSH credential registered with the provider account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshKey {
    /// Provider-assigned key identifier.
    pub id: String,
    /// Human-readable key name.
    pub name: String,
}

/// Parameters for a provider-level instance creation call. Built by the
/// lifecycle controller after its preconditions have been checked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateInstance {
    /// Concrete SKU to provision.
    pub sku: Sku,
    /// OS image label.
    pub image: String,
    /// Hostname for the new instance.
    pub hostname: String,
    /// Free-form description recorded with the instance.
    pub description: String,
    /// SSH key identifiers granted access to the instance.
    pub ssh_key_ids: Vec<String>,
    /// Target location.
    pub location: Location,
    /// Whether to request spot (reduced-guarantee) capacity.
    pub spot: bool,
    /// Existing volumes to attach at creation.
    pub volume_ids: Vec<String>,
    /// Startup script to run on first boot.
    pub script_id: Option<String>,
}

/// Lifecycle action performed on an existing instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceAction {
    /// Permanently delete the instance. Destructive; the CLI boundary
    /// requires explicit confirmation before invoking it.
    Delete,
    /// Shut the instance down; it can be booted again later.
    Shutdown,
    /// Boot a stopped instance.
    Boot,
}

impl InstanceAction {
    /// Action name on the provider wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Shutdown => "shutdown",
            Self::Boot => "boot",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a provider transport.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The request never produced a usable HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// Authentication with the provider failed.
    #[error("provider authentication failed: {0}")]
    Auth(String),
    /// The provider returned a non-success status.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message body or reason phrase returned by the provider.
        message: String,
    },
    /// A response body could not be decoded.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    /// The referenced instance does not exist.
    #[error("instance {0} not found")]
    NotFound(InstanceId),
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Remote operations the core depends on. All calls are potentially slow
/// and potentially failing; the core never retries them individually, only
/// via the attempt loops in the monitor and lifecycle controller.
pub trait Provider {
    /// Lists instances, optionally filtered by provider state string.
    fn list_instances<'a>(&'a self, status: Option<&'a str>) -> ProviderFuture<'a, Vec<Instance>>;

    /// Reads a single instance snapshot.
    fn get_instance<'a>(&'a self, id: &'a InstanceId) -> ProviderFuture<'a, Instance>;

    /// Creates an instance and returns the provider's view of it.
    fn create_instance<'a>(&'a self, spec: &'a CreateInstance) -> ProviderFuture<'a, Instance>;

    /// Performs a lifecycle action on an instance.
    fn perform_action<'a>(
        &'a self,
        id: &'a InstanceId,
        action: InstanceAction,
    ) -> ProviderFuture<'a, ()>;

    /// Checks whether capacity for `sku` exists at `location`.
    fn capacity_available<'a>(
        &'a self,
        sku: &'a Sku,
        spot: bool,
        location: &'a Location,
    ) -> ProviderFuture<'a, bool>;

    /// Lists the SSH credentials registered for the account.
    fn list_ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_state_maps_terminal_states() {
        assert_eq!(LifecycleState::from_provider("running"), LifecycleState::Running);
        assert_eq!(LifecycleState::from_provider("ERROR"), LifecycleState::Error);
        assert_eq!(LifecycleState::from_provider("failed"), LifecycleState::Failed);
        assert_eq!(
            LifecycleState::from_provider("terminated"),
            LifecycleState::Terminated
        );
    }

    #[test]
    fn lifecycle_state_defaults_unrecognised_to_unknown() {
        let state = LifecycleState::from_provider("defragmenting");
        assert_eq!(state, LifecycleState::Unknown);
        assert!(!state.is_terminal_failure());
    }

    #[test]
    fn terminal_failure_covers_error_failed_terminated() {
        assert!(LifecycleState::Error.is_terminal_failure());
        assert!(LifecycleState::Failed.is_terminal_failure());
        assert!(LifecycleState::Terminated.is_terminal_failure());
        assert!(!LifecycleState::Running.is_terminal_failure());
        assert!(!LifecycleState::Pending.is_terminal_failure());
    }
}
