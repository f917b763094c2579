//! Core library for the Skyhook spot GPU capacity tool.
//!
//! The crate resolves logical GPU shapes to concrete Verda instance types,
//! probes locations for spot capacity, polls on a configurable cadence, and
//! deploys an ephemeral instance the moment capacity appears
//! (watch → claim → wait for readiness).

pub mod config;
pub mod config_store;
pub mod deploy;
pub mod lifecycle;
pub mod monitor;
pub mod probe;
pub mod provider;
pub mod shape;
pub mod test_support;
pub mod verda;

pub use config::{ConfigError, VerdaConfig};
pub use config_store::{ConfigStore, ConfigStoreError, ConfigWriter};
pub use deploy::{DeployError, DeployOrchestrator, DeployPlan, Deployment};
pub use lifecycle::{CreateRequest, LifecycleController, LifecycleError};
pub use monitor::{
    AttemptReport, AvailabilityMonitor, MonitorError, MonitorOutcome, MonitorPlan,
};
pub use probe::{AvailabilityOutcome, CapacityProber, DEFAULT_LOCATIONS, default_locations};
pub use provider::{
    CreateInstance, Instance, InstanceAction, InstanceId, LifecycleState, Location, Provider,
    ProviderError, ProviderFuture, SshKey,
};
pub use shape::{GpuKind, ParseGpuKindError, ResourceShape, Sku};
pub use verda::VerdaClient;
