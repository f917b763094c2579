//! Configuration loading via `ortho-config`.
//!
//! The loaded value is a snapshot: it is passed explicitly into the
//! components that need it and never cached behind a module-level
//! variable, so concurrent monitors cannot race on shared configuration.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::probe::default_locations;
use crate::provider::Location;
use crate::shape::{GpuKind, ResourceShape};

/// Verda specific configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "VERDA")]
pub struct VerdaConfig {
    /// OAuth client identifier for the Verda API. Required.
    pub client_id: String,
    /// OAuth client secret used for authentication. Required.
    pub client_secret: String,
    /// GPU family requested when the caller does not name one.
    #[ortho_config(default = "B300".to_owned())]
    pub default_gpu_type: String,
    /// GPU count requested when the caller does not name one.
    #[ortho_config(default = 1)]
    pub default_gpu_count: u32,
    /// Location used for creation when the caller does not pin one.
    #[ortho_config(default = "FIN-03".to_owned())]
    pub default_location: String,
    /// OS image used when the caller does not name one.
    #[ortho_config(default = "ubuntu-24.04-cuda-12.8-open-docker".to_owned())]
    pub default_image: String,
    /// Prefix for generated hostnames.
    #[ortho_config(default = "spot-gpu".to_owned())]
    pub hostname_prefix: String,
    /// Readiness wait budget in seconds.
    #[ortho_config(default = 600)]
    pub ready_timeout_secs: u64,
    /// Readiness poll cadence in seconds.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Pause between availability checks in seconds.
    #[ortho_config(default = 30)]
    pub check_interval_secs: u64,
    /// Total availability checks before a watch gives up.
    #[ortho_config(default = 60)]
    pub max_checks: u32,
    /// Volume attached to new instances when the caller omits one.
    pub default_volume_id: Option<String>,
    /// Startup script attached to new instances when the caller omits one.
    /// Updated on disk through the config store, never by the core.
    pub default_script_id: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl VerdaConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in skyhook.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values merge defaults, configuration files, and environment
    /// variables in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skyhook")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is
    /// empty, or [`ConfigError::InvalidValue`] when the default GPU type
    /// does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.client_id,
            &FieldMetadata::new("Verda client ID", "VERDA_CLIENT_ID", "client_id", "verda"),
        )?;
        Self::require_field(
            &self.client_secret,
            &FieldMetadata::new(
                "Verda client secret",
                "VERDA_CLIENT_SECRET",
                "client_secret",
                "verda",
            ),
        )?;
        Self::require_field(
            &self.default_gpu_type,
            &FieldMetadata::new(
                "GPU type",
                "VERDA_DEFAULT_GPU_TYPE",
                "default_gpu_type",
                "verda",
            ),
        )?;
        Self::require_field(
            &self.default_location,
            &FieldMetadata::new(
                "location",
                "VERDA_DEFAULT_LOCATION",
                "default_location",
                "verda",
            ),
        )?;
        Self::require_field(
            &self.default_image,
            &FieldMetadata::new("OS image", "VERDA_DEFAULT_IMAGE", "default_image", "verda"),
        )?;
        Self::require_field(
            &self.hostname_prefix,
            &FieldMetadata::new(
                "hostname prefix",
                "VERDA_HOSTNAME_PREFIX",
                "hostname_prefix",
                "verda",
            ),
        )?;
        self.default_shape().map(|_| ())
    }

    /// Resolves the configured default shape.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the configured GPU type
    /// does not parse.
    pub fn default_shape(&self) -> Result<ResourceShape, ConfigError> {
        let kind: GpuKind = self
            .default_gpu_type
            .parse()
            .map_err(|err: crate::shape::ParseGpuKindError| {
                ConfigError::InvalidValue(err.to_string())
            })?;
        Ok(ResourceShape::new(kind, self.default_gpu_count))
    }

    /// Merges caller-supplied shape parts with the configured defaults.
    /// Either half may be omitted independently.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the fallback GPU type is
    /// needed and does not parse.
    pub fn shape_with(
        &self,
        kind: Option<GpuKind>,
        count: Option<u32>,
    ) -> Result<ResourceShape, ConfigError> {
        let resolved_kind = kind
            .map(Ok)
            .unwrap_or_else(|| self.default_shape().map(|shape| shape.kind))?;
        let resolved_count = count.unwrap_or(self.default_gpu_count);
        Ok(ResourceShape::new(resolved_kind, resolved_count))
    }

    /// Returns the configured default location.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::from(self.default_location.as_str())
    }

    /// Returns the candidate scan set: the pinned location alone when the
    /// caller supplied one, otherwise the full default ordered set.
    #[must_use]
    pub fn locations_for(&self, pinned: Option<Location>) -> Vec<Location> {
        pinned.map_or_else(default_locations, |location| vec![location])
    }

    /// Readiness wait budget as a [`Duration`].
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Readiness poll cadence as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Availability check cadence as a [`Duration`].
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value failed semantic validation.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
