//! Spot capacity probing across candidate locations.
//!
//! The scan is sequential by design: first found wins, and stopping at the
//! first hit avoids wasted provider calls. A transport error in one
//! location is swallowed and treated as "not available there" so a
//! transient outage in one fault domain never blocks discovery of capacity
//! in another; when every location errors or reports false the aggregate
//! outcome is simply not-available, never an error.

use tracing::debug;

use crate::provider::{Location, Provider, ProviderError};
use crate::shape::{ResourceShape, Sku};

/// Ordered candidate locations scanned when the caller does not pin one.
pub const DEFAULT_LOCATIONS: [&str; 3] = ["FIN-01", "FIN-02", "FIN-03"];

/// Returns the default candidate set as owned [`Location`] values.
#[must_use]
pub fn default_locations() -> Vec<Location> {
    DEFAULT_LOCATIONS.iter().copied().map(Location::from).collect()
}

/// Result of one availability probe pass. Derived fresh per pass and never
/// persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AvailabilityOutcome {
    /// Whether any scanned location reported capacity.
    pub available: bool,
    /// First location that reported capacity, when available.
    pub location: Option<Location>,
    /// SKU that was probed.
    pub sku: Sku,
    /// Logical shape the SKU was resolved from.
    pub shape: ResourceShape,
}

impl AvailabilityOutcome {
    /// Outcome for capacity found at `location`.
    #[must_use]
    pub const fn found(location: Location, sku: Sku, shape: ResourceShape) -> Self {
        Self {
            available: true,
            location: Some(location),
            sku,
            shape,
        }
    }

    /// Outcome for no capacity anywhere in the scanned set.
    #[must_use]
    pub const fn not_found(sku: Sku, shape: ResourceShape) -> Self {
        Self {
            available: false,
            location: None,
            sku,
            shape,
        }
    }
}

/// Probes spot capacity through a [`Provider`].
#[derive(Clone, Debug)]
pub struct CapacityProber<P> {
    provider: P,
}

impl<P: Provider> CapacityProber<P> {
    /// Creates a prober over the given provider transport.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Checks a single location for spot capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the remote check itself fails. Callers
    /// scanning several locations should prefer [`Self::probe_any`], which
    /// applies the fail-open-per-location policy instead.
    pub async fn probe(&self, sku: &Sku, location: &Location) -> Result<bool, ProviderError> {
        self.provider.capacity_available(sku, true, location).await
    }

    /// Scans `locations` in order, short-circuiting on the first hit.
    ///
    /// Per-location transport errors are logged and treated as absence; the
    /// scan continues with the next location. This function never fails.
    pub async fn probe_any(
        &self,
        shape: ResourceShape,
        sku: &Sku,
        locations: &[Location],
    ) -> AvailabilityOutcome {
        for location in locations {
            match self.probe(sku, location).await {
                Ok(true) => {
                    debug!(%sku, %location, "spot capacity available");
                    return AvailabilityOutcome::found(location.clone(), sku.clone(), shape);
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(%sku, %location, error = %err, "probe failed; treating as unavailable");
                }
            }
        }
        AvailabilityOutcome::not_found(sku.clone(), shape)
    }
}
