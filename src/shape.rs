//! Logical resource shapes and the SKU resolver.
//!
//! A caller asks for an accelerator family and a count; the provider bills
//! against an opaque stock-keeping unit string. The mapping is a fixed
//! table: not every family and count combination exists, and an absent
//! entry is an expected outcome rather than an error here. Callers that
//! need a hard failure wrap the miss themselves.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Accelerator families the resolver knows about.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GpuKind {
    /// B300 accelerators.
    B300,
    /// B200 accelerators.
    B200,
    /// GB300 superchip nodes.
    Gb300,
    /// H200 accelerators.
    H200,
}

impl GpuKind {
    /// Canonical provider spelling of the family name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::B300 => "B300",
            Self::B200 => "B200",
            Self::Gb300 => "GB300",
            Self::H200 => "H200",
        }
    }
}

impl fmt::Display for GpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a GPU family name cannot be parsed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown GPU type '{0}' (expected one of B300, B200, GB300, H200)")]
pub struct ParseGpuKindError(String);

impl FromStr for GpuKind {
    type Err = ParseGpuKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "B300" => Ok(Self::B300),
            "B200" => Ok(Self::B200),
            "GB300" => Ok(Self::Gb300),
            "H200" => Ok(Self::H200),
            other => Err(ParseGpuKindError(other.to_owned())),
        }
    }
}

/// Opaque provider stock-keeping identifier for a resource configuration.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Sku(String);

impl Sku {
    /// Wraps a raw SKU string.
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

impl From<&str> for Sku {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical resource request: accelerator family plus count. Immutable
/// value type; resolved to a [`Sku`] before any provider call.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ResourceShape {
    /// Accelerator family.
    pub kind: GpuKind,
    /// Number of accelerators requested.
    pub count: u32,
}

impl ResourceShape {
    /// Builds a shape. Validity of the count is decided by [`Self::sku`],
    /// not here, so the resolver stays the single source of truth.
    #[must_use]
    pub const fn new(kind: GpuKind, count: u32) -> Self {
        Self { kind, count }
    }

    /// Resolves the shape to the provider's SKU string.
    ///
    /// Pure lookup over a fixed table; deterministic and total over the
    /// input domain. Returns `None` for any combination outside the table.
    /// An unknown count for a known family and an entirely unknown family
    /// are indistinguishable misses by design.
    #[must_use]
    pub fn sku(&self) -> Option<Sku> {
        let raw = match (self.kind, self.count) {
            (GpuKind::B300, 1) => "1B300.30V",
            (GpuKind::B300, 2) => "2B300.60V",
            (GpuKind::B300, 4) => "4B300.120V",
            (GpuKind::B300, 8) => "8B300.240V",
            (GpuKind::B200, 1) => "1B200.30V",
            (GpuKind::B200, 2) => "2B200.60V",
            (GpuKind::B200, 4) => "4B200.120V",
            (GpuKind::B200, 8) => "8B200.240V",
            (GpuKind::Gb300, 1) => "1GB300.36V",
            (GpuKind::Gb300, 2) => "2GB300.72V",
            (GpuKind::Gb300, 4) => "4GB300.144V",
            (GpuKind::H200, 1) => "1H200.141S.44V",
            _ => return None,
        };
        Some(Sku::from(raw))
    }
}

impl fmt::Display for ResourceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.kind, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_combinations() {
        let cases = [
            (GpuKind::B300, 4, "4B300.120V"),
            (GpuKind::B200, 8, "8B200.240V"),
            (GpuKind::Gb300, 2, "2GB300.72V"),
            (GpuKind::H200, 1, "1H200.141S.44V"),
        ];
        for (kind, count, expected) in cases {
            let sku = ResourceShape::new(kind, count).sku();
            assert_eq!(sku, Some(Sku::from(expected)), "{kind} x{count}");
        }
    }

    #[test]
    fn unsupported_count_for_known_kind_misses() {
        assert_eq!(ResourceShape::new(GpuKind::H200, 8).sku(), None);
        assert_eq!(ResourceShape::new(GpuKind::Gb300, 8).sku(), None);
        assert_eq!(ResourceShape::new(GpuKind::B300, 3).sku(), None);
        assert_eq!(ResourceShape::new(GpuKind::B300, 0).sku(), None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let shape = ResourceShape::new(GpuKind::B300, 2);
        assert_eq!(shape.sku(), shape.sku());
    }

    #[test]
    fn gpu_kind_parses_case_insensitively() {
        assert_eq!("b300".parse::<GpuKind>(), Ok(GpuKind::B300));
        assert_eq!(" GB300 ".parse::<GpuKind>(), Ok(GpuKind::Gb300));
        assert!("A100".parse::<GpuKind>().is_err());
    }
}
