//! Error types for configuration loading and validation.

use thiserror::Error;

/// Errors that can occur before generation starts.
///
/// Every variant except the load errors is a configuration error: it is
/// raised once, up front, and aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Start date and day count do not form a usable range.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// Granularity is zero or does not divide a day evenly.
    #[error("invalid granularity: {0} minutes (must be > 0 and divide 1440)")]
    InvalidGranularity(u32),

    /// The fleet would contain no hosts.
    #[error("topology has no hosts: {0}")]
    ZeroHosts(String),

    /// No cloud is enabled, or the enabled clouds list no regions.
    #[error("no regions enabled across configured clouds")]
    NoRegions,

    /// The same service name appears twice.
    #[error("duplicate service '{0}'")]
    DuplicateService(String),

    /// A dependency edge points at a service that does not exist.
    #[error("service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency {
        /// Service declaring the edge.
        service: String,
        /// Missing dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle {
        /// Services along the cycle, first service repeated at the end.
        path: Vec<String>,
    },

    /// A setting references a service that does not exist.
    #[error("unknown service '{service}' referenced by {context}")]
    UnknownService {
        /// The missing service.
        service: String,
        /// Where it was referenced.
        context: String,
    },

    /// A probability or fraction falls outside its range.
    #[error("{field} must be within [0, 1], got {value}")]
    InvalidProbability {
        /// Setting name.
        field: String,
        /// Offending value.
        value: f64,
    },

    /// A duration range is empty or zero.
    #[error("invalid duration range for {context}: {min}..={max} minutes")]
    InvalidDuration {
        /// What the range belongs to.
        context: String,
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },

    /// A lifecycle phase profile does not partition the incident window.
    #[error("invalid phase profile for {incident_type}: {reason}")]
    InvalidPhaseProfile {
        /// Incident type owning the profile.
        incident_type: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other out-of-range setting.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns true for errors describing an invalid configuration, as
    /// opposed to a configuration that could not be read.
    pub const fn is_configuration(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Json(_) | Self::Yaml(_))
    }

    pub(crate) fn probability(field: impl Into<String>, value: f64) -> Self {
        Self::InvalidProbability {
            field: field.into(),
            value,
        }
    }
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;
