//! Incident model.
//!
//! Incident types form a closed enumeration. Everything that depends on the
//! type (phase profile, propagation mode, default probabilities) is an
//! exhaustive `match` here rather than a lookup keyed by name.

use crate::error::{Error, Result};
use crate::fleet::{CloudProvider, Host};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    /// Heap grows until the process thrashes.
    MemoryLeak,
    /// Database connection pool contention.
    DbContention,
    /// Short bursts of dropped packets.
    NetworkPacketLoss,
    /// CPU pinned at the ceiling.
    CpuSaturation,
    /// Service failure that spreads to its dependencies.
    CascadingFailure,
    /// Regional network partition.
    NetworkPartition,
    /// Upstream dependency is slow or failing.
    DependencyDegradation,
    /// Intermittent failures after a bad config push.
    ConfigMismatch,
    /// Shared resource pool exhausted.
    ResourceExhaustion,
}

/// How an incident type spreads beyond its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Breadth-first along service dependency edges.
    DependencyGraph,
    /// Every service with hosts in the target's region.
    Regional,
}

impl IncidentType {
    /// Number of incident types.
    pub const COUNT: usize = 9;

    /// All incident types, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::MemoryLeak,
        Self::DbContention,
        Self::NetworkPacketLoss,
        Self::CpuSaturation,
        Self::CascadingFailure,
        Self::NetworkPartition,
        Self::DependencyDegradation,
        Self::ConfigMismatch,
        Self::ResourceExhaustion,
    ];

    /// Position of this type in [`Self::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the catalog name of this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MemoryLeak => "MEMORY_LEAK",
            Self::DbContention => "DB_CONTENTION",
            Self::NetworkPacketLoss => "NETWORK_PACKET_LOSS",
            Self::CpuSaturation => "CPU_SATURATION",
            Self::CascadingFailure => "CASCADING_FAILURE",
            Self::NetworkPartition => "NETWORK_PARTITION",
            Self::DependencyDegradation => "DEPENDENCY_DEGRADATION",
            Self::ConfigMismatch => "CONFIG_MISMATCH",
            Self::ResourceExhaustion => "RESOURCE_EXHAUSTION",
        }
    }

    /// Root-cause metric alerting rules watch for this type.
    pub const fn root_metric(self) -> &'static str {
        match self {
            Self::MemoryLeak => "memory_usage",
            Self::DbContention => "db_connection_pool",
            Self::NetworkPacketLoss => "packet_loss",
            Self::CpuSaturation => "cpu_utilization",
            Self::CascadingFailure => "service_availability",
            Self::NetworkPartition => "network_connectivity",
            Self::DependencyDegradation => "upstream_latency",
            Self::ConfigMismatch => "config_drift",
            Self::ResourceExhaustion => "resource_pool",
        }
    }

    /// Severity class assigned to incidents of this type.
    pub const fn severity_class(self) -> SeverityClass {
        match self {
            Self::CpuSaturation | Self::CascadingFailure | Self::NetworkPartition => {
                SeverityClass::P1
            }
            Self::DbContention
            | Self::NetworkPacketLoss
            | Self::DependencyDegradation
            | Self::ResourceExhaustion => SeverityClass::P2,
            Self::MemoryLeak | Self::ConfigMismatch => SeverityClass::P3,
        }
    }

    /// Default probability that the incident spreads across one edge.
    pub const fn default_cascade_probability(self) -> f64 {
        match self {
            Self::MemoryLeak => 0.4,
            Self::DbContention => 0.8,
            Self::NetworkPacketLoss => 0.3,
            Self::CpuSaturation => 0.5,
            Self::CascadingFailure => 0.9,
            Self::NetworkPartition => 1.0,
            Self::DependencyDegradation => 0.7,
            Self::ConfigMismatch => 0.2,
            Self::ResourceExhaustion => 0.6,
        }
    }

    /// Default relative weight when drawing a random primary type.
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::MemoryLeak
            | Self::DbContention
            | Self::CascadingFailure
            | Self::DependencyDegradation => 0.15,
            Self::NetworkPacketLoss | Self::CpuSaturation | Self::NetworkPartition => 0.10,
            Self::ConfigMismatch | Self::ResourceExhaustion => 0.05,
        }
    }

    /// Default duration range in minutes, inclusive.
    pub const fn default_duration_minutes(self) -> (u32, u32) {
        match self {
            Self::MemoryLeak => (180, 360),
            Self::NetworkPacketLoss => (15, 60),
            Self::NetworkPartition => (30, 120),
            Self::CpuSaturation | Self::ResourceExhaustion => (60, 180),
            Self::DbContention | Self::CascadingFailure | Self::DependencyDegradation => {
                (60, 240)
            }
            Self::ConfigMismatch => (60, 360),
        }
    }

    /// Lifecycle phase profile for this type.
    pub const fn phase_profile(self) -> PhaseProfile {
        match self {
            // Linear-looking growth: most of the life is spent ramping.
            Self::MemoryLeak => PhaseProfile::new(0.05, 0.55, 0.25, 0.15),
            Self::NetworkPacketLoss | Self::NetworkPartition => {
                PhaseProfile::new(0.02, 0.03, 0.75, 0.20)
            }
            Self::CpuSaturation => PhaseProfile::new(0.03, 0.05, 0.72, 0.20),
            Self::DependencyDegradation => PhaseProfile::new(0.05, 0.15, 0.50, 0.30),
            Self::DbContention
            | Self::CascadingFailure
            | Self::ConfigMismatch
            | Self::ResourceExhaustion => PhaseProfile::DEFAULT,
        }
    }

    /// How incidents of this type spread.
    pub const fn propagation(self) -> Propagation {
        match self {
            Self::NetworkPartition => Propagation::Regional,
            _ => Propagation::DependencyGraph,
        }
    }

    /// Whether secondaries keep this type instead of becoming
    /// [`IncidentType::DependencyDegradation`].
    pub const fn propagates_verbatim(self) -> bool {
        matches!(self, Self::ResourceExhaustion | Self::NetworkPartition)
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityClass {
    /// Critical, customer-facing outage.
    P1,
    /// Major degradation.
    P2,
    /// Minor degradation.
    P3,
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        };
        f.write_str(label)
    }
}

/// Lifecycle phase of an incident at a point in time.
///
/// Phases are ordered; within one incident's life the phase never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Before start time.
    Scheduled,
    /// First moments of the failure.
    Onset,
    /// Severity climbing toward its peak.
    Ramping,
    /// Held at peak.
    Active,
    /// Severity decaying back to zero.
    Recovering,
    /// At or after end time.
    Resolved,
}

/// Fractions of an incident's duration spent in each live phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseProfile {
    /// Fraction spent in onset.
    pub onset: f64,
    /// Fraction spent ramping.
    pub ramp: f64,
    /// Fraction held at peak.
    pub active: f64,
    /// Fraction spent recovering.
    pub recovery: f64,
}

impl PhaseProfile {
    /// Profile used by types without a specific shape.
    pub const DEFAULT: Self = Self::new(0.03, 0.07, 0.60, 0.30);

    /// Creates a profile from phase fractions.
    pub const fn new(onset: f64, ramp: f64, active: f64, recovery: f64) -> Self {
        Self {
            onset,
            ramp,
            active,
            recovery,
        }
    }

    /// Fraction of the window at which the peak is reached.
    pub fn peak_start(&self) -> f64 {
        self.onset + self.ramp
    }

    /// Fraction of the window at which recovery begins.
    pub fn recovery_start(&self) -> f64 {
        self.onset + self.ramp + self.active
    }

    /// Checks that every fraction is positive and they sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPhaseProfile`] naming the offending type.
    pub fn validate(&self, incident_type: IncidentType) -> Result<()> {
        let fractions = [self.onset, self.ramp, self.active, self.recovery];
        if fractions.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(Error::InvalidPhaseProfile {
                incident_type: incident_type.to_string(),
                reason: format!("fractions must be positive, got {fractions:?}"),
            });
        }
        let total: f64 = fractions.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(Error::InvalidPhaseProfile {
                incident_type: incident_type.to_string(),
                reason: format!("fractions sum to {total}, expected 1"),
            });
        }
        Ok(())
    }
}

/// Identifier of an incident in the ground-truth catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(String);

impl IncidentId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first eight characters, for messages.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An injected incident, primary or cascaded.
///
/// `target_host` is always in `affected_hosts` and `target_service` always in
/// `affected_services`; both sets only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: IncidentId,
    /// Failure type.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Host the incident was injected on.
    pub target_host: String,
    /// Service owning the target host.
    pub target_service: String,
    /// Region of the target host.
    pub region: String,
    /// Provider of the target host.
    pub cloud_provider: CloudProvider,
    /// Inclusive start.
    pub start_time: DateTime<Utc>,
    /// Exclusive end; the incident is resolved from here on.
    pub end_time: DateTime<Utc>,
    /// Priority class.
    pub severity: SeverityClass,
    /// Peak severity multiplier in (0, 1].
    pub intensity: f64,
    /// Hosts perturbed by this incident.
    pub affected_hosts: BTreeSet<String>,
    /// Services perturbed by this incident.
    pub affected_services: BTreeSet<String>,
    /// Direct parent, for cascaded incidents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascaded_from: Option<IncidentId>,
    /// Primary ancestor, for cascaded incidents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_incident: Option<IncidentId>,
    /// Hops from the primary ancestor (0 for primaries).
    #[serde(default)]
    pub hop: u32,
    /// Direct cascade children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascading_incidents: Vec<IncidentId>,
}

impl Incident {
    /// Creates a primary incident targeting `host`.
    ///
    /// The severity class comes from the type and intensity starts at 1.
    #[must_use]
    pub fn new(
        id: IncidentId,
        incident_type: IncidentType,
        host: &Host,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            incident_type,
            target_host: host.id.clone(),
            target_service: host.service.clone(),
            region: host.region.clone(),
            cloud_provider: host.cloud_provider,
            start_time,
            end_time,
            severity: incident_type.severity_class(),
            intensity: 1.0,
            affected_hosts: BTreeSet::from([host.id.clone()]),
            affected_services: BTreeSet::from([host.service.clone()]),
            cascaded_from: None,
            root_incident: None,
            hop: 0,
            cascading_incidents: Vec::new(),
        }
    }

    /// Marks this incident as cascaded from `parent`.
    #[must_use]
    pub fn as_cascade_of(mut self, parent: &Self) -> Self {
        self.cascaded_from = Some(parent.id.clone());
        self.root_incident = Some(
            parent
                .root_incident
                .clone()
                .unwrap_or_else(|| parent.id.clone()),
        );
        self.hop = parent.hop + 1;
        self
    }

    /// Sets the peak severity multiplier, clamped to (0, 1].
    #[must_use]
    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity.clamp(f64::EPSILON, 1.0);
        self
    }

    /// Returns true if this incident was injected by the scheduler.
    pub const fn is_primary(&self) -> bool {
        self.cascaded_from.is_none()
    }

    /// Returns the incident duration.
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns true if `t` lies in `[start_time, end_time)`.
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        self.start_time <= t && t < self.end_time
    }

    /// Returns true if the incident window intersects `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start_time < to && from < self.end_time
    }

    /// Returns true once simulated time has reached the end time.
    pub fn is_resolved_at(&self, t: DateTime<Utc>) -> bool {
        t >= self.end_time
    }

    /// Adds a host (and its service) to the affected sets.
    pub fn add_affected(&mut self, host: &str, service: &str) {
        self.affected_hosts.insert(host.to_string());
        self.affected_services.insert(service.to_string());
    }

    /// Returns true if this incident perturbs `host`.
    pub fn affects_host(&self, host: &str) -> bool {
        self.affected_hosts.contains(host)
    }
}
