//! Output records for the four telemetry streams.
//!
//! Records are plain serde structs. The field names are the wire format of
//! the daily JSON files.

use crate::fleet::CloudProvider;
use crate::incident::{IncidentId, IncidentType, SeverityClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One host's metrics at one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Timestep.
    pub timestamp: DateTime<Utc>,
    /// Host identifier.
    pub host_id: String,
    /// Owning service.
    pub service: String,
    /// Provider of the host.
    pub cloud_provider: CloudProvider,
    /// Region of the host.
    pub region: String,
    /// Provider-specific metric name to value.
    pub metrics: BTreeMap<String, f64>,
    /// Provider metadata of the host.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A primary incident started.
    AlertTrigger,
    /// A secondary incident started.
    CascadeTrigger,
    /// Periodic progress update on an open incident.
    IncidentUpdate,
    /// An incident ended.
    IncidentResolved,
    /// A service was deployed.
    Deployment,
    /// A service process restarted on one host.
    ServiceRestart,
    /// Scheduled maintenance started or completed.
    MaintenanceWindow,
    /// A service scaled its host pool.
    Autoscale,
    /// A configuration value was changed.
    ConfigChange,
    /// Periodic health check.
    HealthCheck,
    /// An operator did something.
    UserAction,
}

impl EventKind {
    /// Returns the wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlertTrigger => "ALERT_TRIGGER",
            Self::CascadeTrigger => "CASCADE_TRIGGER",
            Self::IncidentUpdate => "INCIDENT_UPDATE",
            Self::IncidentResolved => "INCIDENT_RESOLVED",
            Self::Deployment => "DEPLOYMENT",
            Self::ServiceRestart => "SERVICE_RESTART",
            Self::MaintenanceWindow => "MAINTENANCE_WINDOW",
            Self::Autoscale => "AUTOSCALE",
            Self::ConfigChange => "CONFIG_CHANGE",
            Self::HealthCheck => "HEALTH_CHECK",
            Self::UserAction => "USER_ACTION",
        }
    }

    /// Returns true for events emitted by the incident lifecycle.
    pub const fn is_lifecycle(self) -> bool {
        matches!(
            self,
            Self::AlertTrigger
                | Self::CascadeTrigger
                | Self::IncidentUpdate
                | Self::IncidentResolved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventSeverity {
    /// Page someone now.
    Critical,
    /// Page during business hours.
    High,
    /// Ticket.
    Medium,
    /// Informational warning.
    Low,
    /// Informational.
    Info,
}

impl From<SeverityClass> for EventSeverity {
    fn from(class: SeverityClass) -> Self {
        match class {
            SeverityClass::P1 => Self::Critical,
            SeverityClass::P2 => Self::High,
            SeverityClass::P3 => Self::Medium,
        }
    }
}

/// A discrete event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Event category.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event severity.
    pub severity: EventSeverity,
    /// Emitting system.
    pub source: String,
    /// Service the event concerns.
    pub service: String,
    /// Region the event concerns, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Incident the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<IncidentId>,
    /// Type of that incident.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_type: Option<IncidentType>,
    /// Human-readable message.
    pub message: String,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl EventRecord {
    /// Creates an event with no incident link and no details.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: EventKind,
        severity: EventSeverity,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            severity,
            source: "monitoring".to_string(),
            service: service.into(),
            region: None,
            incident_id: None,
            incident_type: None,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Sets the emitting system.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Links the event to an incident.
    #[must_use]
    pub fn with_incident(mut self, id: IncidentId, incident_type: IncidentType) -> Self {
        self.incident_id = Some(id);
        self.incident_type = Some(incident_type);
        self
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Normal operation.
    Info,
    /// Degraded operation.
    Warning,
    /// Failed request.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// One application log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the line was written.
    pub timestamp: DateTime<Utc>,
    /// Log level.
    pub level: LogLevel,
    /// Emitting service.
    pub service: String,
    /// Emitting host.
    pub host: String,
    /// Provider of the host.
    pub cloud_provider: CloudProvider,
    /// Region of the host.
    pub region: String,
    /// Trace the line belongs to.
    pub trace_id: String,
    /// Log message.
    pub message: String,
    /// Extra structured fields (incident link on failures).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// One trace span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Trace identifier, 32 hex digits.
    pub trace_id: String,
    /// Span identifier, 16 hex digits.
    pub span_id: String,
    /// Span start.
    pub timestamp: DateTime<Utc>,
    /// Serving service.
    pub service_name: String,
    /// Operation name.
    pub operation: String,
    /// Span duration in milliseconds.
    pub duration_ms: f64,
    /// HTTP status code.
    pub status_code: u16,
    /// Span attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl TraceRecord {
    /// Returns true for server-error spans.
    pub const fn is_error(&self) -> bool {
        self.status_code >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn event_wire_format() {
        let event = EventRecord::new(
            at_noon(),
            EventKind::AlertTrigger,
            EventSeverity::Critical,
            "web-frontend",
            "cpu_utilization alert",
        )
        .with_incident(IncidentId::new("abc"), IncidentType::CpuSaturation)
        .with_detail("root_cause", true);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ALERT_TRIGGER");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["incident_id"], "abc");
        assert_eq!(json["incident_type"], "CPU_SATURATION");
        assert_eq!(json["details"]["root_cause"], true);
        assert!(json.get("region").is_none());
    }

    #[test]
    fn severity_class_maps_to_event_severity() {
        assert_eq!(EventSeverity::from(SeverityClass::P1), EventSeverity::Critical);
        assert_eq!(EventSeverity::from(SeverityClass::P3), EventSeverity::Medium);
    }

    #[test]
    fn lifecycle_kinds() {
        assert!(EventKind::CascadeTrigger.is_lifecycle());
        assert!(!EventKind::HealthCheck.is_lifecycle());
        insta::assert_snapshot!(LogLevel::Warning.to_string(), @"WARNING");
    }
}
