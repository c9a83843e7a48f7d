//! Request-level logs and trace spans.
//!
//! Every simulated request produces one span and one log line sharing a
//! trace id. Active incidents each roll independently for a failure.

use crate::lifecycle::combine_max;
use crate::rng::{gauss, span_id, trace_id};
use chrono::{DateTime, Duration, Utc};
use melt_model::{Host, Incident, IncidentType, LogLevel, LogRecord, TraceRecord};
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;

const OPERATION: &str = "GET /api/v1/resource";

/// An incident affecting the host at the current step, with its severity.
#[derive(Debug, Clone, Copy)]
pub struct ActiveIncident<'a> {
    /// The incident.
    pub incident: &'a Incident,
    /// Its severity multiplier at this step.
    pub severity: f64,
}

/// Chance that a request fails while an incident of this type is at full
/// severity.
pub const fn failure_rate(incident_type: IncidentType) -> f64 {
    match incident_type {
        IncidentType::NetworkPartition | IncidentType::CascadingFailure => 0.6,
        IncidentType::ResourceExhaustion | IncidentType::DbContention => 0.5,
        _ => 0.3,
    }
}

/// Error log line for a request failed by `incident`.
pub fn failure_message(incident: &Incident) -> String {
    match incident.incident_type {
        IncidentType::DbContention => {
            "ConnectionPoolTimeoutException: Unable to acquire connection from pool".into()
        }
        IncidentType::MemoryLeak => "java.lang.OutOfMemoryError: Java heap space".into(),
        IncidentType::NetworkPartition | IncidentType::NetworkPacketLoss => {
            "NetworkException: Connection timeout to upstream service".into()
        }
        IncidentType::DependencyDegradation => format!(
            "UpstreamTimeoutException: Service {} did not respond",
            incident.target_service
        ),
        IncidentType::CascadingFailure => {
            "CascadingFailureException: Multiple downstream services unavailable".into()
        }
        IncidentType::ResourceExhaustion => {
            "ResourceExhaustedException: Shared resource pool exhausted".into()
        }
        IncidentType::ConfigMismatch => {
            "ConfigurationError: Service configuration mismatch detected".into()
        }
        IncidentType::CpuSaturation => {
            "CpuSaturationException: CPU utilization exceeded threshold".into()
        }
    }
}

/// Emits `count` requests for `host` inside the step starting at `t`.
#[allow(clippy::too_many_arguments)]
pub fn emit_requests<R: Rng>(
    rng: &mut R,
    host: &Host,
    t: DateTime<Utc>,
    step: Duration,
    active: &[ActiveIncident<'_>],
    count: u32,
    logs: &mut Vec<LogRecord>,
    traces: &mut Vec<TraceRecord>,
) {
    let max_severity = combine_max(active.iter().map(|a| a.severity));
    let strongest = active
        .iter()
        .filter(|a| a.severity > 0.0)
        .fold(None::<&ActiveIncident<'_>>, |best, a| match best {
            Some(b) if b.severity >= a.severity => Some(b),
            _ => Some(a),
        });
    let step_seconds = step.num_seconds().max(1);

    for _ in 0..count {
        let timestamp = t + Duration::seconds(rng.gen_range(0..step_seconds));
        let trace = trace_id(rng);
        let span = span_id(rng);

        let mut failed: Option<&Incident> = None;
        for a in active {
            let p = (failure_rate(a.incident.incident_type) * a.severity).clamp(0.0, 1.0);
            if rng.gen_bool(p) && failed.is_none() {
                failed = Some(a.incident);
            }
        }

        let (status_code, duration_ms, level, message, link) = if let Some(incident) = failed {
            let duration = if incident.incident_type == IncidentType::DependencyDegradation {
                rng.gen_range(1000..=3000)
            } else {
                rng.gen_range(500..=2000)
            };
            (500, f64::from(duration), LogLevel::Error, failure_message(incident), Some(incident))
        } else {
            let duration = gauss(rng, 50.0, 10.0) * (1.0 + 4.0 * max_severity);
            let duration = (duration.max(1.0) * 100.0).round() / 100.0;
            match strongest {
                Some(a) if rng.gen_bool((0.1 * a.severity).clamp(0.0, 1.0)) => (
                    200,
                    duration,
                    LogLevel::Warning,
                    format!("Performance degradation detected: {}", a.incident.incident_type),
                    Some(a.incident),
                ),
                _ => (200, duration, LogLevel::Info, format!("Processed request {trace}"), None),
            }
        };

        let mut metadata = BTreeMap::new();
        if let Some(incident) = link {
            metadata.insert("incident_id".into(), Value::from(incident.id.as_str()));
            metadata.insert("incident_type".into(), Value::from(incident.incident_type.as_str()));
        }

        traces.push(TraceRecord {
            trace_id: trace.clone(),
            span_id: span,
            timestamp,
            service_name: host.service.clone(),
            operation: OPERATION.into(),
            duration_ms,
            status_code,
            attributes: span_attributes(host),
        });
        logs.push(LogRecord {
            timestamp,
            level,
            service: host.service.clone(),
            host: host.id.clone(),
            cloud_provider: host.cloud_provider,
            region: host.region.clone(),
            trace_id: trace,
            message,
            metadata,
        });
    }
}

fn span_attributes(host: &Host) -> BTreeMap<String, Value> {
    let mut attributes = BTreeMap::from([
        ("http.method".to_string(), Value::from("GET")),
        ("host.name".to_string(), Value::from(host.id.as_str())),
        ("cloud.provider".to_string(), Value::from(host.cloud_provider.as_str())),
        ("cloud.region".to_string(), Value::from(host.region.as_str())),
    ]);
    for (key, value) in &host.metadata {
        attributes
            .entry(format!("cloud.{key}"))
            .or_insert_with(|| value.clone());
    }
    attributes
}
