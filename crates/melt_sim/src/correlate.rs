//! Incident-to-signal correlation.
//!
//! Given one incident from the catalog, collects every record in the
//! generated streams that belongs to it, the way an investigator would
//! slice the data by time window and blast radius.

use chrono::{DateTime, Utc};
use melt_model::{
    EventKind, EventRecord, Incident, IncidentId, LogLevel, LogRecord, MetricRecord, TraceRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Borrowed view over one chunk of generated streams, typically one day.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamSlice<'a> {
    /// Events.
    pub events: &'a [EventRecord],
    /// Metrics.
    pub metrics: &'a [MetricRecord],
    /// Logs.
    pub logs: &'a [LogRecord],
    /// Traces.
    pub traces: &'a [TraceRecord],
}

/// Aggregate view of a correlation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    /// Matched events per type.
    pub events_by_kind: BTreeMap<EventKind, usize>,
    /// Matched metric records.
    pub metric_points: usize,
    /// Matched ERROR log lines.
    pub error_logs: usize,
    /// Matched WARNING log lines.
    pub warning_logs: usize,
    /// Matched spans with a 5xx status.
    pub failed_traces: usize,
    /// Mean duration of the matched spans.
    pub avg_trace_duration_ms: Option<f64>,
}

/// Every record attributed to one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Incident the records belong to.
    pub incident_id: IncidentId,
    /// Window searched, inclusive on both ends.
    pub window: (DateTime<Utc>, DateTime<Utc>),
    /// Events linked by id, or inside the window on an affected service.
    pub events: Vec<EventRecord>,
    /// Metrics of affected hosts inside the window.
    pub metrics: Vec<MetricRecord>,
    /// Logs of affected hosts inside the window.
    pub logs: Vec<LogRecord>,
    /// Spans of affected services inside the window.
    pub traces: Vec<TraceRecord>,
    /// Counts over the matched records.
    pub summary: CorrelationSummary,
}

/// Collects the records of `incident` from `slices`.
#[allow(clippy::cast_precision_loss)]
pub fn correlate(incident: &Incident, slices: &[StreamSlice<'_>]) -> Correlation {
    let (start, end) = (incident.start_time, incident.end_time);
    let in_window = |t: DateTime<Utc>| start <= t && t <= end;
    let on_service = |s: &str| incident.affected_services.contains(s);
    let on_host = |h: &str, s: &str| incident.affected_hosts.contains(h) && on_service(s);

    let mut events = Vec::new();
    let mut metrics = Vec::new();
    let mut logs = Vec::new();
    let mut traces = Vec::new();
    for slice in slices {
        events.extend(
            slice
                .events
                .iter()
                .filter(|e| {
                    e.incident_id.as_ref() == Some(&incident.id)
                        || (in_window(e.timestamp) && on_service(&e.service))
                })
                .cloned(),
        );
        metrics.extend(
            slice
                .metrics
                .iter()
                .filter(|m| in_window(m.timestamp) && on_host(&m.host_id, &m.service))
                .cloned(),
        );
        logs.extend(
            slice
                .logs
                .iter()
                .filter(|l| in_window(l.timestamp) && on_host(&l.host, &l.service))
                .cloned(),
        );
        traces.extend(
            slice
                .traces
                .iter()
                .filter(|t| in_window(t.timestamp) && on_service(&t.service_name))
                .cloned(),
        );
    }

    let mut summary = CorrelationSummary {
        metric_points: metrics.len(),
        error_logs: logs.iter().filter(|l| l.level == LogLevel::Error).count(),
        warning_logs: logs.iter().filter(|l| l.level == LogLevel::Warning).count(),
        failed_traces: traces.iter().filter(|t| t.is_error()).count(),
        avg_trace_duration_ms: (!traces.is_empty())
            .then(|| traces.iter().map(|t| t.duration_ms).sum::<f64>() / traces.len() as f64),
        ..CorrelationSummary::default()
    };
    for event in &events {
        *summary.events_by_kind.entry(event.kind).or_insert(0) += 1;
    }

    Correlation {
        incident_id: incident.id.clone(),
        window: (start, end),
        events,
        metrics,
        logs,
        traces,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Generator;
    use crate::recorder::GroundTruthRecorder;
    use melt_model::{
        CloudProvider, GenerationConfig, Host, IncidentType, PlainNaming, ScriptedIncident,
        ServiceSpec,
    };

    #[test]
    fn correlation_finds_the_incident_signals() {
        let mut config = GenerationConfig::default().with_days(1).with_granularity(30);
        config.topology.services = vec![ServiceSpec::new("api", &["db"]), ServiceSpec::new("db", &[])];
        config.topology.hosts_per_service = 2;
        config.incidents.daily_incident_probability = 0.0;
        config.incidents.shared_resource_service = None;
        config.synthesis.requests_per_step = 20;
        config.incidents.scripted = vec![ScriptedIncident {
            day: 0,
            incident_type: IncidentType::DbContention,
            service: "db".into(),
            host_index: 1,
            start_minute: 600,
            duration_minutes: 180,
        }];
        let generator = Generator::new(config, Box::new(PlainNaming)).unwrap();
        let mut recorder = GroundTruthRecorder::new();
        let day = generator.generate_day(0, &mut recorder).unwrap();
        let incident = recorder.incidents()[0].clone();

        let slice = StreamSlice {
            events: &day.events,
            metrics: &day.metrics,
            logs: &day.logs,
            traces: &day.traces,
        };
        let found = correlate(&incident, &[slice]);

        assert_eq!(found.incident_id, incident.id);
        assert_eq!(found.summary.events_by_kind[&EventKind::AlertTrigger], 1);
        assert_eq!(found.summary.events_by_kind[&EventKind::IncidentResolved], 1);
        assert!(found.metrics.iter().all(|m| m.host_id == "db-01"));
        assert_eq!(found.summary.metric_points, 7);
        assert!(found.summary.error_logs > 0);
        assert!(found.logs.iter().all(|l| l.host == "db-01"));
        assert!(found.traces.iter().all(|t| t.service_name == "db"));
        assert!(found.summary.avg_trace_duration_ms.is_some());
    }

    #[test]
    fn empty_slices_yield_an_empty_correlation() {
        let host = Host::new("web-00", "web", CloudProvider::Onpremise, "dc1");
        let start = GenerationConfig::default().start_of_day(0);
        let incident = Incident::new(
            IncidentId::new("inc-empty"),
            IncidentType::MemoryLeak,
            &host,
            start,
            start + chrono::Duration::hours(1),
        );
        let found = correlate(&incident, &[StreamSlice::default()]);
        assert!(found.events.is_empty());
        assert_eq!(found.summary, CorrelationSummary::default());
    }
}
