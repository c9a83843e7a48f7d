//! Event stream: incident lifecycle events plus ambient operations noise.

use crate::rng::RngStreams;
use crate::topology::Topology;
use chrono::{DateTime, Duration, Timelike, Utc};
use melt_model::{EventKind, EventRecord, EventSeverity, GenerationConfig, Incident, IncidentType};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Minutes between `INCIDENT_UPDATE` events on an open primary.
pub const UPDATE_INTERVAL_MINUTES: i64 = 30;

const USERS: [&str; 4] = ["alice", "bob", "charlie", "diana"];
const ONCALL: [&str; 3] = ["engineer1", "engineer2", "sre-team"];

/// Builds the events of one simulated day.
#[derive(Debug, Clone, Copy)]
pub struct EventSynthesizer<'a> {
    config: &'a GenerationConfig,
    topology: &'a Topology,
    streams: RngStreams,
    day: u32,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
}

impl<'a> EventSynthesizer<'a> {
    /// Creates a synthesizer for `day`.
    pub fn new(config: &'a GenerationConfig, topology: &'a Topology, day: u32) -> Self {
        let day_start = config.start_of_day(day);
        Self {
            config,
            topology,
            streams: RngStreams::new(config.seed),
            day,
            day_start,
            day_end: day_start + Duration::days(1),
        }
    }

    /// Events of the day, unsorted.
    ///
    /// `incidents` must hold every incident overlapping the day; a
    /// secondary's parent is looked up among them.
    pub fn synthesize(&self, incidents: &[Incident]) -> Vec<EventRecord> {
        let by_id: HashMap<&str, &Incident> =
            incidents.iter().map(|i| (i.id.as_str(), i)).collect();

        let mut events = Vec::new();
        for incident in incidents {
            let parent = incident
                .cascaded_from
                .as_ref()
                .and_then(|id| by_id.get(id.as_str()).copied());
            self.lifecycle(incident, parent, &mut events);
        }

        let mut rng = self.streams.stream(self.day, "ambient", "events");
        self.maintenance(&mut rng, &mut events);
        let step = self.config.step();
        let mut t = self.day_start;
        while t < self.day_end {
            let active: Vec<&Incident> = incidents.iter().filter(|i| i.covers(t)).collect();
            self.ambient_step(&mut rng, t, &active, &mut events);
            t += step;
        }
        events
    }

    fn in_day(&self, t: DateTime<Utc>) -> bool {
        self.day_start <= t && t < self.day_end
    }

    fn lifecycle(&self, incident: &Incident, parent: Option<&Incident>, out: &mut Vec<EventRecord>) {
        let mut rng = self.streams.stream(self.day, incident.id.as_str(), "events");
        let linked = |kind, severity, message: String, t| {
            EventRecord::new(t, kind, severity, incident.target_service.as_str(), message)
                .with_source(incident.target_host.as_str())
                .with_region(incident.region.as_str())
                .with_incident(incident.id.clone(), incident.incident_type)
        };

        if self.in_day(incident.start_time) {
            if incident.is_primary() {
                let metric = incident.incident_type.root_metric();
                out.push(
                    linked(
                        EventKind::AlertTrigger,
                        EventSeverity::from(incident.severity),
                        format!(
                            "Threshold breach: {metric} exceeded limit. Incident type: {}",
                            incident.incident_type
                        ),
                        incident.start_time,
                    )
                    .with_detail("metric", metric)
                    .with_detail("threshold_value", rng.gen_range(80..=95_u32))
                    .with_detail("current_value", rng.gen_range(95..=100_u32))
                    .with_detail("alert_rule", format!("{metric}_threshold"))
                    .with_detail("oncall_acknowledged", rng.gen_bool(0.5)),
                );
            } else {
                let mut event = linked(
                    EventKind::CascadeTrigger,
                    EventSeverity::High,
                    format!(
                        "Cascading failure detected: {} affected by upstream issue",
                        incident.target_service
                    ),
                    incident.start_time,
                )
                .with_detail("hop", incident.hop);
                if let Some(root) = &incident.root_incident {
                    event = event.with_detail("primary_incident_id", root.as_str());
                }
                if let Some(parent) = parent {
                    event = event
                        .with_detail("parent_incident_id", parent.id.as_str())
                        .with_detail("upstream_service", parent.target_service.as_str())
                        .with_detail(
                            "propagation_delay_minutes",
                            (incident.start_time - parent.start_time).num_minutes(),
                        );
                }
                out.push(event);
            }
        }

        if incident.is_primary() {
            let mut t = incident.start_time + Duration::minutes(UPDATE_INTERVAL_MINUTES);
            while t < incident.end_time && t < self.day_end {
                if t >= self.day_start {
                    let (update_type, message) = update_message(&mut rng, incident);
                    out.push(
                        linked(
                            EventKind::IncidentUpdate,
                            EventSeverity::from(incident.severity),
                            message,
                            t,
                        )
                        .with_detail("update_type", update_type)
                        .with_detail("affected_hosts_count", incident.affected_hosts.len())
                        .with_detail(
                            "status",
                            pick(&mut rng, &["INVESTIGATING", "MITIGATING", "MONITORING"]),
                        )
                        .with_detail("updated_by", format!("oncall-{}", pick(&mut rng, &ONCALL))),
                    );
                }
                t += Duration::minutes(UPDATE_INTERVAL_MINUTES);
            }
        }

        if self.in_day(incident.end_time) {
            let minutes = incident.duration().num_minutes();
            let action = pick(
                &mut rng,
                &[
                    "Auto-recovery",
                    "Manual fix",
                    "Rollback",
                    "Configuration change",
                    "Resource scaling",
                ],
            );
            out.push(
                linked(
                    EventKind::IncidentResolved,
                    EventSeverity::Info,
                    format!(
                        "Incident resolved: {} after {minutes} minutes",
                        incident.incident_type
                    ),
                    incident.end_time,
                )
                .with_detail("duration_minutes", minutes)
                .with_detail("resolution_action", action),
            );
        }
    }

    fn maintenance(&self, rng: &mut ChaCha8Rng, out: &mut Vec<EventRecord>) {
        let window = self.config.synthesis.maintenance_window();
        if window.start_hour >= window.end_hour {
            return;
        }
        let services: Vec<&str> = self.sample_services(rng);
        let Some(first) = services.first() else {
            return;
        };
        let granularity = i64::from(self.config.generation.granularity_minutes);
        let started = self.day_start + Duration::hours(i64::from(window.start_hour));
        let completed =
            self.day_start + Duration::hours(i64::from(window.end_hour)) - Duration::minutes(granularity);
        out.push(
            EventRecord::new(
                started,
                EventKind::MaintenanceWindow,
                EventSeverity::Info,
                *first,
                "Scheduled maintenance window started",
            )
            .with_detail("status", "STARTED")
            .with_detail("affected_services", services.clone()),
        );
        out.push(
            EventRecord::new(
                completed.max(started),
                EventKind::MaintenanceWindow,
                EventSeverity::Info,
                *first,
                "Scheduled maintenance window completed",
            )
            .with_detail("status", "COMPLETED")
            .with_detail("affected_services", services),
        );
    }

    fn ambient_step(
        &self,
        rng: &mut ChaCha8Rng,
        t: DateTime<Utc>,
        active: &[&Incident],
        out: &mut Vec<EventRecord>,
    ) {
        self.deployment(rng, t, out);
        self.autoscale(rng, t, active, out);
        self.config_change(rng, t, out);
        if t.minute() % 30 == 0 {
            self.health_checks(rng, t, active, out);
        }
        self.service_restart(rng, t, active, out);
        self.user_action(rng, t, active, out);
    }

    fn deployment(&self, rng: &mut ChaCha8Rng, t: DateTime<Utc>, out: &mut Vec<EventRecord>) {
        if !rng.gen_bool(0.008) {
            return;
        }
        let Some(service) = self.topology.services().choose(rng) else {
            return;
        };
        let version = format!("v2.{}.{}", rng.gen_range(4..=6_u32), rng.gen_range(0..=9_u32));
        let rollback = rng.gen_bool(0.25);
        let mut event = EventRecord::new(
            t,
            EventKind::Deployment,
            if rollback { EventSeverity::Medium } else { EventSeverity::Info },
            service.as_str(),
            format!("Deployment {version} to {service}"),
        )
        .with_source("ci-cd")
        .with_detail("version", version)
        .with_detail("status", if rollback { "ROLLBACK" } else { "SUCCESS" })
        .with_detail("deployed_by", format!("user-{}", pick(rng, &USERS)));
        if let Some(region) = self.topology.occupied_regions().choose(rng) {
            event = event.with_region(*region);
        }
        out.push(event);
    }

    fn autoscale(
        &self,
        rng: &mut ChaCha8Rng,
        t: DateTime<Utc>,
        active: &[&Incident],
        out: &mut Vec<EventRecord>,
    ) {
        let probability = if active.is_empty() { 0.02 } else { 0.05 };
        if !rng.gen_bool(probability) {
            return;
        }
        let affected: Vec<(&str, &Incident)> = active
            .iter()
            .flat_map(|i| i.affected_services.iter().map(move |s| (s.as_str(), *i)))
            .collect();

        let (service, action, incident) = match affected.choose(rng) {
            Some((service, incident)) if rng.gen_bool(0.6) => (*service, "SCALE_UP", Some(*incident)),
            _ => {
                let Some(service) = self.topology.services().choose(rng) else {
                    return;
                };
                let action = if rng.gen_bool(2.0 / 3.0) { "SCALE_UP" } else { "SCALE_DOWN" };
                (service.as_str(), action, None)
            }
        };
        let trigger = match incident.map(|i| i.incident_type) {
            Some(IncidentType::CpuSaturation) => "CPU threshold",
            Some(IncidentType::MemoryLeak) => "Memory threshold",
            Some(IncidentType::DbContention | IncidentType::ResourceExhaustion) => "Request rate",
            Some(_) => "Latency threshold",
            None => pick(rng, &["CPU threshold", "Memory threshold", "Request rate", "Latency threshold"]),
        };
        let current: u32 = rng.gen_range(2..=8);
        let target = if action == "SCALE_UP" {
            rng.gen_range(3..=10_u32)
        } else {
            rng.gen_range(1..=5_u32)
        };
        let mut event = EventRecord::new(
            t,
            EventKind::Autoscale,
            EventSeverity::Info,
            service,
            format!("Auto-scaling {service}: {action}"),
        )
        .with_source("autoscaler")
        .with_detail("action", action)
        .with_detail("current_replicas", current)
        .with_detail("new_replicas", target)
        .with_detail("trigger", trigger);
        if let Some(incident) = incident {
            event = event.with_incident(incident.id.clone(), incident.incident_type);
        }
        out.push(event);
    }

    fn config_change(&self, rng: &mut ChaCha8Rng, t: DateTime<Utc>, out: &mut Vec<EventRecord>) {
        if !rng.gen_bool(0.01) {
            return;
        }
        let Some(service) = self.topology.services().choose(rng) else {
            return;
        };
        let key = pick(
            rng,
            &["feature_flag", "timeout", "connection_pool", "cache_size", "rate_limit"],
        );
        out.push(
            EventRecord::new(
                t,
                EventKind::ConfigChange,
                EventSeverity::Low,
                service.as_str(),
                format!("Configuration change: {key} updated for {service}"),
            )
            .with_detail("config_key", key)
            .with_detail("old_value", rng.gen_range(10..=100_u32).to_string())
            .with_detail("new_value", rng.gen_range(10..=100_u32).to_string())
            .with_detail("changed_by", format!("user-{}", pick(rng, &USERS[..3]))),
        );
    }

    fn health_checks(
        &self,
        rng: &mut ChaCha8Rng,
        t: DateTime<Utc>,
        active: &[&Incident],
        out: &mut Vec<EventRecord>,
    ) {
        for service in self.sample_services(rng) {
            let incident = active.iter().find(|i| i.affected_services.contains(service));
            let (status, liveness, readiness) = if incident.is_some() {
                let status = if rng.gen_bool(2.0 / 3.0) { "DEGRADED" } else { "UNHEALTHY" };
                (status, pass_fail(!rng.gen_bool(0.7)), pass_fail(!rng.gen_bool(0.6)))
            } else if rng.gen_bool(0.75) {
                ("HEALTHY", "PASS", "PASS")
            } else {
                ("DEGRADED", pass_fail(rng.gen_bool(0.5)), pass_fail(rng.gen_bool(0.5)))
            };
            let severity = match status {
                "HEALTHY" => EventSeverity::Info,
                "DEGRADED" => EventSeverity::Low,
                _ => EventSeverity::Medium,
            };
            let mut event = EventRecord::new(
                t,
                EventKind::HealthCheck,
                severity,
                service,
                format!("Health check for {service}: {status}"),
            )
            .with_source("health-checker")
            .with_detail("status", status)
            .with_detail("liveness", liveness)
            .with_detail("readiness", readiness);
            if let Some(incident) = incident {
                event = event.with_incident(incident.id.clone(), incident.incident_type);
            }
            out.push(event);
        }
    }

    fn service_restart(
        &self,
        rng: &mut ChaCha8Rng,
        t: DateTime<Utc>,
        active: &[&Incident],
        out: &mut Vec<EventRecord>,
    ) {
        let probability = if active.iter().any(|i| i.incident_type == IncidentType::MemoryLeak) {
            0.02
        } else if active.iter().any(|i| {
            matches!(
                i.incident_type,
                IncidentType::CpuSaturation | IncidentType::ResourceExhaustion
            )
        }) {
            0.01
        } else {
            0.003
        };
        if !rng.gen_bool(probability) {
            return;
        }
        let affected: Vec<(&str, &Incident)> = active
            .iter()
            .flat_map(|i| i.affected_hosts.iter().map(move |h| (h.as_str(), *i)))
            .collect();
        let (host, incident) = match affected.choose(rng) {
            Some((id, incident)) if rng.gen_bool(0.7) => (self.topology.host(id), Some(*incident)),
            _ => (self.topology.hosts().choose(rng), None),
        };
        let Some(host) = host else {
            return;
        };
        let reason = match incident.map(|i| i.incident_type) {
            Some(IncidentType::MemoryLeak) => pick(rng, &["OOM kill", "OOM kill", "Crash loop", "Manual restart"]),
            Some(_) => pick(rng, &["Crash loop", "OOM kill", "Manual restart"]),
            None => pick(
                rng,
                &["OOM kill", "Crash loop", "Manual restart", "Pod eviction", "Node maintenance"],
            ),
        };
        let mut event = EventRecord::new(
            t,
            EventKind::ServiceRestart,
            EventSeverity::Medium,
            host.service.as_str(),
            format!("Service restart: {} on {} - {reason}", host.service, host.id),
        )
        .with_source(host.id.as_str())
        .with_region(host.region.as_str())
        .with_detail("host_id", host.id.as_str())
        .with_detail("reason", reason)
        .with_detail("restart_count", rng.gen_range(1..=5_u32));
        if let Some(incident) = incident {
            event = event.with_incident(incident.id.clone(), incident.incident_type);
        }
        out.push(event);
    }

    fn user_action(
        &self,
        rng: &mut ChaCha8Rng,
        t: DateTime<Utc>,
        active: &[&Incident],
        out: &mut Vec<EventRecord>,
    ) {
        let probability = if active.is_empty() { 0.005 } else { 0.015 };
        if !rng.gen_bool(probability) {
            return;
        }
        let affected: Vec<(&str, &Incident)> = active
            .iter()
            .flat_map(|i| i.affected_services.iter().map(move |s| (s.as_str(), *i)))
            .collect();
        let (service, incident) = match affected.choose(rng) {
            Some((service, incident)) if rng.gen_bool(0.7) => (*service, Some(*incident)),
            _ => match self.topology.services().choose(rng) {
                Some(service) => (service.as_str(), None),
                None => return,
            },
        };
        let action = pick(rng, &["FORCE_RESTART", "TRAFFIC_SHIFT", "MANUAL_ROLLBACK", "FEATURE_TOGGLE"]);
        let reason = if incident.is_some() {
            pick(rng, &["Error spike", "Performance issue", "Customer report"])
        } else {
            pick(rng, &["Performance issue", "Error spike", "Customer report", "Preventive action"])
        };
        let mut event = EventRecord::new(
            t,
            EventKind::UserAction,
            EventSeverity::Low,
            service,
            format!("Manual action: {action} on {service}"),
        )
        .with_source("console")
        .with_detail("action", action)
        .with_detail("reason", reason)
        .with_detail("user", format!("user-{}", pick(rng, &USERS)));
        if let Some(incident) = incident {
            event = event.with_incident(incident.id.clone(), incident.incident_type);
        }
        out.push(event);
    }

    fn sample_services(&self, rng: &mut ChaCha8Rng) -> Vec<&'a str> {
        let services = self.topology.services();
        let k = rng.gen_range(1..=3).min(services.len());
        services.choose_multiple(rng, k).map(String::as_str).collect()
    }
}

fn pick<R: Rng>(rng: &mut R, options: &[&'static str]) -> &'static str {
    options.choose(rng).copied().unwrap_or("")
}

const fn pass_fail(pass: bool) -> &'static str {
    if pass {
        "PASS"
    } else {
        "FAIL"
    }
}

fn update_message<R: Rng>(rng: &mut R, incident: &Incident) -> (&'static str, String) {
    match rng.gen_range(0..3) {
        0 => (
            "ESCALATION",
            format!(
                "Incident {} escalated to {} - {} still affected",
                incident.id.short(),
                incident.severity,
                incident.target_service
            ),
        ),
        1 => (
            "UPDATE",
            format!(
                "Incident update: {} affecting {} hosts, investigation ongoing",
                incident.incident_type,
                incident.affected_hosts.len()
            ),
        ),
        _ => {
            let mitigation = pick(
                rng,
                &[
                    "Rolling restart initiated",
                    "Traffic shifted to healthy region",
                    "Configuration hotfix applied",
                    "Resource scaling triggered",
                ],
            );
            (
                "MITIGATION_ATTEMPT",
                format!("Mitigation attempt: {mitigation} for {}", incident.target_service),
            )
        }
    }
}

/// Sorts events into hand-off order.
pub fn sort_events(events: &mut [EventRecord]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
            .then_with(|| {
                let ids = |e: &EventRecord| e.incident_id.as_ref().map(|id| id.as_str().to_owned());
                ids(a).cmp(&ids(b))
            })
            .then_with(|| a.service.cmp(&b.service))
            .then_with(|| a.message.cmp(&b.message))
    });
}
