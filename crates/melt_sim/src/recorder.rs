//! Ground-truth recording.
//!
//! The recorder is an explicit accumulator owned by the driver and passed by
//! `&mut` into each day. It is append-only: incidents are never removed, and
//! each day contributes one [`IncidentDelta`].

use crate::scheduler::SchedulingConflict;
use crate::topology::Topology;
use chrono::{DateTime, NaiveDate, Utc};
use melt_model::{CloudProvider, GenerationConfig, Incident, IncidentId, IncidentType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Incidents created and resolved during one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDelta {
    /// Incidents recorded that day, primaries before their cascades.
    pub created: Vec<IncidentId>,
    /// Incidents whose end time falls inside the day.
    pub resolved: Vec<IncidentId>,
}

/// Append-only accumulator of every incident.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthRecorder {
    incidents: Vec<Incident>,
    by_id: HashMap<IncidentId, usize>,
    open: Vec<usize>,
    conflicts: Vec<SchedulingConflict>,
    days_recorded: u32,
}

impl GroundTruthRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Incidents not yet resolved at `t` (end time at or after `t`).
    pub fn open_at(&self, t: DateTime<Utc>) -> Vec<Incident> {
        self.open
            .iter()
            .map(|i| &self.incidents[*i])
            .filter(|inc| inc.end_time >= t)
            .cloned()
            .collect()
    }

    /// Records one day.
    ///
    /// `created` holds the day's new incidents. Returns the ids created and
    /// the ids (old or new) whose end time lies in `[day_start, day_end)`.
    pub fn record_day(
        &mut self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        created: Vec<Incident>,
        conflicts: Vec<SchedulingConflict>,
    ) -> IncidentDelta {
        let mut delta = IncidentDelta::default();
        for incident in created {
            delta.created.push(incident.id.clone());
            self.by_id.insert(incident.id.clone(), self.incidents.len());
            self.open.push(self.incidents.len());
            self.incidents.push(incident);
        }

        let mut resolved: Vec<&Incident> = self
            .open
            .iter()
            .map(|i| &self.incidents[*i])
            .filter(|inc| day_start <= inc.end_time && inc.end_time < day_end)
            .collect();
        resolved.sort_by(|a, b| a.end_time.cmp(&b.end_time).then_with(|| a.id.cmp(&b.id)));
        delta.resolved = resolved.into_iter().map(|inc| inc.id.clone()).collect();

        let incidents = &self.incidents;
        self.open.retain(|i| incidents[*i].end_time >= day_end);
        self.conflicts.extend(conflicts);
        self.days_recorded += 1;
        delta
    }

    /// Every recorded incident, in recording order.
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Looks up an incident by id.
    pub fn get(&self, id: &IncidentId) -> Option<&Incident> {
        self.by_id.get(id).map(|i| &self.incidents[*i])
    }

    /// Every skipped injection.
    pub fn conflicts(&self) -> &[SchedulingConflict] {
        &self.conflicts
    }

    /// Number of days recorded so far.
    pub const fn days_recorded(&self) -> u32 {
        self.days_recorded
    }

    /// Produces the catalog.
    pub fn finalize(&self, config: &GenerationConfig, topology: &Topology) -> Catalog {
        let mut incidents = self.incidents.clone();
        incidents.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        let mut incident_types = BTreeMap::new();
        let mut clouds = BTreeMap::new();
        for incident in &incidents {
            *incident_types.entry(incident.incident_type).or_insert(0) += 1;
            *clouds.entry(incident.cloud_provider).or_insert(0) += 1;
        }
        let primary_incidents = incidents.iter().filter(|i| i.is_primary()).count();

        Catalog {
            generation_config: CatalogSettings {
                start_date: config.generation.start_date,
                days_generated: self.days_recorded,
                granularity_minutes: config.generation.granularity_minutes,
                total_hosts: topology.hosts().len(),
                services: topology.services().to_vec(),
                regions: topology.occupied_regions().into_iter().map(String::from).collect(),
                seed: config.seed,
            },
            summary: CatalogSummary {
                total_incidents: incidents.len(),
                primary_incidents,
                cascading_incidents: incidents.len() - primary_incidents,
                incident_types,
                clouds,
                skipped_injections: self.conflicts.len(),
            },
            incidents,
            skipped_injections: self.conflicts.clone(),
        }
    }
}

/// Generation settings echoed into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// First simulated date.
    pub start_date: NaiveDate,
    /// Days actually generated.
    pub days_generated: u32,
    /// Minutes per timestep.
    pub granularity_minutes: u32,
    /// Fleet size.
    pub total_hosts: usize,
    /// Services in declaration order.
    pub services: Vec<String>,
    /// Regions holding at least one host.
    pub regions: Vec<String>,
    /// Master seed.
    pub seed: u64,
}

/// Aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// All incidents.
    pub total_incidents: usize,
    /// Scheduler-injected incidents.
    pub primary_incidents: usize,
    /// Cascade-created incidents.
    pub cascading_incidents: usize,
    /// Count per type.
    pub incident_types: BTreeMap<IncidentType, usize>,
    /// Count per provider of the target host.
    pub clouds: BTreeMap<CloudProvider, usize>,
    /// Injections skipped for lack of an eligible host.
    pub skipped_injections: usize,
}

/// The ground-truth catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Settings the run used.
    pub generation_config: CatalogSettings,
    /// Every incident, sorted by `(start_time, id)`.
    pub incidents: Vec<Incident>,
    /// Aggregate counts.
    pub summary: CatalogSummary,
    /// Every skipped injection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_injections: Vec<SchedulingConflict>,
}

impl Catalog {
    /// Finds an incident by full id or by an unambiguous prefix.
    pub fn find(&self, id_or_prefix: &str) -> Option<&Incident> {
        if let Some(exact) = self.incidents.iter().find(|i| i.id.as_str() == id_or_prefix) {
            return Some(exact);
        }
        let mut matches = self
            .incidents
            .iter()
            .filter(|i| i.id.as_str().starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(only), None) if !id_or_prefix.is_empty() => Some(only),
            _ => None,
        }
    }

    /// Scheduler-injected incidents, in start order.
    pub fn primaries(&self) -> impl Iterator<Item = &Incident> {
        self.incidents.iter().filter(|i| i.is_primary())
    }

    /// Direct cascade children of `id`, in start order.
    pub fn children_of<'a>(&'a self, id: &'a IncidentId) -> impl Iterator<Item = &'a Incident> + 'a {
        self.incidents
            .iter()
            .filter(move |i| i.cascaded_from.as_ref() == Some(id))
    }

    /// Renders the plain-text root-cause report.
    pub fn root_cause_report(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);
        let _ = writeln!(out, "{rule}\nROOT CAUSE REPORT\n{rule}");
        let _ = writeln!(
            out,
            "incidents: {} ({} primary, {} cascading)",
            self.summary.total_incidents,
            self.summary.primary_incidents,
            self.summary.cascading_incidents
        );
        let _ = writeln!(out, "skipped injections: {}", self.summary.skipped_injections);

        let mut totals: Vec<(IncidentType, usize, usize)> = Vec::new();
        for incident_type in IncidentType::ALL {
            let roots: Vec<&Incident> = self
                .primaries()
                .filter(|i| i.incident_type == incident_type)
                .collect();
            if roots.is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "\n{} x{} ({}, root metric {})",
                incident_type,
                roots.len(),
                incident_type.severity_class(),
                incident_type.root_metric()
            );
            let mut cascades = 0;
            for root in &roots {
                let _ = writeln!(
                    out,
                    "  {}  {} on {}  {} - {} ({} min)",
                    root.id,
                    root.target_service,
                    root.target_host,
                    root.start_time.format("%Y-%m-%d %H:%M"),
                    root.end_time.format("%H:%M"),
                    root.duration().num_minutes()
                );
                let _ = writeln!(
                    out,
                    "    affected: {} service(s), {} host(s)",
                    root.affected_services.len(),
                    root.affected_hosts.len()
                );
                cascades += self.render_children(&root.id, &mut out);
            }
            totals.push((incident_type, roots.len(), cascades));
        }

        let _ = writeln!(out, "\nSUMMARY");
        for (incident_type, roots, cascades) in totals {
            let _ = writeln!(
                out,
                "  {:<24} {roots:>3} root cause(s) {cascades:>3} cascading",
                incident_type.as_str()
            );
        }
        out
    }

    fn render_children(&self, id: &IncidentId, out: &mut String) -> usize {
        let mut count = 0;
        for child in self.children_of(id) {
            let indent = "  ".repeat(usize::try_from(child.hop).unwrap_or(0) + 1);
            let _ = writeln!(
                out,
                "{indent}-> {} on {} [{}] {} - {} (hop {})",
                child.incident_type,
                child.target_service,
                child.id.short(),
                child.start_time.format("%H:%M"),
                child.end_time.format("%H:%M"),
                child.hop
            );
            count += 1 + self.render_children(&child.id, out);
        }
        count
    }
}
