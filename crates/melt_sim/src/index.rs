//! Per-day lookup of incidents by host.

use melt_model::Incident;
use std::collections::HashMap;

/// Incidents relevant to one day, indexed by affected host.
///
/// Incidents are held in `(start_time, id)` order so every lookup yields
/// them in the same order regardless of how they were produced.
#[derive(Debug, Clone, Default)]
pub struct ActiveIncidentIndex {
    incidents: Vec<Incident>,
    by_host: HashMap<String, Vec<usize>>,
}

impl ActiveIncidentIndex {
    /// Builds the index.
    pub fn build(mut incidents: Vec<Incident>) -> Self {
        incidents.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        let mut by_host: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, incident) in incidents.iter().enumerate() {
            for host in &incident.affected_hosts {
                by_host.entry(host.clone()).or_default().push(i);
            }
        }
        Self { incidents, by_host }
    }

    /// Incidents affecting `host`, in start order.
    pub fn for_host<'a>(&'a self, host: &str) -> impl Iterator<Item = &'a Incident> + 'a {
        self.by_host
            .get(host)
            .into_iter()
            .flatten()
            .map(move |i| &self.incidents[*i])
    }

    /// Every indexed incident, in start order.
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Number of indexed incidents.
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Returns true if no incident is indexed.
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}
