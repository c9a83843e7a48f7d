//! Cascade propagation.
//!
//! A primary incident spreads in one of two ways. Most types walk the
//! service dependency graph breadth-first, one Bernoulli trial per edge.
//! Network partitions instead take down every service placed in the
//! partitioned region.

use crate::rng::{incident_id, RngStreams};
use crate::topology::Topology;
use chrono::Duration;
use melt_model::{GenerationConfig, Host, Incident, IncidentType, Propagation};
use rand::prelude::*;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Minutes between propagation delay slots.
const DELAY_SLOT_MINUTES: i64 = 15;

/// Expands primaries into their cascade trees.
#[derive(Debug, Clone, Copy)]
pub struct CascadePropagator<'a> {
    config: &'a GenerationConfig,
    topology: &'a Topology,
    streams: RngStreams,
}

impl<'a> CascadePropagator<'a> {
    /// Creates a propagator over a built topology.
    pub const fn new(config: &'a GenerationConfig, topology: &'a Topology) -> Self {
        Self {
            config,
            topology,
            streams: RngStreams::new(config.seed),
        }
    }

    /// Expands `primary` into itself plus every secondary it triggers.
    ///
    /// The first element is the primary, updated with its children and the
    /// hosts its tree touches. Secondaries follow in creation order.
    pub fn expand(&self, primary: Incident, day: u32) -> Vec<Incident> {
        let tree = match primary.incident_type.propagation() {
            Propagation::Regional => self.expand_regional(primary, day),
            Propagation::DependencyGraph => self.expand_graph(primary, day),
        };
        if tree.len() > 1 {
            debug!(
                id = %tree[0].id,
                secondaries = tree.len() - 1,
                "cascade expanded"
            );
        }
        tree
    }

    fn expand_graph(&self, primary: Incident, day: u32) -> Vec<Incident> {
        let settings = &self.config.cascade;
        let mut rng = self.streams.stream(day, primary.id.as_str(), "cascade");

        let mut considered = BTreeSet::from([primary.target_service.clone()]);
        let mut parent_of: Vec<Option<usize>> = vec![None];
        let mut tree = vec![primary];
        let mut queue = VecDeque::from([0usize]);

        while let Some(idx) = queue.pop_front() {
            if tree[idx].hop >= settings.max_hops {
                continue;
            }
            let parent = tree[idx].clone();
            let profile = self.config.incidents.profile(parent.incident_type);
            let probability = (profile.cascade_probability * settings.edge_probability).clamp(0.0, 1.0);

            for dependency in self.topology.neighbors(&parent.target_service) {
                if !considered.insert(dependency.clone()) {
                    continue;
                }
                if !rng.gen_bool(probability) {
                    continue;
                }

                let hop = parent.hop + 1;
                let delay = DELAY_SLOT_MINUTES * i64::from(hop) * rng.gen_range(1..=4);
                let start = parent.start_time + Duration::minutes(delay);
                let remaining = (parent.end_time - start).num_minutes();
                if remaining < 1 {
                    continue;
                }
                let share: f64 = rng.gen_range(0.6..=1.0);
                let minutes = scaled_minutes(remaining, share);
                let end = start + Duration::minutes(minutes);

                let candidates: Vec<&Host> = self.topology.hosts_of(dependency).collect();
                let Some(host) = candidates.choose(&mut rng).copied() else {
                    continue;
                };
                let incident_type = if parent.incident_type.propagates_verbatim() {
                    parent.incident_type
                } else {
                    IncidentType::DependencyDegradation
                };
                let child = Incident::new(incident_id(&mut rng), incident_type, host, start, end)
                    .as_cascade_of(&parent)
                    .with_intensity(parent.intensity * settings.severity_decay);

                tree[idx].cascading_incidents.push(child.id.clone());
                let mut ancestor = Some(idx);
                while let Some(a) = ancestor {
                    tree[a].add_affected(&host.id, &host.service);
                    ancestor = parent_of[a];
                }

                debug!(
                    parent = %parent.id,
                    child = %child.id,
                    service = %dependency,
                    hop,
                    delay_minutes = delay,
                    "cascade triggered"
                );
                parent_of.push(Some(idx));
                queue.push_back(tree.len());
                tree.push(child);
            }
        }
        tree
    }

    fn expand_regional(&self, mut primary: Incident, day: u32) -> Vec<Incident> {
        let mut rng = self.streams.stream(day, primary.id.as_str(), "cascade");
        let region = primary.region.clone();
        for host in self.topology.hosts_in_region(&region) {
            primary.add_affected(&host.id, &host.service);
        }
        if self.config.cascade.max_hops == 0 {
            return vec![primary];
        }

        let mut secondaries = Vec::new();
        for service in self.topology.services_in_region(&region) {
            if service == primary.target_service {
                continue;
            }
            let hosts: Vec<&Host> = self
                .topology
                .hosts_in_region(&region)
                .filter(|h| h.service == service)
                .collect();
            let Some(target) = hosts.first() else {
                continue;
            };
            let mut child = Incident::new(
                incident_id(&mut rng),
                primary.incident_type,
                target,
                primary.start_time,
                primary.end_time,
            )
            .as_cascade_of(&primary)
            .with_intensity(primary.intensity * self.config.cascade.severity_decay);
            for host in &hosts {
                child.add_affected(&host.id, &host.service);
            }
            primary.cascading_incidents.push(child.id.clone());
            secondaries.push(child);
        }

        let mut tree = Vec::with_capacity(secondaries.len() + 1);
        tree.push(primary);
        tree.extend(secondaries);
        tree
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn scaled_minutes(remaining: i64, share: f64) -> i64 {
    ((remaining as f64 * share).round() as i64).clamp(1, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::small_config;
    use chrono::{DateTime, Utc};
    use melt_model::{CloudProvider, IncidentId, PlainNaming, ServiceSpec};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn chain_config(services: Vec<ServiceSpec>) -> GenerationConfig {
        let mut config = GenerationConfig::default().with_days(1);
        config.topology.services = services;
        config.topology.hosts_per_service = 2;
        config.cascade.edge_probability = 1.0;
        for settings in config.incidents.types.values_mut() {
            settings.cascade_probability = Some(1.0);
        }
        config
    }

    fn primary_on(
        topo: &Topology,
        config: &GenerationConfig,
        service: &str,
        incident_type: IncidentType,
    ) -> Incident {
        let host = topo.hosts_of(service).next().unwrap();
        let start: DateTime<Utc> = config.start_of_day(0) + Duration::hours(9);
        Incident::new(
            IncidentId::new("root"),
            incident_type,
            host,
            start,
            start + Duration::hours(12),
        )
    }

    #[test]
    fn certain_cascade_reaches_every_dependency() {
        let config = chain_config(vec![
            ServiceSpec::new("a", &["b", "c"]),
            ServiceSpec::new("b", &["d"]),
            ServiceSpec::new("c", &["d"]),
            ServiceSpec::new("d", &[]),
        ]);
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let primary = primary_on(&topo, &config, "a", IncidentType::CpuSaturation);
        let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);

        let services: Vec<&str> = tree.iter().map(|i| i.target_service.as_str()).collect();
        assert_eq!(services, ["a", "b", "c", "d"]);
        let root = &tree[0];
        assert_eq!(root.cascading_incidents.len(), 2);
        assert_eq!(root.affected_services.len(), 4);
        let d = &tree[3];
        assert_eq!(d.hop, 2);
        assert_eq!(d.root_incident.as_ref(), Some(&root.id));
        assert_eq!(d.incident_type, IncidentType::DependencyDegradation);
        assert!((d.intensity - 0.49).abs() < 1e-12);
        assert!(d.start_time > root.start_time);
        assert!(d.end_time <= root.end_time);
    }

    #[test]
    fn max_hops_bounds_the_walk() {
        let mut config = chain_config(vec![
            ServiceSpec::new("a", &["b"]),
            ServiceSpec::new("b", &["c"]),
            ServiceSpec::new("c", &[]),
        ]);
        config.cascade.max_hops = 1;
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let primary = primary_on(&topo, &config, "a", IncidentType::MemoryLeak);
        let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].target_service, "b");
    }

    #[test]
    fn resource_exhaustion_propagates_verbatim() {
        let config = chain_config(vec![ServiceSpec::new("a", &["b"]), ServiceSpec::new("b", &[])]);
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let primary = primary_on(&topo, &config, "a", IncidentType::ResourceExhaustion);
        let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);
        assert_eq!(tree[1].incident_type, IncidentType::ResourceExhaustion);
    }

    #[test]
    fn partition_takes_down_the_region() {
        let mut config = chain_config(vec![
            ServiceSpec::new("a", &[]),
            ServiceSpec::new("b", &[]),
            ServiceSpec::new("c", &[]),
        ]);
        config.clouds = BTreeMap::from([(
            CloudProvider::Onpremise,
            melt_model::CloudSettings {
                enabled: true,
                regions: vec!["dc1".into()],
            },
        )]);
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let primary = primary_on(&topo, &config, "b", IncidentType::NetworkPartition);
        let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].affected_hosts.len(), 6);
        for child in &tree[1..] {
            assert_eq!(child.incident_type, IncidentType::NetworkPartition);
            assert_eq!(child.start_time, tree[0].start_time);
            assert_eq!(child.end_time, tree[0].end_time);
            assert_eq!(child.affected_hosts.len(), 2);
            assert_eq!(child.hop, 1);
        }
    }

    #[test]
    fn zero_probability_never_cascades() {
        let mut config = chain_config(vec![ServiceSpec::new("a", &["b"]), ServiceSpec::new("b", &[])]);
        config.cascade.edge_probability = 0.0;
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let primary = primary_on(&topo, &config, "a", IncidentType::CascadingFailure);
        let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].cascading_incidents.is_empty());
    }

    proptest! {
        #[test]
        fn trees_respect_structural_bounds(mut config in small_config(), t in crate::generators::incident_type()) {
            config.cascade.edge_probability = 1.0;
            let topo = Topology::build(&config, &PlainNaming).unwrap();
            let primary = primary_on(&topo, &config, "svc-0", t);
            let tree = CascadePropagator::new(&config, &topo).expand(primary, 0);

            let mut seen = BTreeSet::new();
            for inc in &tree {
                prop_assert!(inc.start_time < inc.end_time);
                prop_assert!(inc.hop <= config.cascade.max_hops);
                prop_assert!(inc.affects_host(&inc.target_host));
                if t.propagation() == Propagation::DependencyGraph {
                    prop_assert!(seen.insert(inc.target_service.clone()));
                }
            }
            for inc in &tree[1..] {
                prop_assert_eq!(inc.root_incident.as_ref(), Some(&tree[0].id));
                prop_assert!(tree[0].affects_host(&inc.target_host));
            }
        }
    }
}
