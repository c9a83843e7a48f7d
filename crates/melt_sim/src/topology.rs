//! Fleet topology: services, hosts and dependency edges.
//!
//! Built once from configuration and immutable afterwards. Every structural
//! problem (duplicate service, dangling edge, cycle) is reported here, so
//! the cascade walk never has to handle it.

use crate::rng::RngStreams;
use melt_model::{CloudNaming, CloudProvider, Error, GenerationConfig, Host, Result};
use rand::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

const MAX_ID_ATTEMPTS: usize = 64;

/// Immutable fleet model.
#[derive(Debug, Clone)]
pub struct Topology {
    services: Vec<String>,
    edges: BTreeMap<String, Vec<String>>,
    hosts: Vec<Host>,
    by_id: HashMap<String, usize>,
    by_service: BTreeMap<String, Vec<usize>>,
    by_region: BTreeMap<String, Vec<usize>>,
    regions: Vec<(CloudProvider, String)>,
}

impl Topology {
    /// Builds the fleet described by `config`.
    ///
    /// Hosts are placed in a seeded choice among all enabled regions; host
    /// identifiers and metadata come from `naming`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate services, unknown
    /// dependencies, dependency cycles, an empty fleet or no regions.
    pub fn build(config: &GenerationConfig, naming: &dyn CloudNaming) -> Result<Self> {
        let settings = &config.topology;
        if settings.services.is_empty() || settings.hosts_per_service == 0 {
            return Err(Error::ZeroHosts(format!(
                "{} services x {} hosts",
                settings.services.len(),
                settings.hosts_per_service
            )));
        }
        let regions = config.enabled_regions();
        if regions.is_empty() {
            return Err(Error::NoRegions);
        }

        let mut services = Vec::with_capacity(settings.services.len());
        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for spec in &settings.services {
            if edges.contains_key(&spec.name) {
                return Err(Error::DuplicateService(spec.name.clone()));
            }
            services.push(spec.name.clone());
            edges.insert(spec.name.clone(), spec.depends_on.clone());
        }
        for (service, deps) in &edges {
            if let Some(dep) = deps.iter().find(|d| !edges.contains_key(*d)) {
                return Err(Error::UnknownDependency {
                    service: service.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        if let Some(path) = find_cycle(&services, &edges) {
            return Err(Error::DependencyCycle { path });
        }

        let streams = RngStreams::new(config.seed);
        let mut rng = streams.setup("topology");
        let mut hosts = Vec::with_capacity(services.len() * settings.hosts_per_service);
        let mut taken: BTreeSet<String> = BTreeSet::new();

        for service in &services {
            for index in 0..settings.hosts_per_service {
                let Some((cloud, region)) = regions.choose(&mut rng).cloned() else {
                    return Err(Error::NoRegions);
                };
                let (id, token) = unique_host_id(naming, &mut rng, &taken, cloud, service, index);
                let metadata = naming.host_metadata(cloud, &id, service, &region, token);
                taken.insert(id.clone());
                hosts.push(Host::new(id, service.clone(), cloud, region).with_metadata(metadata));
            }
        }

        let mut by_id = HashMap::with_capacity(hosts.len());
        let mut by_service: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_region: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, host) in hosts.iter().enumerate() {
            by_id.insert(host.id.clone(), i);
            by_service.entry(host.service.clone()).or_default().push(i);
            by_region.entry(host.region.clone()).or_default().push(i);
        }

        debug!(
            services = services.len(),
            hosts = hosts.len(),
            regions = by_region.len(),
            "topology built"
        );

        Ok(Self {
            services,
            edges,
            hosts,
            by_id,
            by_service,
            by_region,
            regions,
        })
    }

    /// Services in declaration order.
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Services that `service` calls, in declaration order.
    pub fn neighbors(&self, service: &str) -> &[String] {
        self.edges.get(service).map_or(&[], Vec::as_slice)
    }

    /// Every host, grouped by service in declaration order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Looks up a host by id.
    pub fn host(&self, id: &str) -> Option<&Host> {
        self.by_id.get(id).map(|i| &self.hosts[*i])
    }

    /// Hosts of one service.
    pub fn hosts_of<'a>(&'a self, service: &str) -> impl Iterator<Item = &'a Host> + 'a {
        self.indexed(self.by_service.get(service))
    }

    /// Hosts placed in one region.
    pub fn hosts_in_region<'a>(&'a self, region: &str) -> impl Iterator<Item = &'a Host> + 'a {
        self.indexed(self.by_region.get(region))
    }

    /// Services with at least one host in `region`, in declaration order.
    pub fn services_in_region(&self, region: &str) -> Vec<&str> {
        let present: BTreeSet<&str> = self
            .hosts_in_region(region)
            .map(|h| h.service.as_str())
            .collect();
        self.services
            .iter()
            .map(String::as_str)
            .filter(|s| present.contains(s))
            .collect()
    }

    /// Every enabled `(provider, region)` pair.
    pub fn regions(&self) -> &[(CloudProvider, String)] {
        &self.regions
    }

    /// Regions that received at least one host, sorted.
    pub fn occupied_regions(&self) -> Vec<&str> {
        self.by_region.keys().map(String::as_str).collect()
    }

    fn indexed<'a>(&'a self, slots: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a Host> + 'a {
        slots
            .into_iter()
            .flat_map(|v| v.iter())
            .map(move |i| &self.hosts[*i])
    }
}

fn unique_host_id(
    naming: &dyn CloudNaming,
    rng: &mut impl Rng,
    taken: &BTreeSet<String>,
    cloud: CloudProvider,
    service: &str,
    index: usize,
) -> (String, u64) {
    let mut token: u64 = rng.gen();
    let mut id = naming.host_id(cloud, service, index, token);
    for _ in 0..MAX_ID_ATTEMPTS {
        if !taken.contains(&id) {
            return (id, token);
        }
        token = rng.gen();
        id = naming.host_id(cloud, service, index, token);
    }
    let fallback = format!("{id}-{service}-{index}");
    (fallback, token)
}

/// Returns a cycle as a path whose first and last entries match.
fn find_cycle(services: &[String], edges: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        edges: &'a BTreeMap<String, Vec<String>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::InProgress);
        stack.push(node);
        for next in edges.get(node).into_iter().flatten() {
            match marks.get(next.as_str()).copied().unwrap_or(Mark::Unvisited) {
                Mark::InProgress => {
                    let from = stack.iter().position(|s| *s == next.as_str()).unwrap_or(0);
                    let mut path: Vec<String> = stack[from..].iter().map(ToString::to_string).collect();
                    path.push(next.clone());
                    return Some(path);
                }
                Mark::Unvisited => {
                    if let Some(path) = visit(next, edges, marks, stack) {
                        return Some(path);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack = Vec::new();
    for service in services {
        if marks.get(service.as_str()).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
            if let Some(path) = visit(service, edges, &mut marks, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}
