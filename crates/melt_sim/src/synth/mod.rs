//! Signal synthesis.
//!
//! [`HostSynthesizer`] produces the metric, log and trace streams of one host
//! for one day from the finalized [`ActiveIncidentIndex`]. It owns no mutable
//! state beyond its per-host random streams, so hosts can be synthesized in
//! parallel. Events are fleet-wide and come from [`EventSynthesizer`].

pub mod baseline;
pub mod events;
pub mod perturb;
pub mod telemetry;

pub use baseline::Seasonality;
pub use events::{sort_events, EventSynthesizer};
pub use perturb::{validate_table, PerturbContext, PerturbFn, PERTURBATIONS};
pub use telemetry::ActiveIncident;

use crate::index::ActiveIncidentIndex;
use crate::lifecycle::SeverityModel;
use crate::rng::{gauss, stable_fraction, RngStreams};
use chrono::{DateTime, Duration, Timelike, Utc};
use melt_model::{
    CloudNaming, GenerationConfig, Host, Incident, LogRecord, MetricKind, MetricRecord,
    SynthesisSettings, TraceRecord,
};
use rand::Rng;

/// Streams produced for one host over one day.
#[derive(Debug, Clone, Default)]
pub struct HostOutput {
    /// One record per timestep.
    pub metrics: Vec<MetricRecord>,
    /// One line per request.
    pub logs: Vec<LogRecord>,
    /// One span per request.
    pub traces: Vec<TraceRecord>,
}

/// Returns true if `host_id` is spared from `incident` at `t`.
///
/// The decision hashes `(incident id, host id)`, so the spared subset never
/// changes between runs. The target host is never spared.
pub fn is_excluded(
    settings: &SynthesisSettings,
    incident: &Incident,
    host_id: &str,
    t: DateTime<Utc>,
) -> bool {
    if host_id == incident.target_host {
        return false;
    }
    let mut threshold = settings.partial_outage_fraction;
    if settings.maintenance_window().contains(t.hour()) {
        threshold += settings.maintenance_exclusion_fraction;
    }
    stable_fraction(incident.id.as_str(), host_id) < threshold
}

/// Per-host synthesizer for one day.
pub struct HostSynthesizer<'a> {
    config: &'a GenerationConfig,
    naming: &'a dyn CloudNaming,
    index: &'a ActiveIncidentIndex,
    streams: RngStreams,
    severity: SeverityModel,
    seasonality: Seasonality,
    day: u32,
    day_start: DateTime<Utc>,
}

impl<'a> HostSynthesizer<'a> {
    /// Creates a synthesizer reading `index` for `day`.
    pub fn new(
        config: &'a GenerationConfig,
        naming: &'a dyn CloudNaming,
        index: &'a ActiveIncidentIndex,
        day: u32,
    ) -> Self {
        let synthesis = &config.synthesis;
        Self {
            config,
            naming,
            index,
            streams: RngStreams::new(config.seed),
            severity: SeverityModel::new(synthesis.active_jitter),
            seasonality: Seasonality {
                maintenance: synthesis.maintenance_window(),
                weekly: synthesis.weekly_seasonality,
            },
            day,
            day_start: config.start_of_day(day),
        }
    }

    /// Synthesizes every timestep of the day for `host`.
    #[allow(clippy::cast_precision_loss)]
    pub fn synthesize(&self, host: &Host) -> HostOutput {
        let synthesis = &self.config.synthesis;
        let step = self.config.step();
        let day_end = self.day_start + Duration::days(1);
        let mut metric_rng = self.streams.stream(self.day, &host.id, "metrics");
        let mut request_rng = self.streams.stream(self.day, &host.id, "requests");

        let names: Vec<String> = MetricKind::ALL
            .iter()
            .map(|kind| self.naming.metric_name(*kind, host.cloud_provider))
            .collect();
        let on_shared_resource = self
            .config
            .incidents
            .shared_resource_service
            .as_deref()
            .is_some_and(|s| s == host.service);
        let incidents: Vec<&Incident> = self.index.for_host(&host.id).collect();

        let mut out = HostOutput::default();
        let mut t = self.day_start;
        while t < day_end {
            let base = baseline::draw(&mut metric_rng, t, &self.seasonality);
            let active: Vec<ActiveIncident<'_>> = incidents
                .iter()
                .filter(|i| i.covers(t) && !is_excluded(synthesis, i, &host.id, t))
                .map(|i| ActiveIncident {
                    incident: i,
                    severity: self.severity.severity(i, t),
                })
                .collect();

            let mut sample = base;
            for a in &active {
                let ctx = PerturbContext {
                    severity: a.severity,
                    elapsed_hours: (t - a.incident.start_time).num_seconds() as f64 / 3600.0,
                    on_shared_resource,
                    roll: metric_rng.gen(),
                    noise: gauss(&mut metric_rng, 0.0, 1.0),
                };
                let perturbed = perturb::apply(a.incident.incident_type, &base, &ctx);
                sample.merge_strongest(&perturbed, &base);
            }

            out.metrics.push(MetricRecord {
                timestamp: t,
                host_id: host.id.clone(),
                service: host.service.clone(),
                cloud_provider: host.cloud_provider,
                region: host.region.clone(),
                metrics: names
                    .iter()
                    .zip(sample.iter())
                    .map(|(name, (kind, value))| (name.clone(), kind.publish(value)))
                    .collect(),
                metadata: host.metadata.clone(),
            });
            telemetry::emit_requests(
                &mut request_rng,
                host,
                t,
                step,
                &active,
                synthesis.requests_per_step,
                &mut out.logs,
                &mut out.traces,
            );
            t += step;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_model::{IncidentId, IncidentType, PlainNaming, ServiceSpec};

    fn setup() -> (GenerationConfig, Vec<Host>) {
        let mut config = GenerationConfig::default().with_days(1).with_granularity(60);
        config.topology.services = vec![ServiceSpec::new("svc", &[])];
        config.topology.hosts_per_service = 8;
        let topo = crate::topology::Topology::build(&config, &PlainNaming).unwrap();
        (config, topo.hosts().to_vec())
    }

    fn incident_over(config: &GenerationConfig, hosts: &[Host], t: IncidentType) -> Incident {
        let start = config.start_of_day(0) + Duration::hours(8);
        let mut inc = Incident::new(IncidentId::new("inc-1"), t, &hosts[0], start, start + Duration::hours(10));
        for h in hosts {
            inc.add_affected(&h.id, &h.service);
        }
        inc
    }

    #[test]
    fn exclusion_is_stable_and_spares_fraction() {
        let (config, hosts) = setup();
        let inc = incident_over(&config, &hosts, IncidentType::CpuSaturation);
        let t = inc.start_time + Duration::hours(1);
        let spared: Vec<bool> = hosts
            .iter()
            .map(|h| is_excluded(&config.synthesis, &inc, &h.id, t))
            .collect();
        let again: Vec<bool> = hosts
            .iter()
            .map(|h| is_excluded(&config.synthesis, &inc, &h.id, t))
            .collect();
        assert_eq!(spared, again);
        assert!(!spared[0]);

        let mut all = config.synthesis;
        all.partial_outage_fraction = 1.0;
        assert!(hosts[1..].iter().all(|h| is_excluded(&all, &inc, &h.id, t)));
    }

    #[test]
    fn one_record_per_step_and_requests_per_step() {
        let (mut config, hosts) = setup();
        config.synthesis.requests_per_step = 3;
        let index = ActiveIncidentIndex::build(Vec::new());
        let out = HostSynthesizer::new(&config, &PlainNaming, &index, 0).synthesize(&hosts[0]);
        assert_eq!(out.metrics.len(), 24);
        assert_eq!(out.logs.len(), 72);
        assert_eq!(out.traces.len(), 72);
        assert_eq!(out.metrics[0].metrics.len(), MetricKind::COUNT);
        assert!(out.metrics[0].metrics.contains_key("system.cpu.util"));
    }

    #[test]
    fn saturated_target_reads_at_least_95() {
        let (config, hosts) = setup();
        let inc = incident_over(&config, &hosts, IncidentType::CpuSaturation);
        let model = SeverityModel::new(config.synthesis.active_jitter);
        let index = ActiveIncidentIndex::build(vec![inc.clone()]);
        let out = HostSynthesizer::new(&config, &PlainNaming, &index, 0).synthesize(&hosts[0]);

        let mut checked = 0;
        for record in &out.metrics {
            if (model.severity(&inc, record.timestamp) - 1.0).abs() < f64::EPSILON {
                assert!(record.metrics["system.cpu.util"] >= 95.0);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn overlapping_incidents_keep_the_strongest_deviation() {
        let (config, hosts) = setup();
        let start = config.start_of_day(0) - Duration::hours(2);
        let on_target = |id: &str, t: IncidentType| {
            Incident::new(IncidentId::new(id), t, &hosts[0], start, start + Duration::hours(8))
        };
        let db = on_target("inc-db", IncidentType::DbContention);
        let cpu = on_target("inc-cpu", IncidentType::CpuSaturation);
        // The first step draws the same baseline in every run; later steps
        // consume extra draws per active incident.
        let first_latency = |incidents: Vec<Incident>| {
            let index = ActiveIncidentIndex::build(incidents);
            let out = HostSynthesizer::new(&config, &PlainNaming, &index, 0).synthesize(&hosts[0]);
            out.metrics[0].metrics["net.latency.ms"]
        };

        let none = first_latency(Vec::new());
        let db_only = first_latency(vec![db.clone()]);
        let cpu_only = first_latency(vec![cpu.clone()]);
        let both = first_latency(vec![db, cpu]);

        assert!(db_only > none);
        assert!(cpu_only > none);
        assert!((both - db_only.max(cpu_only)).abs() < 1e-9, "{both} {db_only} {cpu_only}");
        assert!(both < db_only + cpu_only - none);
    }

    #[test]
    fn synthesis_is_reproducible() {
        let (config, hosts) = setup();
        let inc = incident_over(&config, &hosts, IncidentType::MemoryLeak);
        let index = ActiveIncidentIndex::build(vec![inc]);
        let synth = HostSynthesizer::new(&config, &PlainNaming, &index, 0);
        let a = synth.synthesize(&hosts[3]);
        let b = synth.synthesize(&hosts[3]);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.logs, b.logs);
        assert_eq!(a.traces, b.traces);
    }
}
