//! Day-at-a-time generation driver.
//!
//! Each day runs in a fixed order: schedule primaries, expanding each one's
//! cascade as it is placed, record the delta, freeze the incident index, then synthesize. Synthesis
//! only reads the frozen index, so hosts fan out over rayon and the merged
//! output is sorted back into a canonical order.

use crate::cascade::CascadePropagator;
use crate::error::{Error, Result, SinkError};
use crate::index::ActiveIncidentIndex;
use crate::recorder::{GroundTruthRecorder, IncidentDelta};
use crate::scheduler::{Schedule, Scheduler, SchedulingConflict};
use crate::synth::{self, EventSynthesizer, HostOutput, HostSynthesizer};
use crate::topology::Topology;
use chrono::{Duration, NaiveDate};
use melt_model::{
    CloudNaming, EventRecord, GenerationConfig, Incident, IncidentType, LogRecord, MetricRecord,
    TraceRecord,
};
use rayon::prelude::*;
use tracing::{debug, info};

/// Everything generated for one simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayOutput {
    /// Day index from the start date.
    pub day: u32,
    /// Calendar date.
    pub date: NaiveDate,
    /// Metric records sorted by `(timestamp, host_id)`.
    pub metrics: Vec<MetricRecord>,
    /// Event records sorted by `(timestamp, type, incident, service, message)`.
    pub events: Vec<EventRecord>,
    /// Log records sorted by `(timestamp, host, trace_id)`.
    pub logs: Vec<LogRecord>,
    /// Trace records sorted by `(timestamp, service_name, trace_id)`.
    pub traces: Vec<TraceRecord>,
    /// Incidents created and resolved today.
    pub delta: IncidentDelta,
    /// Injections skipped today.
    pub conflicts: Vec<SchedulingConflict>,
    /// Every incident overlapping the day, in `(start_time, id)` order.
    pub incidents: Vec<Incident>,
}

impl DayOutput {
    /// Total number of records across the four streams.
    pub fn record_count(&self) -> usize {
        self.metrics.len() + self.events.len() + self.logs.len() + self.traces.len()
    }
}

/// The simulation engine.
pub struct Generator {
    config: GenerationConfig,
    naming: Box<dyn CloudNaming>,
    topology: Topology,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("seed", &self.config.seed)
            .field("hosts", &self.topology.hosts().len())
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// Validates `config` and builds the fleet.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config, phase profile or
    /// topology, or [`Error::MissingPerturbation`] if a type has no
    /// perturbation.
    pub fn new(config: GenerationConfig, naming: Box<dyn CloudNaming>) -> Result<Self> {
        config.validate()?;
        for incident_type in IncidentType::ALL {
            incident_type.phase_profile().validate(incident_type)?;
        }
        synth::validate_table()?;
        let topology = Topology::build(&config, naming.as_ref())?;
        info!(
            seed = config.seed,
            days = config.generation.days_to_generate,
            hosts = topology.hosts().len(),
            regions = topology.occupied_regions().len(),
            "generator ready"
        );
        Ok(Self {
            config,
            naming,
            topology,
        })
    }

    /// The validated configuration.
    pub const fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The fleet.
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Generates one day and records its incidents.
    ///
    /// Days must be generated in order against the same recorder: the
    /// scheduler reads the recorder's open-incident ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DayOutOfRange`] if `day` is past the configured window.
    pub fn generate_day(&self, day: u32, recorder: &mut GroundTruthRecorder) -> Result<DayOutput> {
        let days = self.config.generation.days_to_generate;
        if day >= days {
            return Err(Error::DayOutOfRange { day, days });
        }
        let day_start = self.config.start_of_day(day);
        let day_end = day_start + Duration::days(1);

        let open = recorder.open_at(day_start);
        let propagator = CascadePropagator::new(&self.config, &self.topology);
        let Schedule {
            incidents: created,
            conflicts,
        } = Scheduler::new(&self.config, &self.topology)
            .schedule_day_with(day, &open, |primary| propagator.expand(primary, day));

        let mut incidents: Vec<Incident> = open
            .into_iter()
            .chain(created.iter().cloned())
            .filter(|i| i.overlaps(day_start, day_end) || i.end_time == day_start)
            .collect();
        incidents.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        let delta = recorder.record_day(day_start, day_end, created, conflicts.clone());
        let index = ActiveIncidentIndex::build(incidents.clone());
        debug!(day, indexed = index.len(), "incident index frozen");

        let host_synth = HostSynthesizer::new(&self.config, self.naming.as_ref(), &index, day);
        let hosts = self.topology.hosts();
        let per_host: Vec<HostOutput> = if self.config.synthesis.parallel {
            hosts.par_iter().map(|h| host_synth.synthesize(h)).collect()
        } else {
            hosts.iter().map(|h| host_synth.synthesize(h)).collect()
        };

        let mut metrics = Vec::new();
        let mut logs = Vec::new();
        let mut traces = Vec::new();
        for out in per_host {
            metrics.extend(out.metrics);
            logs.extend(out.logs);
            traces.extend(out.traces);
        }
        metrics.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.host_id.cmp(&b.host_id)));
        logs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.host.cmp(&b.host))
                .then_with(|| a.trace_id.cmp(&b.trace_id))
        });
        traces.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.service_name.cmp(&b.service_name))
                .then_with(|| a.trace_id.cmp(&b.trace_id))
        });

        let mut events = EventSynthesizer::new(&self.config, &self.topology, day).synthesize(&incidents);
        synth::sort_events(&mut events);

        let output = DayOutput {
            day,
            date: self.config.date_of(day),
            metrics,
            events,
            logs,
            traces,
            delta,
            conflicts,
            incidents,
        };
        info!(
            day,
            date = %output.date,
            created = output.delta.created.len(),
            resolved = output.delta.resolved.len(),
            skipped = output.conflicts.len(),
            records = output.record_count(),
            "day generated"
        );
        Ok(output)
    }

    /// Generates every configured day in order, handing each to `sink`.
    ///
    /// # Errors
    ///
    /// Stops at the first day the sink rejects and returns [`Error::Sink`].
    pub fn run<F, E>(&self, recorder: &mut GroundTruthRecorder, mut sink: F) -> Result<()>
    where
        F: FnMut(DayOutput) -> std::result::Result<(), E>,
        E: Into<SinkError>,
    {
        for day in 0..self.config.generation.days_to_generate {
            let output = self.generate_day(day, recorder)?;
            let date = output.date;
            sink(output).map_err(|e| Error::Sink {
                date,
                source: e.into(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::small_config;
    use crate::lifecycle::SeverityModel;
    use melt_cloud::CloudCatalog;
    use melt_model::{
        CloudProvider, EventKind, MetricKind, PlainNaming, ScriptedIncident, ServiceSpec,
    };
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn two_service_config() -> GenerationConfig {
        let mut config = GenerationConfig::default()
            .with_seed(42)
            .with_days(1)
            .with_granularity(60);
        config.topology.services = vec![ServiceSpec::new("A", &["B"]), ServiceSpec::new("B", &[])];
        config.topology.hosts_per_service = 1;
        config.incidents.daily_incident_probability = 0.0;
        config.incidents.shared_resource_service = None;
        if let Some(t) = config.incidents.types.get_mut(&IncidentType::CascadingFailure) {
            t.cascade_probability = Some(1.0);
        }
        config.cascade.edge_probability = 1.0;
        config.incidents.scripted = vec![ScriptedIncident {
            day: 0,
            incident_type: IncidentType::CascadingFailure,
            service: "A".into(),
            host_index: 0,
            start_minute: 8 * 60,
            duration_minutes: 120,
        }];
        config
    }

    fn generate(config: GenerationConfig) -> (Vec<DayOutput>, GroundTruthRecorder) {
        let generator = Generator::new(config, Box::new(PlainNaming)).unwrap();
        let mut recorder = GroundTruthRecorder::new();
        let mut days = Vec::new();
        generator
            .run(&mut recorder, |day| {
                days.push(day);
                Ok::<(), std::io::Error>(())
            })
            .unwrap();
        (days, recorder)
    }

    fn serialized(days: &[DayOutput]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for day in days {
            bytes.extend(serde_json::to_vec(&day.metrics).unwrap());
            bytes.extend(serde_json::to_vec(&day.events).unwrap());
            bytes.extend(serde_json::to_vec(&day.logs).unwrap());
            bytes.extend(serde_json::to_vec(&day.traces).unwrap());
            bytes.extend(serde_json::to_vec(&day.delta).unwrap());
        }
        bytes
    }

    #[test]
    fn cascading_failure_degrades_its_dependency() {
        let (days, recorder) = generate(two_service_config());
        let incidents = recorder.incidents();
        assert_eq!(incidents.len(), 2);
        let a = &incidents[0];
        let b = &incidents[1];

        assert_eq!(a.target_service, "A");
        assert_eq!(a.incident_type, IncidentType::CascadingFailure);
        assert_eq!(a.start_time, two_service_config().start_of_day(0) + Duration::hours(8));
        assert_eq!(b.target_service, "B");
        assert_eq!(b.incident_type, IncidentType::DependencyDegradation);
        assert_eq!(b.cascaded_from.as_ref(), Some(&a.id));
        assert!(b.start_time > a.start_time);
        assert!(b.end_time <= a.end_time);
        assert!(b.intensity < a.intensity);

        let trigger = days[0]
            .events
            .iter()
            .find(|e| e.kind == EventKind::CascadeTrigger)
            .unwrap();
        assert_eq!(trigger.timestamp, b.start_time);
        assert_eq!(trigger.incident_id.as_ref(), Some(&b.id));
        assert_eq!(trigger.service, "B");
    }

    #[test]
    fn runs_are_byte_identical() {
        let mut config = two_service_config().with_days(3);
        config.incidents.daily_incident_probability = 0.8;
        let (first, _) = generate(config.clone());
        let (second, _) = generate(config);
        assert_eq!(serialized(&first), serialized(&second));
    }

    #[test]
    fn parallel_matches_serial() {
        let mut config = GenerationConfig::default().with_days(2).with_granularity(30);
        config.incidents.daily_incident_probability = 1.0;
        config.synthesis.parallel = true;
        let (parallel, _) = generate(config.clone());
        config.synthesis.parallel = false;
        let (serial, _) = generate(config);
        assert_eq!(serialized(&parallel), serialized(&serial));
    }

    #[test]
    fn alerts_match_the_delta() {
        let mut config = GenerationConfig::default().with_days(5).with_granularity(60);
        config.incidents.daily_incident_probability = 1.0;
        config.incidents.max_primary_incidents_per_day = 2;
        let (days, recorder) = generate(config);
        for day in &days {
            for alert in day.events.iter().filter(|e| e.kind == EventKind::AlertTrigger) {
                let id = alert.incident_id.as_ref().unwrap();
                assert_eq!(day.delta.created.iter().filter(|c| *c == id).count(), 1);
                assert_eq!(recorder.get(id).unwrap().start_time, alert.timestamp);
            }
        }
    }

    #[test]
    fn saturated_cpu_shows_in_metrics() {
        let mut config = two_service_config();
        config.incidents.scripted[0].incident_type = IncidentType::CpuSaturation;
        config.incidents.scripted[0].duration_minutes = 600;
        config.synthesis.partial_outage_fraction = 0.0;
        let model = SeverityModel::new(config.synthesis.active_jitter);
        let (days, recorder) = generate(config);
        let inc = &recorder.incidents()[0];
        let mut checked = 0;
        for record in days[0].metrics.iter().filter(|m| m.host_id == inc.target_host) {
            if (model.severity(inc, record.timestamp) - 1.0).abs() < f64::EPSILON {
                assert!(record.metrics[MetricKind::CpuUtil.base_name()] >= 95.0);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn provider_naming_reaches_the_streams() {
        let mut config = two_service_config();
        for cloud in config.clouds.values_mut() {
            cloud.enabled = false;
        }
        if let Some(aws) = config.clouds.get_mut(&CloudProvider::Aws) {
            aws.enabled = true;
        }
        let generator = Generator::new(config, Box::new(CloudCatalog::new())).unwrap();
        let mut recorder = GroundTruthRecorder::new();
        let day = generator.generate_day(0, &mut recorder).unwrap();

        let record = &day.metrics[0];
        assert_eq!(record.cloud_provider, CloudProvider::Aws);
        assert!(record.host_id.starts_with("i-"));
        assert_eq!(record.metrics.len(), MetricKind::COUNT);
        assert!(record.metrics.contains_key("AWS/EC2.CPUUtilization"));
        assert_eq!(record.metadata["cloud_provider"], "aws");
        assert!(day.traces[0].attributes.contains_key("cloud.instance_type"));
    }

    #[test]
    fn same_day_cascades_hold_host_capacity() {
        let mut config = two_service_config();
        config.incidents.scripted.push(ScriptedIncident {
            day: 0,
            incident_type: IncidentType::CpuSaturation,
            service: "B".into(),
            host_index: 0,
            start_minute: 9 * 60,
            duration_minutes: 60,
        });
        let (days, recorder) = generate(config);
        let incidents = recorder.incidents();
        assert_eq!(incidents.len(), 2);
        assert!(incidents.iter().all(|i| i.incident_type != IncidentType::CpuSaturation));
        assert_eq!(days[0].conflicts.len(), 1);
        assert_eq!(days[0].conflicts[0].service.as_deref(), Some("B"));
        assert_eq!(days[0].conflicts[0].reason, "target host at concurrency limit");
    }

    #[test]
    fn out_of_range_day_is_rejected() {
        let generator = Generator::new(two_service_config(), Box::new(PlainNaming)).unwrap();
        let mut recorder = GroundTruthRecorder::new();
        assert!(matches!(
            generator.generate_day(1, &mut recorder),
            Err(Error::DayOutOfRange { day: 1, days: 1 })
        ));
    }

    #[test]
    fn sink_errors_abort_the_run() {
        let generator = Generator::new(two_service_config().with_days(3), Box::new(PlainNaming)).unwrap();
        let mut recorder = GroundTruthRecorder::new();
        let err = generator
            .run(&mut recorder, |_| Err(std::io::Error::other("disk full")))
            .unwrap_err();
        assert!(matches!(err, Error::Sink { .. }));
        assert_eq!(recorder.days_recorded(), 1);
    }

    #[test]
    fn invalid_topology_fails_before_generation() {
        let mut config = two_service_config();
        config.topology.services = vec![ServiceSpec::new("A", &["B"]), ServiceSpec::new("B", &["A"])];
        assert!(matches!(
            Generator::new(config, Box::new(PlainNaming)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn undamped_cascades_are_rejected() {
        let mut config = two_service_config();
        config.cascade.severity_decay = 1.0;
        assert!(matches!(
            Generator::new(config, Box::new(PlainNaming)),
            Err(Error::Config(melt_model::Error::InvalidSetting(_)))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn recorded_incidents_hold_invariants(config in small_config()) {
            let max_hops = config.cascade.max_hops;
            let (days, recorder) = generate(config);
            let incidents = recorder.incidents();
            let by_id: BTreeMap<_, _> = incidents.iter().map(|i| (i.id.clone(), i)).collect();
            let mut cascaded: BTreeSet<(String, String)> = BTreeSet::new();

            for inc in incidents {
                prop_assert!(inc.start_time < inc.end_time);
                prop_assert!(inc.affected_hosts.contains(&inc.target_host));
                prop_assert!(inc.affected_services.contains(&inc.target_service));
                prop_assert!(inc.hop <= max_hops);
                if let Some(parent) = &inc.cascaded_from {
                    prop_assert!(by_id[parent].start_time <= inc.start_time);
                    let root = inc.root_incident.clone().unwrap();
                    if inc.incident_type != IncidentType::NetworkPartition {
                        prop_assert!(cascaded.insert((root.as_str().to_string(), inc.target_service.clone())));
                    }
                }
            }
            let created: usize = days.iter().map(|d| d.delta.created.len()).sum();
            prop_assert_eq!(created, incidents.len());
            for day in &days {
                for m in &day.metrics {
                    for (name, value) in &m.metrics {
                        let kind = MetricKind::ALL.iter().find(|k| k.base_name() == name).unwrap();
                        let (lo, hi) = kind.valid_range();
                        prop_assert!((lo..=hi).contains(value));
                    }
                }
            }
        }
    }
}
