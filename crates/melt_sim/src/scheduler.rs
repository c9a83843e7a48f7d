//! Daily primary-incident scheduling.
//!
//! The scheduler is a pure function of `(day, seed, topology, config, open
//! incidents)`. Scripted incidents are placed first, then up to
//! `max_primary_incidents_per_day` random injection attempts are made.
//! Each placed primary goes through an expansion hook before the next
//! placement, so same-day secondaries count against the per-host limit.

use crate::rng::{incident_id, RngStreams};
use crate::topology::Topology;
use chrono::{DateTime, Duration, Utc};
use melt_model::{GenerationConfig, Host, Incident, IncidentType, ScriptedIncident};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An injection that was skipped because no host could take it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConflict {
    /// Simulated day.
    pub day: u32,
    /// Intended start.
    pub at: DateTime<Utc>,
    /// Intended type.
    pub incident_type: IncidentType,
    /// Intended service, when one was fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Why it was skipped.
    pub reason: String,
}

/// Incidents created for one day, plus skipped injections.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// New incidents in creation order, each primary followed by its
    /// expansion.
    pub incidents: Vec<Incident>,
    /// Skipped injections.
    pub conflicts: Vec<SchedulingConflict>,
}

/// Places primary incidents.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    config: &'a GenerationConfig,
    topology: &'a Topology,
    streams: RngStreams,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler over a built topology.
    pub const fn new(config: &'a GenerationConfig, topology: &'a Topology) -> Self {
        Self {
            config,
            topology,
            streams: RngStreams::new(config.seed),
        }
    }

    /// Decides the primary incidents of `day`.
    ///
    /// `open` holds incidents from earlier days that are still unresolved at
    /// the start of `day`; they count against the per-host limit.
    pub fn schedule_day(&self, day: u32, open: &[Incident]) -> Schedule {
        self.schedule_day_with(day, open, |primary| vec![primary])
    }

    /// Like [`Self::schedule_day`], replacing every placed primary with
    /// `expand(primary)` before the next placement is tried.
    pub fn schedule_day_with<F>(&self, day: u32, open: &[Incident], mut expand: F) -> Schedule
    where
        F: FnMut(Incident) -> Vec<Incident>,
    {
        let mut schedule = Schedule::default();
        let mut rng = self.streams.stream(day, "scheduler", "primaries");

        for scripted in self.config.incidents.scripted.iter().filter(|s| s.day == day) {
            self.place_scripted(day, scripted, open, &mut rng, &mut schedule, &mut expand);
        }

        let settings = &self.config.incidents;
        for _ in 0..settings.max_primary_incidents_per_day {
            if !rng.gen_bool(settings.daily_incident_probability) {
                continue;
            }
            self.place_random(day, open, &mut rng, &mut schedule, &mut expand);
        }
        schedule
    }

    fn place_scripted(
        &self,
        day: u32,
        scripted: &ScriptedIncident,
        open: &[Incident],
        rng: &mut ChaCha8Rng,
        schedule: &mut Schedule,
        expand: &mut impl FnMut(Incident) -> Vec<Incident>,
    ) {
        let start = self.config.start_of_day(day)
            + Duration::minutes(i64::from(scripted.start_minute));
        let end = start + Duration::minutes(i64::from(scripted.duration_minutes));
        let host = self.topology.hosts_of(&scripted.service).nth(scripted.host_index);

        let conflict = |reason: &str| SchedulingConflict {
            day,
            at: start,
            incident_type: scripted.incident_type,
            service: Some(scripted.service.clone()),
            reason: reason.to_string(),
        };
        let Some(host) = host else {
            record_conflict(schedule, conflict("scripted host index out of range"));
            return;
        };
        if !self.has_capacity(host, start, end, open, &schedule.incidents) {
            record_conflict(schedule, conflict("target host at concurrency limit"));
            return;
        }

        let incident = Incident::new(incident_id(rng), scripted.incident_type, host, start, end);
        debug!(
            id = %incident.id,
            incident_type = %incident.incident_type,
            host = %host.id,
            "scripted incident placed"
        );
        schedule.incidents.extend(expand(incident));
    }

    fn place_random(
        &self,
        day: u32,
        open: &[Incident],
        rng: &mut ChaCha8Rng,
        schedule: &mut Schedule,
        expand: &mut impl FnMut(Incident) -> Vec<Incident>,
    ) {
        let settings = &self.config.incidents;
        let weights: Vec<f64> = IncidentType::ALL
            .iter()
            .map(|t| settings.profile(*t).weight)
            .collect();
        let Ok(type_dist) = WeightedIndex::new(&weights) else {
            return;
        };
        let incident_type = IncidentType::ALL[type_dist.sample(rng)];
        let profile = settings.profile(incident_type);

        let start = self.business_hours_start(day, rng);
        let minutes = rng.gen_range(profile.min_duration_minutes..=profile.max_duration_minutes);
        let end = start + Duration::minutes(i64::from(minutes));

        let (candidates, service) = self.candidates(incident_type, rng);
        let eligible: Vec<&Host> = candidates
            .into_iter()
            .filter(|h| self.has_capacity(h, start, end, open, &schedule.incidents))
            .collect();

        let host = WeightedIndex::new(eligible.iter().map(|h| settings.service_weight(&h.service)))
            .ok()
            .map(|dist| eligible[dist.sample(rng)]);
        let Some(host) = host else {
            record_conflict(
                schedule,
                SchedulingConflict {
                    day,
                    at: start,
                    incident_type,
                    service,
                    reason: "no eligible host".to_string(),
                },
            );
            return;
        };

        let incident = Incident::new(incident_id(rng), incident_type, host, start, end);
        debug!(
            id = %incident.id,
            incident_type = %incident_type,
            host = %host.id,
            start = %start,
            minutes,
            "primary incident scheduled"
        );
        schedule.incidents.extend(expand(incident));
    }

    /// Candidate targets for a type, and the service they were narrowed to.
    fn candidates(
        &self,
        incident_type: IncidentType,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<&'a Host>, Option<String>) {
        let topology = self.topology;
        match incident_type {
            IncidentType::NetworkPartition => {
                let regions = topology.occupied_regions();
                let hosts = regions
                    .choose(rng)
                    .map(|region| topology.hosts_in_region(region).collect())
                    .unwrap_or_default();
                (hosts, None)
            }
            IncidentType::ResourceExhaustion => {
                match self.config.incidents.shared_resource_service.as_deref() {
                    Some(shared) => (topology.hosts_of(shared).collect(), Some(shared.to_string())),
                    None => (topology.hosts().iter().collect(), None),
                }
            }
            _ => (topology.hosts().iter().collect(), None),
        }
    }

    /// A start inside business hours, aligned to the timestep.
    fn business_hours_start(&self, day: u32, rng: &mut ChaCha8Rng) -> DateTime<Utc> {
        let window = self.config.incidents.business_hours;
        let step = self.config.generation.granularity_minutes;
        let open = window.start_hour * 60;
        let close = window.end_hour * 60;
        let first = open.div_ceil(step) * step;
        // No grid point inside the window: use the one at or before it opens.
        let (first, slots) = if first < close {
            (first, (close - first).div_ceil(step))
        } else {
            (open / step * step, 1)
        };
        let minute = first + rng.gen_range(0..slots) * step;
        self.config.start_of_day(day) + Duration::minutes(i64::from(minute))
    }

    fn has_capacity(
        &self,
        host: &Host,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        open: &[Incident],
        placed: &[Incident],
    ) -> bool {
        let load = open
            .iter()
            .chain(placed)
            .filter(|i| i.affects_host(&host.id) && i.overlaps(start, end))
            .count();
        load < self.config.incidents.max_concurrent_incidents_per_host
    }
}

fn record_conflict(schedule: &mut Schedule, conflict: SchedulingConflict) {
    warn!(
        day = conflict.day,
        incident_type = %conflict.incident_type,
        reason = %conflict.reason,
        "injection skipped"
    );
    schedule.conflicts.push(conflict);
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_model::{PlainNaming, ServiceSpec};

    fn config() -> GenerationConfig {
        let mut config = GenerationConfig::default().with_days(30).with_granularity(15);
        config.topology.services = vec![
            ServiceSpec::new("a", &["b"]),
            ServiceSpec::new("b", &[]),
        ];
        config.topology.hosts_per_service = 2;
        config.incidents.shared_resource_service = Some("b".into());
        config
    }

    fn scripted(day: u32, service: &str, start_minute: u32) -> ScriptedIncident {
        ScriptedIncident {
            day,
            incident_type: IncidentType::CpuSaturation,
            service: service.into(),
            host_index: 0,
            start_minute,
            duration_minutes: 60,
        }
    }

    #[test]
    fn schedule_is_pure() {
        let mut config = config();
        config.incidents.daily_incident_probability = 1.0;
        config.incidents.max_primary_incidents_per_day = 3;
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let scheduler = Scheduler::new(&config, &topo);
        let a = scheduler.schedule_day(4, &[]);
        let b = scheduler.schedule_day(4, &[]);
        assert_eq!(a.incidents, b.incidents);
        assert_eq!(a.conflicts, b.conflicts);
    }

    #[test]
    fn random_starts_fall_in_business_hours() {
        let mut config = config();
        config.incidents.daily_incident_probability = 1.0;
        config.incidents.max_concurrent_incidents_per_host = 10;
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let scheduler = Scheduler::new(&config, &topo);
        for day in 0..30 {
            for inc in scheduler.schedule_day(day, &[]).incidents {
                let offset = (inc.start_time - config.start_of_day(day)).num_minutes();
                assert!((8 * 60..21 * 60).contains(&offset), "{offset}");
                assert_eq!(offset % 15, 0);
                assert!(inc.start_time < inc.end_time);
                let profile = config.incidents.profile(inc.incident_type);
                let minutes = inc.duration().num_minutes();
                assert!(minutes >= i64::from(profile.min_duration_minutes));
                assert!(minutes <= i64::from(profile.max_duration_minutes));
                if inc.incident_type == IncidentType::ResourceExhaustion {
                    assert_eq!(inc.target_service, "b");
                }
            }
        }
    }

    #[test]
    fn coarse_steps_keep_starts_on_the_grid() {
        for step in [90, 360] {
            let mut config = config().with_days(5).with_granularity(step);
            config.incidents.daily_incident_probability = 1.0;
            config.incidents.max_concurrent_incidents_per_host = 10;
            let topo = Topology::build(&config, &PlainNaming).unwrap();
            let scheduler = Scheduler::new(&config, &topo);
            let mut seen = 0;
            for day in 0..5 {
                for inc in scheduler.schedule_day(day, &[]).incidents {
                    let offset = (inc.start_time - config.start_of_day(day)).num_minutes();
                    assert_eq!(offset % i64::from(step), 0, "{step}: {offset}");
                    assert!((8 * 60..21 * 60).contains(&offset), "{step}: {offset}");
                    seen += 1;
                }
            }
            assert!(seen > 0);
        }
    }

    #[test]
    fn daily_step_falls_back_to_midnight() {
        let mut config = config().with_days(3).with_granularity(1440);
        config.incidents.daily_incident_probability = 1.0;
        config.incidents.max_concurrent_incidents_per_host = 10;
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let scheduler = Scheduler::new(&config, &topo);
        for day in 0..3 {
            for inc in scheduler.schedule_day(day, &[]).incidents {
                assert_eq!(inc.start_time, config.start_of_day(day));
            }
        }
    }

    #[test]
    fn concurrency_limit_records_conflict() {
        let mut config = config();
        config.incidents.daily_incident_probability = 0.0;
        config.incidents.scripted = vec![scripted(0, "a", 600), scripted(0, "a", 630)];
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let schedule = Scheduler::new(&config, &topo).schedule_day(0, &[]);
        assert_eq!(schedule.incidents.len(), 1);
        assert_eq!(schedule.conflicts.len(), 1);
        assert_eq!(schedule.conflicts[0].reason, "target host at concurrency limit");
    }

    #[test]
    fn open_incidents_block_hosts() {
        let mut config = config();
        config.incidents.daily_incident_probability = 0.0;
        config.incidents.scripted = vec![scripted(1, "a", 0)];
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let scheduler = Scheduler::new(&config, &topo);

        let host = topo.hosts_of("a").next().unwrap();
        let carried = Incident::new(
            melt_model::IncidentId::new("carried"),
            IncidentType::MemoryLeak,
            host,
            config.start_of_day(0) + Duration::hours(23),
            config.start_of_day(1) + Duration::hours(2),
        );
        let schedule = scheduler.schedule_day(1, &[carried]);
        assert!(schedule.incidents.is_empty());
        assert_eq!(schedule.conflicts.len(), 1);
    }

    #[test]
    fn no_eligible_host_is_a_conflict() {
        let mut config = config();
        config.incidents.daily_incident_probability = 1.0;
        config.incidents.max_primary_incidents_per_day = 6;
        config.incidents.max_concurrent_incidents_per_host = 1;
        for (t, settings) in &mut config.incidents.types {
            settings.min_duration_minutes = Some(1000);
            settings.max_duration_minutes = Some(1000);
            settings.weight = Some(if *t == IncidentType::CpuSaturation { 1.0 } else { 0.0 });
        }
        let topo = Topology::build(&config, &PlainNaming).unwrap();
        let schedule = Scheduler::new(&config, &topo).schedule_day(0, &[]);
        assert!(schedule.incidents.len() <= 4);
        assert_eq!(schedule.incidents.len() + schedule.conflicts.len(), 6);
    }
}
