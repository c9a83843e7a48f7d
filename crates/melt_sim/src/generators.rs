//! Proptest strategies for engine inputs.

use chrono::{Duration, TimeZone, Utc};
use melt_model::{
    CloudProvider, GenerationConfig, Host, Incident, IncidentId, IncidentType, ServiceSpec,
};
use proptest::prelude::*;

/// Any incident type.
pub fn incident_type() -> impl Strategy<Value = IncidentType> {
    proptest::sample::select(IncidentType::ALL.to_vec())
}

/// An incident with a random type, duration and intensity, paired with a
/// minute offset that lies strictly inside its window.
pub fn incident_window() -> impl Strategy<Value = (Incident, i64)> {
    (incident_type(), 2i64..=720, 0.05f64..=1.0, 0u32..1440)
        .prop_flat_map(|(incident_type, minutes, intensity, start_minute)| {
            let host = Host::new("host-00", "svc", CloudProvider::Onpremise, "dc1");
            let start = Utc
                .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
                .single()
                .unwrap_or_default()
                + Duration::minutes(i64::from(start_minute));
            let incident = Incident::new(
                IncidentId::new(format!("inc-{incident_type}-{minutes}")),
                incident_type,
                &host,
                start,
                start + Duration::minutes(minutes),
            )
            .with_intensity(intensity);
            (Just(incident), 1..minutes)
        })
}

/// A small valid configuration: a linear service chain with a few hosts,
/// a handful of days and a busy incident schedule.
pub fn small_config() -> impl Strategy<Value = GenerationConfig> {
    (any::<u64>(), 1usize..=4, 1usize..=3, 1u32..=3, 0.0f64..=1.0).prop_map(
        |(seed, services, hosts, days, probability)| {
            let mut config = GenerationConfig::default()
                .with_seed(seed)
                .with_days(days)
                .with_granularity(60);
            config.topology.services = (0..services)
                .map(|i| {
                    let name = format!("svc-{i}");
                    if i + 1 < services {
                        let next = format!("svc-{}", i + 1);
                        ServiceSpec::new(name, &[next.as_str()])
                    } else {
                        ServiceSpec::new(name, &[])
                    }
                })
                .collect();
            config.topology.hosts_per_service = hosts;
            config.incidents.daily_incident_probability = probability;
            config.incidents.max_primary_incidents_per_day = 2;
            config.incidents.shared_resource_service = Some(format!("svc-{}", services - 1));
            config
        },
    )
}
