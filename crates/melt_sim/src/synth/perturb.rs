//! Type-specific metric perturbations.
//!
//! Every incident type maps to exactly one function in [`PERTURBATIONS`].
//! The table is checked once at startup by [`validate_table`]; lookups after
//! that are plain indexing.

use crate::error::{Error, Result};
use melt_model::{IncidentType, MetricKind, MetricSample};

/// Per-draw inputs to a perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbContext {
    /// Current severity multiplier in `[0, 1]`.
    pub severity: f64,
    /// Hours since the incident started.
    pub elapsed_hours: f64,
    /// Whether the host belongs to the shared-resource service.
    pub on_shared_resource: bool,
    /// Uniform draw in `[0, 1)`.
    pub roll: f64,
    /// Standard normal draw.
    pub noise: f64,
}

/// Maps a baseline sample to a perturbed one.
pub type PerturbFn = fn(&MetricSample, &PerturbContext) -> MetricSample;

/// Perturbation table, one entry per type in declaration order.
pub static PERTURBATIONS: [(IncidentType, PerturbFn); IncidentType::COUNT] = [
    (IncidentType::MemoryLeak, memory_leak),
    (IncidentType::DbContention, db_contention),
    (IncidentType::NetworkPacketLoss, packet_loss),
    (IncidentType::CpuSaturation, cpu_saturation),
    (IncidentType::CascadingFailure, cascading_failure),
    (IncidentType::NetworkPartition, network_partition),
    (IncidentType::DependencyDegradation, dependency_degradation),
    (IncidentType::ConfigMismatch, config_mismatch),
    (IncidentType::ResourceExhaustion, resource_exhaustion),
];

/// Checks that the table covers every type at its own index.
///
/// # Errors
///
/// Returns [`Error::MissingPerturbation`] naming the first uncovered type.
pub fn validate_table() -> Result<()> {
    for incident_type in IncidentType::ALL {
        match PERTURBATIONS.get(incident_type.index()) {
            Some((entry, _)) if *entry == incident_type => {}
            _ => return Err(Error::MissingPerturbation(incident_type)),
        }
    }
    Ok(())
}

/// Applies the perturbation of `incident_type` and clamps the result.
pub fn apply(incident_type: IncidentType, base: &MetricSample, ctx: &PerturbContext) -> MetricSample {
    let (_, perturb) = PERTURBATIONS[incident_type.index()];
    let mut sample = perturb(base, ctx);
    sample.clamp_all();
    sample
}

fn lerp(from: f64, to: f64, s: f64) -> f64 {
    from + (to - from) * s
}

fn cpu_saturation(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::CpuUtil] = lerp(b[MetricKind::CpuUtil], 95.0 + 5.0 * c.roll, s);
    m[MetricKind::LatencyMs] += 50.0 * s;
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 3.0, s);
    m
}

fn memory_leak(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::MemUtil] += s * 20.0 * c.elapsed_hours;
    m[MetricKind::LatencyMs] += s * 10.0 * c.elapsed_hours;
    if m[MetricKind::MemUtil] > 90.0 {
        m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 5.0, s);
        m[MetricKind::CpuUtil] += 20.0 * s;
    }
    m
}

fn db_contention(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::LatencyMs] *= 1.0 + 4.0 * s;
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 2.0, s);
    m[MetricKind::DbPoolUtil] = (b[MetricKind::DbPoolUtil] * (1.0 + 2.0 * s)).min(100.0);
    if c.on_shared_resource {
        m[MetricKind::CpuUtil] += 30.0 * s;
    }
    m
}

fn packet_loss(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    let loss = s * (15.0 + 5.0 * c.noise).max(0.0);
    m[MetricKind::PacketLossPct] = b[MetricKind::PacketLossPct].max(loss);
    m[MetricKind::LatencyMs] += loss * 10.0;
    m[MetricKind::ErrorRate] = b[MetricKind::ErrorRate].max(loss / 10.0);
    m
}

fn network_partition(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::PacketLossPct] += s * (50.0 + 10.0 * c.noise).max(0.0);
    m[MetricKind::LatencyMs] *= 1.0 + 9.0 * s;
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 10.0, s);
    m[MetricKind::CpuUtil] += 20.0 * s;
    m
}

fn dependency_degradation(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::LatencyMs] += s * (200.0 + 50.0 * c.noise).max(0.0);
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 1.5, s);
    if m[MetricKind::LatencyMs] > 500.0 {
        m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 5.0, s);
    }
    m
}

fn cascading_failure(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::CpuUtil] += 40.0 * s;
    m[MetricKind::LatencyMs] += 100.0 * s;
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 4.0, s);
    m[MetricKind::MemUtil] += 20.0 * s;
    m
}

fn config_mismatch(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    if c.roll < 0.3 {
        m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 3.0, s);
    }
    m[MetricKind::LatencyMs] += 100.0 * s;
    m
}

fn resource_exhaustion(b: &MetricSample, c: &PerturbContext) -> MetricSample {
    let s = c.severity;
    let mut m = *b;
    m[MetricKind::ResourcePoolUtil] =
        lerp(b[MetricKind::ResourcePoolUtil], 95.0 + 5.0 * c.roll, s);
    m[MetricKind::LatencyMs] += 150.0 * s;
    m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 3.0, s);
    if m[MetricKind::ResourcePoolUtil] > 98.0 {
        m[MetricKind::ErrorRate] = lerp(b[MetricKind::ErrorRate], 8.0, s);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::incident_type;
    use proptest::prelude::*;

    fn baseline() -> MetricSample {
        let mut b = MetricSample::new();
        b[MetricKind::CpuUtil] = 30.0;
        b[MetricKind::MemUtil] = 40.0;
        b[MetricKind::LatencyMs] = 20.0;
        b[MetricKind::ErrorRate] = 0.1;
        b[MetricKind::RequestCount] = 300.0;
        b[MetricKind::DbPoolUtil] = 20.0;
        b[MetricKind::ResourcePoolUtil] = 30.0;
        b
    }

    fn ctx(severity: f64) -> PerturbContext {
        PerturbContext {
            severity,
            elapsed_hours: 1.0,
            on_shared_resource: false,
            roll: 0.5,
            noise: 0.0,
        }
    }

    #[test]
    fn table_covers_every_type() {
        assert!(validate_table().is_ok());
    }

    #[test]
    fn saturated_cpu_reaches_threshold() {
        for roll in [0.0, 0.5, 0.999] {
            let c = PerturbContext { roll, ..ctx(1.0) };
            let m = apply(IncidentType::CpuSaturation, &baseline(), &c);
            assert!(m[MetricKind::CpuUtil] >= 95.0);
        }
    }

    #[test]
    fn memory_leak_grows_with_time() {
        let at = |elapsed_hours: f64| {
            let c = PerturbContext { elapsed_hours, ..ctx(1.0) };
            apply(IncidentType::MemoryLeak, &baseline(), &c)
        };
        assert!(at(2.0)[MetricKind::MemUtil] > at(0.5)[MetricKind::MemUtil]);
        let saturated = at(10.0);
        assert!((saturated[MetricKind::MemUtil] - 100.0).abs() < f64::EPSILON);
        assert!(saturated[MetricKind::ErrorRate] >= 5.0 - 1e-9);
    }

    #[test]
    fn shared_resource_heats_cpu() {
        let plain = apply(IncidentType::DbContention, &baseline(), &ctx(1.0));
        let shared = apply(
            IncidentType::DbContention,
            &baseline(),
            &PerturbContext { on_shared_resource: true, ..ctx(1.0) },
        );
        assert!(shared[MetricKind::CpuUtil] > plain[MetricKind::CpuUtil]);
        assert!((plain[MetricKind::DbPoolUtil] - 60.0).abs() < 1e-9);
    }

    #[test]
    fn packet_loss_shows_up_in_loss_metric() {
        let m = apply(IncidentType::NetworkPacketLoss, &baseline(), &ctx(1.0));
        assert!((m[MetricKind::PacketLossPct] - 15.0).abs() < 1e-9);
        assert!((m[MetricKind::ErrorRate] - 1.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn zero_severity_is_identity(t in incident_type(), roll in 0.0f64..1.0, noise in -3.0f64..3.0) {
            let c = PerturbContext { roll, noise, ..ctx(0.0) };
            prop_assert_eq!(apply(t, &baseline(), &c), baseline());
        }

        #[test]
        fn outputs_stay_in_range(
            t in incident_type(),
            severity in 0.0f64..=1.0,
            hours in 0.0f64..48.0,
            noise in -4.0f64..4.0,
        ) {
            let c = PerturbContext { severity, elapsed_hours: hours, noise, ..ctx(0.0) };
            for (kind, value) in apply(t, &baseline(), &c).iter() {
                let (lo, hi) = kind.valid_range();
                prop_assert!((lo..=hi).contains(&value));
            }
        }
    }
}
