//! Typed metric samples.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Base metric emitted for every host at every timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// CPU utilization, percent.
    #[serde(rename = "system.cpu.util")]
    CpuUtil,
    /// Memory utilization, percent.
    #[serde(rename = "system.mem.util")]
    MemUtil,
    /// Request latency, milliseconds.
    #[serde(rename = "net.latency.ms")]
    LatencyMs,
    /// Application error rate, percent.
    #[serde(rename = "app.error_rate")]
    ErrorRate,
    /// Requests served during the step.
    #[serde(rename = "app.request_count")]
    RequestCount,
    /// Packet loss, percent.
    #[serde(rename = "net.packet_loss.pct")]
    PacketLossPct,
    /// Database connection pool utilization, percent.
    #[serde(rename = "db.connection_pool.util")]
    DbPoolUtil,
    /// Shared resource pool utilization, percent.
    #[serde(rename = "resource.pool.util")]
    ResourcePoolUtil,
}

impl MetricKind {
    /// Number of metric kinds.
    pub const COUNT: usize = 8;

    /// All kinds, in emission order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::CpuUtil,
        Self::MemUtil,
        Self::LatencyMs,
        Self::ErrorRate,
        Self::RequestCount,
        Self::PacketLossPct,
        Self::DbPoolUtil,
        Self::ResourcePoolUtil,
    ];

    /// Provider-neutral metric name.
    pub const fn base_name(self) -> &'static str {
        match self {
            Self::CpuUtil => "system.cpu.util",
            Self::MemUtil => "system.mem.util",
            Self::LatencyMs => "net.latency.ms",
            Self::ErrorRate => "app.error_rate",
            Self::RequestCount => "app.request_count",
            Self::PacketLossPct => "net.packet_loss.pct",
            Self::DbPoolUtil => "db.connection_pool.util",
            Self::ResourcePoolUtil => "resource.pool.util",
        }
    }

    /// Inclusive range of valid values.
    pub const fn valid_range(self) -> (f64, f64) {
        match self {
            Self::LatencyMs => (0.0, 60_000.0),
            Self::RequestCount => (0.0, 1_000_000.0),
            _ => (0.0, 100.0),
        }
    }

    /// Clamps `value` into the valid range. NaN becomes the lower bound.
    pub fn clamp(self, value: f64) -> f64 {
        let (lo, hi) = self.valid_range();
        if value.is_nan() {
            lo
        } else {
            value.clamp(lo, hi)
        }
    }

    /// Rounds a value the way it is published: whole requests, otherwise
    /// two decimals.
    pub fn publish(self, value: f64) -> f64 {
        let value = self.clamp(value);
        match self {
            Self::RequestCount => value.round(),
            _ => (value * 100.0).round() / 100.0,
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// One value per [`MetricKind`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricSample {
    values: [f64; MetricKind::COUNT],
}

impl MetricSample {
    /// Creates a sample with every metric at zero.
    pub const fn new() -> Self {
        Self {
            values: [0.0; MetricKind::COUNT],
        }
    }

    /// Iterates over `(kind, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        MetricKind::ALL.iter().map(|k| (*k, self.values[k.slot()]))
    }

    /// Clamps every value into its valid range.
    pub fn clamp_all(&mut self) {
        for kind in MetricKind::ALL {
            self.values[kind.slot()] = kind.clamp(self.values[kind.slot()]);
        }
    }

    /// Keeps, per metric, whichever of `self` and `other` deviates more from
    /// `baseline`.
    pub fn merge_strongest(&mut self, other: &Self, baseline: &Self) {
        for kind in MetricKind::ALL {
            let slot = kind.slot();
            let mine = (self.values[slot] - baseline.values[slot]).abs();
            let theirs = (other.values[slot] - baseline.values[slot]).abs();
            if theirs > mine {
                self.values[slot] = other.values[slot];
            }
        }
    }
}

impl Index<MetricKind> for MetricSample {
    type Output = f64;

    fn index(&self, kind: MetricKind) -> &f64 {
        &self.values[kind.slot()]
    }
}

impl IndexMut<MetricKind> for MetricSample {
    fn index_mut(&mut self, kind: MetricKind) -> &mut f64 {
        &mut self.values[kind.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert!((MetricKind::CpuUtil.clamp(140.0) - 100.0).abs() < f64::EPSILON);
        assert!(MetricKind::CpuUtil.clamp(-3.0).abs() < f64::EPSILON);
        assert!(MetricKind::MemUtil.clamp(f64::NAN).abs() < f64::EPSILON);
    }

    #[test]
    fn publish_rounds() {
        assert!((MetricKind::LatencyMs.publish(12.3456) - 12.35).abs() < 1e-9);
        assert!((MetricKind::RequestCount.publish(241.6) - 242.0).abs() < 1e-9);
    }

    #[test]
    fn merge_keeps_largest_deviation() {
        let mut baseline = MetricSample::new();
        baseline[MetricKind::CpuUtil] = 30.0;
        baseline[MetricKind::LatencyMs] = 20.0;

        let mut a = baseline;
        a[MetricKind::CpuUtil] = 100.0;
        let mut b = baseline;
        b[MetricKind::CpuUtil] = 50.0;
        b[MetricKind::LatencyMs] = 220.0;

        a.merge_strongest(&b, &baseline);
        assert!((a[MetricKind::CpuUtil] - 100.0).abs() < f64::EPSILON);
        assert!((a[MetricKind::LatencyMs] - 220.0).abs() < f64::EPSILON);
    }

    #[test]
    fn iter_follows_emission_order() {
        let names: Vec<_> = MetricSample::new().iter().map(|(k, _)| k.base_name()).collect();
        assert_eq!(names.first(), Some(&"system.cpu.util"));
        assert_eq!(names.len(), MetricKind::COUNT);
    }
}
