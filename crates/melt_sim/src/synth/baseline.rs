//! Healthy-state metric distributions.

use crate::rng::gauss;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use melt_model::{HourWindow, MetricKind, MetricSample};
use rand::Rng;
use std::f64::consts::PI;

/// Traffic multiplier applied during the maintenance window.
const MAINTENANCE_FACTOR: f64 = 0.3;
/// Traffic multiplier applied on weekends when weekly seasonality is on.
const WEEKEND_FACTOR: f64 = 0.6;

/// Seasonality switches for baseline draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seasonality {
    /// Hours with reduced traffic.
    pub maintenance: HourWindow,
    /// Whether weekends carry less traffic.
    pub weekly: bool,
}

impl Seasonality {
    /// Traffic multiplier at `t`.
    pub fn traffic_factor(&self, t: DateTime<Utc>) -> f64 {
        let hour = t.hour();
        let fractional = f64::from(hour) + f64::from(t.minute()) / 60.0;
        let mut factor = 1.0 + 0.5 * ((fractional - 9.0) * PI / 12.0).sin();
        if self.maintenance.contains(hour) {
            factor *= MAINTENANCE_FACTOR;
        }
        if self.weekly && matches!(t.weekday(), Weekday::Sat | Weekday::Sun) {
            factor *= WEEKEND_FACTOR;
        }
        factor
    }
}

/// Draws the healthy value of every metric at `t`.
///
/// Draw order is fixed so a stream always yields the same sample for the
/// same timestep.
pub fn draw<R: Rng>(rng: &mut R, t: DateTime<Utc>, seasonality: &Seasonality) -> MetricSample {
    let traffic = seasonality.traffic_factor(t);
    let mut sample = MetricSample::new();
    sample[MetricKind::CpuUtil] = gauss(rng, 30.0, 5.0) * traffic;
    sample[MetricKind::MemUtil] = gauss(rng, 40.0, 2.0);
    sample[MetricKind::LatencyMs] = gauss(rng, 20.0, 5.0);
    sample[MetricKind::ErrorRate] = 0.1;
    sample[MetricKind::RequestCount] = rng.gen_range(100.0..500.0) * traffic;
    sample[MetricKind::PacketLossPct] = 0.0;
    sample[MetricKind::DbPoolUtil] = gauss(rng, 20.0, 5.0);
    sample[MetricKind::ResourcePoolUtil] = gauss(rng, 30.0, 10.0);
    sample.clamp_all();
    sample
}
