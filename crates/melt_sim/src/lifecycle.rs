//! Incident state machine and severity envelope.
//!
//! Phase and severity are pure functions of `(incident, t)`. Nothing is
//! stored per timestep, so any host can be evaluated at any time in any
//! order.

use chrono::{DateTime, Utc};
use melt_model::{Incident, Phase, PhaseProfile};
use xxhash_rust::xxh64::xxh64;

/// Elapsed fraction of the incident window at `t`, clamped to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_fraction(incident: &Incident, t: DateTime<Utc>) -> f64 {
    let total = (incident.end_time - incident.start_time).num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (t - incident.start_time).num_milliseconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}

/// Returns the phase of `incident` at `t`.
pub fn phase_at(incident: &Incident, t: DateTime<Utc>) -> Phase {
    if t < incident.start_time {
        return Phase::Scheduled;
    }
    if t >= incident.end_time {
        return Phase::Resolved;
    }
    let profile = incident.incident_type.phase_profile();
    let f = elapsed_fraction(incident, t);
    if f < profile.onset {
        Phase::Onset
    } else if f < profile.peak_start() {
        Phase::Ramping
    } else if f < profile.recovery_start() {
        Phase::Active
    } else {
        Phase::Recovering
    }
}

/// Hermite ease on `[0, 1]`.
fn smoothstep(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Unit envelope over the elapsed fraction: eases up across onset and
/// ramp, holds at 1, eases down across recovery.
pub fn envelope(profile: &PhaseProfile, fraction: f64) -> f64 {
    if fraction <= 0.0 || fraction >= 1.0 {
        return 0.0;
    }
    let peak = profile.peak_start();
    let recovery = profile.recovery_start();
    if fraction < peak {
        smoothstep(fraction / peak)
    } else if fraction < recovery {
        1.0
    } else {
        smoothstep((1.0 - fraction) / (1.0 - recovery))
    }
}

/// Severity model shared by every synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeverityModel {
    active_jitter: f64,
}

impl SeverityModel {
    /// Creates a model. `active_jitter` is the largest relative dip applied
    /// while an incident is held at its peak.
    pub fn new(active_jitter: f64) -> Self {
        Self {
            active_jitter: active_jitter.clamp(0.0, 1.0),
        }
    }

    /// Severity multiplier of `incident` at `t`, in `[0, intensity]`.
    pub fn severity(&self, incident: &Incident, t: DateTime<Utc>) -> f64 {
        if t <= incident.start_time || t >= incident.end_time {
            return 0.0;
        }
        let profile = incident.incident_type.phase_profile();
        let f = elapsed_fraction(incident, t);
        let mut s = incident.intensity * envelope(&profile, f);
        if self.active_jitter > 0.0 && phase_at(incident, t) == Phase::Active {
            s *= 1.0 - self.active_jitter * jitter_unit(incident, t);
        }
        s.clamp(0.0, 1.0)
    }
}

#[allow(clippy::cast_precision_loss)]
fn jitter_unit(incident: &Incident, t: DateTime<Utc>) -> f64 {
    let key = xxh64(incident.id.as_str().as_bytes(), t.timestamp().unsigned_abs());
    key as f64 / u64::MAX as f64
}

/// Combines per-incident metric severities: the strongest wins.
pub fn combine_max(severities: impl IntoIterator<Item = f64>) -> f64 {
    severities.into_iter().fold(0.0, f64::max)
}
