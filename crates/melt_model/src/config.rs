//! Generation configuration.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Configurations load from JSON or YAML depending on the file extension and
//! are validated once, before any generation starts.

use crate::error::{Error, Result};
use crate::fleet::CloudProvider;
use crate::incident::{IncidentType, PhaseProfile};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Master seed. Every random stream derives from it.
    pub seed: u64,
    /// Simulated time window.
    pub generation: GenerationWindow,
    /// Cloud providers and their regions.
    pub clouds: BTreeMap<CloudProvider, CloudSettings>,
    /// Services and hosts.
    pub topology: TopologySettings,
    /// Incident injection.
    pub incidents: IncidentSettings,
    /// Cascade propagation.
    pub cascade: CascadeSettings,
    /// Signal synthesis.
    pub synthesis: SynthesisSettings,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            generation: GenerationWindow::default(),
            clouds: default_clouds(),
            topology: TopologySettings::default(),
            incidents: IncidentSettings::default(),
            cascade: CascadeSettings::default(),
            synthesis: SynthesisSettings::default(),
        }
    }
}

fn default_clouds() -> BTreeMap<CloudProvider, CloudSettings> {
    CloudProvider::ALL
        .into_iter()
        .map(|cloud| {
            let regions: &[&str] = match cloud {
                CloudProvider::Aws => &["us-east-1", "eu-west-1"],
                CloudProvider::Azure => &["eastus", "westeurope"],
                CloudProvider::Gcp => &["us-east1", "europe-west1"],
                CloudProvider::Openstack => &["region-one"],
                CloudProvider::Nutanix => &["cluster-1"],
                CloudProvider::Vmware => &["datacenter-1"],
                CloudProvider::Onpremise => &["on-prem-dc1"],
            };
            let settings = CloudSettings {
                enabled: cloud == CloudProvider::Onpremise,
                regions: regions.iter().map(ToString::to_string).collect(),
            };
            (cloud, settings)
        })
        .collect()
}

impl GenerationConfig {
    /// Loads a configuration from a `.json`, `.yaml` or `.yml` file.
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// configuration is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let config = if is_yaml {
            Self::from_yaml_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };
        config.validate()?;
        debug!(
            path = %path.display(),
            seed = config.seed,
            days = config.generation.days_to_generate,
            services = config.topology.services.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parses a JSON document without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses a YAML document without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Renders the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sets the master seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of simulated days.
    #[must_use]
    pub const fn with_days(mut self, days: u32) -> Self {
        self.generation.days_to_generate = days;
        self
    }

    /// Sets the timestep granularity.
    #[must_use]
    pub const fn with_granularity(mut self, minutes: u32) -> Self {
        self.generation.granularity_minutes = minutes;
        self
    }

    /// Returns `(provider, region)` for every enabled region, in provider
    /// order then configuration order.
    pub fn enabled_regions(&self) -> Vec<(CloudProvider, String)> {
        self.clouds
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .flat_map(|(cloud, settings)| {
                settings.regions.iter().map(move |region| (*cloud, region.clone()))
            })
            .collect()
    }

    /// Returns the calendar date of simulated day `day`.
    pub fn date_of(&self, day: u32) -> NaiveDate {
        self.generation.start_date + Duration::days(i64::from(day))
    }

    /// Returns midnight UTC of simulated day `day`.
    pub fn start_of_day(&self, day: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date_of(day).and_time(NaiveTime::MIN))
    }

    /// Returns the number of timesteps in one day.
    pub const fn steps_per_day(&self) -> u32 {
        MINUTES_PER_DAY / self.generation.granularity_minutes
    }

    /// Returns the timestep length.
    pub fn step(&self) -> Duration {
        Duration::minutes(i64::from(self.generation.granularity_minutes))
    }

    /// Checks every setting that can be checked without building the fleet.
    ///
    /// Dependency edges and cycles are checked when the topology is built.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        if self.enabled_regions().is_empty() {
            return Err(Error::NoRegions);
        }
        self.topology.validate()?;

        let services: BTreeSet<&str> = self
            .topology
            .services
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        self.incidents
            .validate(&services, &self.generation, self.topology.hosts_per_service)?;
        self.cascade.validate()?;
        self.synthesis.validate()?;
        Ok(())
    }
}

/// Simulated time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationWindow {
    /// First simulated day.
    pub start_date: NaiveDate,
    /// Number of simulated days.
    pub days_to_generate: u32,
    /// Timestep length in minutes.
    pub granularity_minutes: u32,
}

impl Default for GenerationWindow {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or(NaiveDate::MIN),
            days_to_generate: 365,
            granularity_minutes: 15,
        }
    }
}

impl GenerationWindow {
    fn validate(&self) -> Result<()> {
        if self.days_to_generate == 0 {
            return Err(Error::InvalidDateRange("days_to_generate must be at least 1".into()));
        }
        if self
            .start_date
            .checked_add_signed(Duration::days(i64::from(self.days_to_generate)))
            .is_none()
        {
            return Err(Error::InvalidDateRange(format!(
                "{} + {} days overflows the calendar",
                self.start_date, self.days_to_generate
            )));
        }
        let g = self.granularity_minutes;
        if g == 0 || MINUTES_PER_DAY % g != 0 {
            return Err(Error::InvalidGranularity(g));
        }
        Ok(())
    }
}

/// One cloud provider's settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    /// Whether hosts may be placed on this provider.
    pub enabled: bool,
    /// Regions hosts may be placed in.
    pub regions: Vec<String>,
}

/// A service and the services it calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,
    /// Services this one calls.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ServiceSpec {
    /// Creates a service spec.
    #[must_use]
    pub fn new(name: impl Into<String>, depends_on: &[&str]) -> Self {
        Self {
            name: name.into(),
            depends_on: depends_on.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Services and host pool sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Services, in declaration order.
    pub services: Vec<ServiceSpec>,
    /// Hosts created for every service.
    pub hosts_per_service: usize,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            services: vec![
                ServiceSpec::new(
                    "web-frontend",
                    &["auth-service", "payment-gateway", "recommendation-engine"],
                ),
                ServiceSpec::new("auth-service", &["inventory-db"]),
                ServiceSpec::new("payment-gateway", &["inventory-db"]),
                ServiceSpec::new("inventory-db", &[]),
                ServiceSpec::new("recommendation-engine", &["inventory-db"]),
            ],
            hosts_per_service: 5,
        }
    }
}

impl TopologySettings {
    fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(Error::ZeroHosts("no services configured".into()));
        }
        if self.hosts_per_service == 0 {
            return Err(Error::ZeroHosts("hosts_per_service is 0".into()));
        }
        Ok(())
    }
}

/// Hour-of-day window `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    /// First hour (inclusive).
    pub start_hour: u32,
    /// Last hour (exclusive).
    pub end_hour: u32,
}

impl HourWindow {
    /// Creates a window.
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Returns true if `hour` falls inside the window.
    pub const fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(Error::InvalidSetting(format!(
                "{name} must satisfy start_hour < end_hour <= 24, got {}..{}",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }
}

/// Per-type overrides. Unset fields fall back to the type's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSettings {
    /// Relative selection weight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Per-edge cascade probability factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_probability: Option<f64>,
    /// Shortest duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_duration_minutes: Option<u32>,
    /// Longest duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<u32>,
}

/// Fully resolved settings for one incident type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeProfile {
    /// Relative selection weight.
    pub weight: f64,
    /// Per-edge cascade probability factor.
    pub cascade_probability: f64,
    /// Shortest duration.
    pub min_duration_minutes: u32,
    /// Longest duration.
    pub max_duration_minutes: u32,
    /// Lifecycle phase fractions.
    pub phases: PhaseProfile,
}

/// An incident placed at a fixed time rather than drawn at random.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedIncident {
    /// Simulated day (0-based).
    pub day: u32,
    /// Incident type.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Target service.
    pub service: String,
    /// Index of the target host within the service pool.
    #[serde(default)]
    pub host_index: usize,
    /// Start, in minutes after midnight.
    pub start_minute: u32,
    /// Duration in minutes.
    pub duration_minutes: u32,
}

/// Incident injection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentSettings {
    /// Probability that one injection attempt fires.
    pub daily_incident_probability: f64,
    /// Injection attempts per day.
    pub max_primary_incidents_per_day: u32,
    /// Unresolved incidents a host may carry before it stops being eligible.
    pub max_concurrent_incidents_per_host: usize,
    /// Window in which random incidents start.
    pub business_hours: HourWindow,
    /// Service targeted by resource exhaustion, when set.
    pub shared_resource_service: Option<String>,
    /// Relative target weight per service. Missing services weigh 1.
    pub service_weights: BTreeMap<String, f64>,
    /// Per-type overrides.
    pub types: BTreeMap<IncidentType, TypeSettings>,
    /// Incidents placed at fixed times.
    pub scripted: Vec<ScriptedIncident>,
}

impl Default for IncidentSettings {
    fn default() -> Self {
        let types = IncidentType::ALL
            .into_iter()
            .map(|t| {
                let (min, max) = t.default_duration_minutes();
                let settings = TypeSettings {
                    weight: Some(t.default_weight()),
                    cascade_probability: Some(t.default_cascade_probability()),
                    min_duration_minutes: Some(min),
                    max_duration_minutes: Some(max),
                };
                (t, settings)
            })
            .collect();
        Self {
            daily_incident_probability: 0.28,
            max_primary_incidents_per_day: 1,
            max_concurrent_incidents_per_host: 1,
            business_hours: HourWindow::new(8, 21),
            shared_resource_service: Some("inventory-db".to_string()),
            service_weights: BTreeMap::new(),
            types,
            scripted: Vec::new(),
        }
    }
}

impl IncidentSettings {
    /// Resolves the settings for one type, filling gaps with defaults.
    pub fn profile(&self, incident_type: IncidentType) -> TypeProfile {
        let overrides = self.types.get(&incident_type).copied().unwrap_or_default();
        let (min, max) = incident_type.default_duration_minutes();
        TypeProfile {
            weight: overrides.weight.unwrap_or_else(|| incident_type.default_weight()),
            cascade_probability: overrides
                .cascade_probability
                .unwrap_or_else(|| incident_type.default_cascade_probability()),
            min_duration_minutes: overrides.min_duration_minutes.unwrap_or(min),
            max_duration_minutes: overrides.max_duration_minutes.unwrap_or(max),
            phases: incident_type.phase_profile(),
        }
    }

    /// Returns the target weight of a service.
    pub fn service_weight(&self, service: &str) -> f64 {
        self.service_weights.get(service).copied().unwrap_or(1.0)
    }

    fn validate(
        &self,
        services: &BTreeSet<&str>,
        window: &GenerationWindow,
        hosts_per_service: usize,
    ) -> Result<()> {
        check_probability("incidents.daily_incident_probability", self.daily_incident_probability)?;
        if self.max_concurrent_incidents_per_host == 0 {
            return Err(Error::InvalidSetting(
                "incidents.max_concurrent_incidents_per_host must be at least 1".into(),
            ));
        }
        self.business_hours.validate("incidents.business_hours")?;

        if let Some(shared) = &self.shared_resource_service {
            if !services.contains(shared.as_str()) {
                return Err(Error::UnknownService {
                    service: shared.clone(),
                    context: "incidents.shared_resource_service".into(),
                });
            }
        }
        for (service, weight) in &self.service_weights {
            if !services.contains(service.as_str()) {
                return Err(Error::UnknownService {
                    service: service.clone(),
                    context: "incidents.service_weights".into(),
                });
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidSetting(format!(
                    "incidents.service_weights.{service} must be >= 0, got {weight}"
                )));
            }
        }

        let mut total_weight = 0.0;
        for t in IncidentType::ALL {
            let profile = self.profile(t);
            if !profile.weight.is_finite() || profile.weight < 0.0 {
                return Err(Error::InvalidSetting(format!(
                    "incidents.types.{t}.weight must be >= 0, got {}",
                    profile.weight
                )));
            }
            total_weight += profile.weight;
            check_probability(
                format!("incidents.types.{t}.cascade_probability"),
                profile.cascade_probability,
            )?;
            if profile.min_duration_minutes == 0
                || profile.min_duration_minutes > profile.max_duration_minutes
            {
                return Err(Error::InvalidDuration {
                    context: t.to_string(),
                    min: profile.min_duration_minutes,
                    max: profile.max_duration_minutes,
                });
            }
            profile.phases.validate(t)?;
        }
        if total_weight <= 0.0 && self.daily_incident_probability > 0.0 {
            return Err(Error::InvalidSetting(
                "incident type weights sum to zero while injection is enabled".into(),
            ));
        }

        for (i, scripted) in self.scripted.iter().enumerate() {
            let context = format!("incidents.scripted[{i}]");
            if !services.contains(scripted.service.as_str()) {
                return Err(Error::UnknownService {
                    service: scripted.service.clone(),
                    context,
                });
            }
            if scripted.day >= window.days_to_generate {
                return Err(Error::InvalidSetting(format!(
                    "{context}.day {} is outside the {} generated days",
                    scripted.day, window.days_to_generate
                )));
            }
            if scripted.host_index >= hosts_per_service {
                return Err(Error::InvalidSetting(format!(
                    "{context}.host_index {} exceeds hosts_per_service {hosts_per_service}",
                    scripted.host_index
                )));
            }
            if scripted.start_minute >= MINUTES_PER_DAY {
                return Err(Error::InvalidSetting(format!(
                    "{context}.start_minute must be < {MINUTES_PER_DAY}"
                )));
            }
            if scripted.duration_minutes == 0 {
                return Err(Error::InvalidDuration {
                    context,
                    min: 0,
                    max: 0,
                });
            }
        }
        Ok(())
    }
}

/// Cascade propagation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Longest chain from a primary to a secondary.
    pub max_hops: u32,
    /// Per-edge trigger probability, multiplied by the type's factor.
    pub edge_probability: f64,
    /// Intensity multiplier applied per hop, strictly between 0 and 1.
    pub severity_decay: f64,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            max_hops: 3,
            edge_probability: 0.6,
            severity_decay: 0.7,
        }
    }
}

impl CascadeSettings {
    fn validate(&self) -> Result<()> {
        check_probability("cascade.edge_probability", self.edge_probability)?;
        if !(self.severity_decay > 0.0 && self.severity_decay < 1.0) {
            return Err(Error::InvalidSetting(format!(
                "cascade.severity_decay must be within (0, 1), got {}",
                self.severity_decay
            )));
        }
        Ok(())
    }
}

/// Signal synthesis settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Requests (trace + log pairs) per host per timestep.
    pub requests_per_step: u32,
    /// Share of an incident's hosts left unperturbed.
    pub partial_outage_fraction: f64,
    /// Additional share left unperturbed during maintenance hours.
    pub maintenance_exclusion_fraction: f64,
    /// Maintenance window start hour.
    pub maintenance_start_hour: u32,
    /// Maintenance window end hour (exclusive).
    pub maintenance_end_hour: u32,
    /// Scale weekend traffic down.
    pub weekly_seasonality: bool,
    /// Relative jitter applied to severity while an incident is active.
    pub active_jitter: f64,
    /// Synthesize hosts on the rayon pool.
    pub parallel: bool,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            requests_per_step: 1,
            partial_outage_fraction: 0.3,
            maintenance_exclusion_fraction: 0.0,
            maintenance_start_hour: 2,
            maintenance_end_hour: 5,
            weekly_seasonality: false,
            active_jitter: 0.0,
            parallel: true,
        }
    }
}

impl SynthesisSettings {
    /// Returns the maintenance window.
    pub const fn maintenance_window(&self) -> HourWindow {
        HourWindow::new(self.maintenance_start_hour, self.maintenance_end_hour)
    }

    fn validate(&self) -> Result<()> {
        check_probability("synthesis.partial_outage_fraction", self.partial_outage_fraction)?;
        check_probability(
            "synthesis.maintenance_exclusion_fraction",
            self.maintenance_exclusion_fraction,
        )?;
        check_probability("synthesis.active_jitter", self.active_jitter)?;
        self.maintenance_window().validate("synthesis maintenance window")?;
        Ok(())
    }
}

fn check_probability(field: impl Into<String>, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::probability(field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        let config = GenerationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.steps_per_day(), 96);
        assert_eq!(
            config.enabled_regions(),
            vec![(CloudProvider::Onpremise, "on-prem-dc1".to_string())]
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = GenerationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn partial_type_override_keeps_other_defaults() {
        let yaml = "
incidents:
  types:
    MEMORY_LEAK:
      weight: 0.9
";
        let config = GenerationConfig::from_yaml_str(yaml).unwrap();
        let leak = config.incidents.profile(IncidentType::MemoryLeak);
        assert!((leak.weight - 0.9).abs() < f64::EPSILON);
        assert_eq!(leak.min_duration_minutes, 180);
        let cpu = config.incidents.profile(IncidentType::CpuSaturation);
        assert!((cpu.cascade_probability - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_granularity() {
        for g in [0, 7] {
            let err = GenerationConfig::default().with_granularity(g).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidGranularity(x) if x == g));
        }
    }

    #[test]
    fn rejects_zero_days() {
        let err = GenerationConfig::default().with_days(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange(_)));
    }

    #[test]
    fn rejects_no_regions() {
        let mut config = GenerationConfig::default();
        for settings in config.clouds.values_mut() {
            settings.enabled = false;
        }
        assert!(matches!(config.validate().unwrap_err(), Error::NoRegions));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut config = GenerationConfig::default();
        config.cascade.edge_probability = 1.5;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "cascade.edge_probability must be within [0, 1], got 1.5");
    }

    #[test]
    fn rejects_non_decaying_cascade() {
        for decay in [0.0, 1.0, 1.2, f64::NAN] {
            let mut config = GenerationConfig::default();
            config.cascade.severity_decay = decay;
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::InvalidSetting(ref m) if m.starts_with("cascade.severity_decay")));
        }
        let mut config = GenerationConfig::default();
        config.cascade.severity_decay = 0.99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_duration_range() {
        let mut config = GenerationConfig::default();
        config.incidents.types.insert(
            IncidentType::NetworkPacketLoss,
            TypeSettings {
                min_duration_minutes: Some(90),
                max_duration_minutes: Some(30),
                ..TypeSettings::default()
            },
        );
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::InvalidDuration { min: 90, max: 30, .. }
        ));
    }

    #[test]
    fn rejects_scripted_unknown_service() {
        let mut config = GenerationConfig::default();
        config.incidents.scripted.push(ScriptedIncident {
            day: 0,
            incident_type: IncidentType::CpuSaturation,
            service: "billing".into(),
            host_index: 0,
            start_minute: 60,
            duration_minutes: 30,
        });
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::UnknownService { service, .. } if service == "billing"
        ));
    }

    #[test]
    fn day_arithmetic() {
        let config = GenerationConfig::default().with_granularity(60);
        assert_eq!(config.steps_per_day(), 24);
        assert_eq!(config.start_of_day(1).to_rfc3339(), "2024-06-02T00:00:00+00:00");
    }

    #[test]
    fn rendered_config_reloads() {
        let config = GenerationConfig::default().with_seed(7);
        let text = config.to_json_pretty().unwrap();
        let reloaded = GenerationConfig::from_json_str(&text).unwrap();
        assert_eq!(reloaded.seed, 7);
        assert_eq!(reloaded.topology, config.topology);
        assert_eq!(reloaded.clouds, config.clouds);
        reloaded.validate().unwrap();
    }

    /// Twentieths keep every float exactly representable in both formats.
    fn twentieths(range: std::ops::RangeInclusive<u32>) -> impl Strategy<Value = f64> {
        range.prop_map(|n| f64::from(n) / 20.0)
    }

    fn tuned_config() -> impl Strategy<Value = GenerationConfig> {
        (
            any::<u64>(),
            1u32..=400,
            proptest::sample::select(vec![1u32, 5, 15, 30, 60, 90, 360, 1440]),
            twentieths(0..=20),
            twentieths(1..=19),
            (0u32..12, 13u32..=24),
            1usize..=8,
        )
            .prop_map(|(seed, days, step, probability, decay, (open, close), hosts)| {
                let mut config = GenerationConfig::default()
                    .with_seed(seed)
                    .with_days(days)
                    .with_granularity(step);
                config.incidents.daily_incident_probability = probability;
                config.incidents.business_hours = HourWindow::new(open, close);
                config.cascade.severity_decay = decay;
                config.topology.hosts_per_service = hosts;
                config
            })
    }

    proptest! {
        #[test]
        fn tuned_configs_survive_both_formats(config in tuned_config()) {
            config.validate().unwrap();
            let json = config.to_json_pretty().unwrap();
            prop_assert_eq!(&GenerationConfig::from_json_str(&json).unwrap(), &config);
            let yaml = serde_yaml::to_string(&config).unwrap();
            prop_assert_eq!(&GenerationConfig::from_yaml_str(&yaml).unwrap(), &config);
        }

        #[test]
        fn granularity_must_divide_the_day(step in 1u32..=1440) {
            let result = GenerationConfig::default().with_granularity(step).validate();
            prop_assert_eq!(result.is_ok(), MINUTES_PER_DAY % step == 0);
        }
    }
}
