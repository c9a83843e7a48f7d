//! Typed model for meltwater.
//!
//! This crate provides:
//! - The closed incident-type enumeration and the incident record
//! - Lifecycle phases and per-type phase profiles
//! - Typed metric samples and the four telemetry record shapes
//! - Generation configuration with loading and validation
//! - The cloud naming seam used at the output boundary
//!
//! # Example
//!
//! ```rust,ignore
//! use melt_model::GenerationConfig;
//!
//! let config = GenerationConfig::from_path("config.json")?;
//! config.validate()?;
//! assert_eq!(config.generation.granularity_minutes, 15);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod fleet;
pub mod incident;
pub mod metric;
pub mod naming;
pub mod record;

pub use config::{
    CascadeSettings, CloudSettings, GenerationConfig, GenerationWindow, HourWindow,
    IncidentSettings, ScriptedIncident, ServiceSpec, SynthesisSettings, TopologySettings,
    TypeProfile, TypeSettings,
};
pub use error::{Error, Result};
pub use fleet::{CloudProvider, Host};
pub use incident::{
    Incident, IncidentId, IncidentType, Phase, PhaseProfile, Propagation, SeverityClass,
};
pub use metric::{MetricKind, MetricSample};
pub use naming::{CloudNaming, PlainNaming};
pub use record::{
    EventKind, EventRecord, EventSeverity, LogLevel, LogRecord, MetricRecord, TraceRecord,
};
